pub mod in_memory;
pub mod redis_store;

use std::sync::Arc;

use mediaflow_config::{TrackStoreConfig, TrackStoreKind};
use mediaflow_domain::TrackRepository;
use mediaflow_errors::MediaflowResult;
use tracing::{debug, info};

pub use in_memory::InMemoryTrackRepository;
pub use redis_store::RedisTrackRepository;

pub struct TrackStoreFactory;

impl TrackStoreFactory {
    pub async fn create(config: &TrackStoreConfig) -> MediaflowResult<Arc<dyn TrackRepository>> {
        debug!("Creating track store with kind: {:?}", config.kind);

        match config.kind {
            TrackStoreKind::Redis => {
                info!("Initializing Redis track store");
                let store = RedisTrackRepository::connect(config).await?;
                Ok(Arc::new(store))
            }
            TrackStoreKind::InMemory => {
                info!("Initializing in-memory track store");
                Ok(Arc::new(InMemoryTrackRepository::new()))
            }
        }
    }
}
