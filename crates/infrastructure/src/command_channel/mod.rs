pub mod http;
pub mod in_memory;

use std::sync::Arc;

use mediaflow_config::{ChannelConfig, ChannelKind};
use mediaflow_domain::CommandChannel;
use mediaflow_errors::MediaflowResult;
use tracing::info;

pub use http::HttpCommandChannel;
pub use in_memory::InMemoryCommandChannel;

pub struct CommandChannelFactory;

impl CommandChannelFactory {
    pub fn create(config: &ChannelConfig) -> MediaflowResult<Arc<dyn CommandChannel>> {
        match config.kind {
            ChannelKind::Http => {
                info!(
                    "Using HTTP command channel on node port {}",
                    config.node_port
                );
                Ok(Arc::new(HttpCommandChannel::new(config)?))
            }
            ChannelKind::InMemory => {
                info!("Using in-memory command channel");
                Ok(Arc::new(InMemoryCommandChannel::new()))
            }
        }
    }
}
