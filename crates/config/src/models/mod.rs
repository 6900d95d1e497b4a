pub mod app_config;
pub mod cluster;
pub mod node_manager;
pub mod observability;
pub mod track_store;

pub use app_config::*;
pub use cluster::*;
pub use node_manager::*;
pub use observability::*;
pub use track_store::*;
