pub mod command_channel;
pub mod observability;
pub mod track_store;

pub use command_channel::*;
pub use observability::*;
pub use track_store::*;
