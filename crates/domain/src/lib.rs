pub mod geometry;
pub mod lifecycle;
pub mod markup;
pub mod messaging;
pub mod pipeline;
pub mod repositories;
pub mod topology;
pub mod track;

pub use geometry::*;
pub use lifecycle::*;
pub use messaging::*;
pub use pipeline::*;
pub use repositories::*;
pub use topology::*;
pub use track::*;
pub use mediaflow_errors::{MediaflowError, MediaflowResult};
