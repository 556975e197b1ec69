mod auth_extractor;
mod metrics_layer;
mod rejection;
mod tracing_layer;

pub use auth_extractor::*;
pub use metrics_layer::*;
pub use rejection::*;
pub use tracing_layer::*;
