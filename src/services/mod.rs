pub mod image_processor;
pub mod metrics;
pub mod reconciler;

pub use image_processor::*;
pub use metrics::*;
pub use reconciler::*;
