//! Reframe Engine Library
//!
//! Pixel-level collaborator of the pipeline: probes source metadata, answers
//! the animation question for gifs, and applies an ordered list of transform
//! operations to produce re-encoded bytes. The pipeline decides *what* to do;
//! this crate only knows *how*.

pub mod color;
pub mod raster;
pub mod traits;

// Re-export commonly used types
pub use raster::RasterEngine;
pub use traits::{EngineError, EngineResult, TransformEngine, TransformOutput};
