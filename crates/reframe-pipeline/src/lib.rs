//! Reframe Pipeline Library
//!
//! The cache-aside orchestrator: one request in, one terminal
//! [`PipelineResult`] out. Five stages run in a fixed order — Setup,
//! CheckCache, FetchOriginal, Transform, StoreCache — and the only
//! short-circuit is a cache hit. Everything pixel- or storage-shaped is
//! delegated to the engine and blob-store collaborators.

pub mod pipeline;
pub mod result;
pub mod rewrite;

// Re-export commonly used types
pub use pipeline::ImagePipeline;
pub use result::{PipelineCode, PipelinePayload, PipelineResult, PipelineStage};
pub use rewrite::{rewrite_target, RewrittenRequest};
