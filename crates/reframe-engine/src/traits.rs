//! Transform-engine abstraction
//!
//! The pipeline drives an engine through this trait so the orchestration
//! logic stays independent of the pixel library underneath.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use reframe_core::{SourceMetadata, TransformOp};

/// Engine operation errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Transformed bytes plus their content type.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub body: Bytes,
    pub content_type: String,
}

/// Transform engine abstraction
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Probe source dimensions and format from the container header. The
    /// `animated` flag is left false; callers ask [`Self::is_animated`]
    /// separately for gif sources.
    fn probe(&self, blob: &[u8]) -> EngineResult<SourceMetadata>;

    /// Whether the blob holds more than one frame. Only meaningful for gif
    /// sources and only called for them.
    fn is_animated(&self, blob: &[u8]) -> EngineResult<bool>;

    /// Apply the operations in order and encode the result once.
    async fn apply(
        &self,
        blob: &[u8],
        meta: &SourceMetadata,
        ops: &[TransformOp],
    ) -> EngineResult<TransformOutput>;
}
