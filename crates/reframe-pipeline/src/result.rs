//! Pipeline result types
//!
//! Every request terminates in exactly one [`PipelineResult`]. Stages emit
//! fully-populated results instead of raising; the entry adapter alone
//! decides what a given code means for the client.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// The stage a result was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Setup,
    CheckCache,
    FetchOriginal,
    Transform,
    StoreCache,
}

/// Terminal outcome codes. None of these is retried; three of them
/// (`found-on-s3`, `processed-image`, `processed-image-not-cached`) carry a
/// servable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineCode {
    InvalidExtension,
    InvalidQueryString,
    FoundOnS3,
    OriginalNotFound,
    AnimatedGif,
    ErrorProcessingImage,
    ProcessedImage,
    ProcessedImageNotCached,
}

impl PipelineCode {
    /// Stable kebab-case code string.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineCode::InvalidExtension => "invalid-extension",
            PipelineCode::InvalidQueryString => "invalid-query-string",
            PipelineCode::FoundOnS3 => "found-on-s3",
            PipelineCode::OriginalNotFound => "original-not-found",
            PipelineCode::AnimatedGif => "animated-gif",
            PipelineCode::ErrorProcessingImage => "error-processing-image",
            PipelineCode::ProcessedImage => "processed-image",
            PipelineCode::ProcessedImageNotCached => "processed-image-not-cached",
        }
    }

    /// Whether this outcome carries an artifact the caller can serve.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            PipelineCode::FoundOnS3
                | PipelineCode::ProcessedImage
                | PipelineCode::ProcessedImageNotCached
        )
    }
}

impl fmt::Display for PipelineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Servable artifact attached to a success result.
#[derive(Debug, Clone)]
pub struct PipelinePayload {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Terminal value of the pipeline. Built once by the stage that ends the
/// request and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub stage: PipelineStage,
    pub code: PipelineCode,
    pub reason: String,
    /// Derived storage key; present once Setup has succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Artifact bytes for success codes. Not serialized.
    #[serde(skip)]
    pub payload: Option<PipelinePayload>,
}

impl PipelineResult {
    pub fn terminal(
        stage: PipelineStage,
        code: PipelineCode,
        reason: impl Into<String>,
        cache_key: Option<String>,
    ) -> Self {
        PipelineResult {
            stage,
            code,
            reason: reason.into(),
            cache_key,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: PipelinePayload) -> Self {
        self.payload = Some(payload);
        self
    }
}
