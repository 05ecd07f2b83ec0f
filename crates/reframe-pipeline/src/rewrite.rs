//! Entry-adapter rewrite contract
//!
//! CDN-style adapters do not serve bytes themselves; they rewrite the
//! outgoing origin request to the cached artifact when the pipeline produced
//! one, and pass the original request through otherwise. A result whose
//! artifact was *not* stored (`processed-image-not-cached`) must not be
//! rewritten — the cache key would miss at the origin.

use crate::result::{PipelineCode, PipelineResult};

/// Replacement target for the outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenRequest {
    pub uri: String,
    pub querystring: String,
}

/// Where an adapter should point the request after the pipeline ran.
///
/// Returns the cached artifact's location for `found-on-s3` and
/// `processed-image`; `None` means pass the original request through
/// unmodified.
pub fn rewrite_target(result: &PipelineResult) -> Option<RewrittenRequest> {
    match result.code {
        PipelineCode::FoundOnS3 | PipelineCode::ProcessedImage => {
            result.cache_key.as_ref().map(|key| RewrittenRequest {
                uri: format!("/{}", key),
                querystring: String::new(),
            })
        }
        _ => None,
    }
}
