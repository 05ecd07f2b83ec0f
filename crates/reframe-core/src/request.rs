//! Request validation
//!
//! Parses a raw request URL into path, extension and canonical parameters,
//! and rejects anything the proxy has no business touching: unsupported file
//! extensions, and query strings with no recognized transform parameter.
//! Rejections are final; the pipeline routes them straight to pass-through.

use thiserror::Error;

use crate::cache_key::derive_cache_key;
use crate::constants::{ALLOWED_EXTENSIONS, ALLOWED_PARAMS};
use crate::query::{ParamMap, QueryNormalizer};

/// Why a request was refused before any storage call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("{extension} is not an allowed file extension")]
    InvalidExtension { extension: String },

    #[error("no recognized transform parameters in: {keys}")]
    InvalidQueryString { keys: String },
}

impl Rejection {
    /// Stable machine-readable code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InvalidExtension { .. } => "invalid-extension",
            Rejection::InvalidQueryString { .. } => "invalid-query-string",
        }
    }
}

/// A validated request. Created once during pipeline setup and immutable
/// afterwards; the cache key is derived exactly once.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Request path with the leading slash run stripped.
    pub original_path: String,
    /// Lowercased file extension of the path.
    pub extension: String,
    /// Canonical transform parameters.
    pub params: ParamMap,
    /// Storage key for the transformed artifact.
    pub cache_key: String,
}

/// Validates raw request URLs into [`RequestDescriptor`]s.
pub struct RequestValidator;

impl RequestValidator {
    /// Validate a raw URL of the form `path?querystring`.
    ///
    /// The leading slash run is stripped, the query string is normalized via
    /// [`QueryNormalizer`], and the cache key is derived from the result.
    pub fn validate(url: &str) -> Result<RequestDescriptor, Rejection> {
        let url = url.trim_start_matches('/');
        let (path, raw_query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };

        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Rejection::InvalidExtension { extension });
        }

        let params = QueryNormalizer::normalize(raw_query);
        if !params.keys().any(|key| ALLOWED_PARAMS.contains(&key)) {
            return Err(Rejection::InvalidQueryString {
                keys: params.keys().collect::<Vec<_>>().join(", "),
            });
        }

        let cache_key = derive_cache_key(path, &params);

        Ok(RequestDescriptor {
            original_path: path.to_string(),
            extension,
            params,
            cache_key,
        })
    }
}
