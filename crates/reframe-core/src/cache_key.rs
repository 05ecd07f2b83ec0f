//! Cache-key derivation
//!
//! Transformed artifacts are stored under a key derived from the original
//! path and the canonical parameter serialization. Equal parameter sets must
//! derive byte-identical keys; the sorting and encoding guarantees live in
//! [`crate::query`].

use crate::constants::CACHE_PREFIX;
use crate::query::{ParamMap, QueryNormalizer};

/// Derive the storage key for a transformed artifact:
/// `resized/{path}_{safe_encode(serialize(params))}`.
///
/// The trailing `_` is produced even for an empty parameter map; existing
/// stored artifacts depend on this exact shape.
pub fn derive_cache_key(path: &str, params: &ParamMap) -> String {
    format!(
        "{}{}_{}",
        CACHE_PREFIX,
        path,
        QueryNormalizer::safe_encode(&QueryNormalizer::serialize(params))
    )
}
