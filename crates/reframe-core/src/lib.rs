//! Reframe Core Library
//!
//! This crate provides the request-normalization half of the proxy: canonical
//! query-string handling, request validation, cache-key derivation, the
//! parameter-to-operation mapper, and shared configuration. It performs no I/O;
//! the storage and engine crates supply the collaborators the pipeline drives.

pub mod cache_key;
pub mod config;
pub mod constants;
pub mod ops;
pub mod query;
pub mod request;
pub mod storage_types;

// Re-export commonly used types
pub use cache_key::derive_cache_key;
pub use config::{Config, ConfigError};
pub use ops::{MapRejection, SourceFormat, SourceMetadata, TransformMapper, TransformOp};
pub use query::{ParamMap, QueryNormalizer};
pub use request::{Rejection, RequestDescriptor, RequestValidator};
pub use storage_types::StorageBackend;
