//! Reframe Storage Library
//!
//! Blob-store abstraction for the proxy. Originals are read by their request
//! path and transformed artifacts are written under the derived cache key;
//! the pipeline never cares which backend serves them.
//!
//! `get` distinguishes "not found" from every other failure because the
//! pipeline branches on it: a missing cache entry continues the pipeline, a
//! missing original terminates it.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_store;
#[cfg(feature = "storage-local")]
pub use local::LocalStore;
pub use reframe_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Store;
pub use traits::{BlobStore, StorageError, StorageResult, StoredObject};
