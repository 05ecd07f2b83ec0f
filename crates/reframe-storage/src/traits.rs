//! Storage abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must
//! implement.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use reframe_core::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Get failed: {0}")]
    GetFailed(String),

    #[error("Put failed: {0}")]
    PutFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether this error means the key simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A blob fetched from storage.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub content_length: u64,
}

impl StoredObject {
    pub fn new(body: Bytes, content_type: Option<String>) -> Self {
        let content_length = body.len() as u64;
        StoredObject {
            body,
            content_type,
            content_length,
        }
    }
}

/// Storage abstraction trait
///
/// Backends store opaque blobs by key. Keys are forward-slash separated
/// paths; the cache-key layout under `resized/` is decided by the core
/// crate, not here.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob by key. Returns `StorageError::NotFound` when the key
    /// does not exist; any other error is a backend failure.
    async fn get(&self, key: &str) -> StorageResult<StoredObject>;

    /// Write a blob under the given key, overwriting any previous content.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
