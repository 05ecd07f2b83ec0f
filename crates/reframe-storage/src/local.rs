use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{BlobStore, StorageError, StorageResult, StoredObject};
use reframe_core::StorageBackend;

/// Local filesystem blob store implementation
#[derive(Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for blob storage (e.g., "/var/lib/reframe/media")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStore { base_path })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Keys must not contain path traversal sequences that could escape the
    /// base storage directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }

    /// Guess a content type from the key's file extension.
    fn content_type_for(key: &str) -> Option<String> {
        let extension = key.rsplit_once('.')?.1.to_lowercase();
        let content_type = match extension.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => return None,
        };
        Some(content_type.to_string())
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let body = match fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %key,
                    "Local storage get failed"
                );
                return Err(StorageError::GetFailed(e.to_string()));
            }
        };

        tracing::info!(
            key = %key,
            size_bytes = body.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        Ok(StoredObject::new(body, Self::content_type_for(key)))
    }

    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = body.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::PutFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&body).await.map_err(|e| {
            StorageError::PutFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::PutFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let (_dir, store) = store().await;

        store
            .put("photo.jpg", Bytes::from_static(b"jpeg bytes"), "image/jpeg")
            .await
            .unwrap();

        let obj = store.get("photo.jpg").await.unwrap();
        assert_eq!(obj.body, Bytes::from_static(b"jpeg bytes"));
        assert_eq!(obj.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(obj.content_length, 10);
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let (_dir, store) = store().await;

        let err = store.get("missing.png").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_creates_parent_directories() {
        let (_dir, store) = store().await;

        store
            .put(
                "resized/2019/photo.jpg_w-300",
                Bytes::from_static(b"data"),
                "image/jpeg",
            )
            .await
            .unwrap();

        let obj = store.get("resized/2019/photo.jpg_w-300").await.unwrap();
        assert_eq!(obj.body, Bytes::from_static(b"data"));
        // No trailing extension on the cache key, so no content-type guess
        assert_eq!(obj.content_type, None);
    }

    #[tokio::test]
    async fn test_traversal_keys_are_rejected() {
        let (_dir, store) = store().await;

        assert!(matches!(
            store.get("../escape.jpg").await.unwrap_err(),
            StorageError::InvalidKey(_)
        ));
        assert!(matches!(
            store
                .put("/abs.jpg", Bytes::from_static(b"x"), "image/jpeg")
                .await
                .unwrap_err(),
            StorageError::InvalidKey(_)
        ));
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_key() {
        let (_dir, store) = store().await;

        store
            .put("photo.png", Bytes::from_static(b"old"), "image/png")
            .await
            .unwrap();
        store
            .put("photo.png", Bytes::from_static(b"new"), "image/png")
            .await
            .unwrap();

        let obj = store.get("photo.png").await.unwrap();
        assert_eq!(obj.body, Bytes::from_static(b"new"));
    }
}
