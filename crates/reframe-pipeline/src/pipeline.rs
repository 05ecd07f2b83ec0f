//! Cache-aside pipeline orchestrator
//!
//! One instance serves any number of concurrent requests; each `run` call
//! owns its descriptor and in-flight result and shares nothing. Stages are
//! sequenced explicitly: a cache hit is a success short-circuit, every other
//! stage either continues or terminates the request. No stage is retried —
//! a failed storage or engine call becomes the final result.
//!
//! Known limitation: concurrent requests for the same cache key are not
//! coalesced; both miss, both transform, and the last store wins.

use std::sync::Arc;

use reframe_core::{
    MapRejection, Rejection, RequestDescriptor, RequestValidator, SourceFormat, TransformMapper,
};
use reframe_engine::TransformEngine;
use reframe_storage::{BlobStore, StoredObject};

use crate::result::{PipelineCode, PipelinePayload, PipelineResult, PipelineStage};

/// The request pipeline. Construct once with its collaborators and share.
pub struct ImagePipeline {
    store: Arc<dyn BlobStore>,
    engine: Arc<dyn TransformEngine>,
}

impl ImagePipeline {
    pub fn new(store: Arc<dyn BlobStore>, engine: Arc<dyn TransformEngine>) -> Self {
        ImagePipeline { store, engine }
    }

    /// Run one request through the five stages and return its terminal result.
    pub async fn run(&self, url: &str) -> PipelineResult {
        let start = std::time::Instant::now();

        // Setup: validate and derive the cache key.
        let descriptor = match RequestValidator::validate(url) {
            Ok(descriptor) => descriptor,
            Err(rejection) => {
                tracing::debug!(url = %url, code = rejection.code(), "Request rejected");
                let code = match rejection {
                    Rejection::InvalidExtension { .. } => PipelineCode::InvalidExtension,
                    Rejection::InvalidQueryString { .. } => PipelineCode::InvalidQueryString,
                };
                return PipelineResult::terminal(
                    PipelineStage::Setup,
                    code,
                    rejection.to_string(),
                    None,
                );
            }
        };

        // CheckCache: a hit ends the request successfully.
        if let Some(hit) = self.check_cache(&descriptor).await {
            return hit;
        }

        // FetchOriginal: nothing to transform without a source.
        let original = match self.fetch_original(&descriptor).await {
            Ok(original) => original,
            Err(result) => return result,
        };

        // Transform: map parameters to operations and hand them to the engine.
        let payload = match self.transform(&descriptor, &original).await {
            Ok(payload) => payload,
            Err(result) => return result,
        };

        // StoreCache: persist for the next request; the payload survives a
        // failed write.
        let result = self.store_cache(&descriptor, payload).await;

        tracing::info!(
            key = %descriptor.cache_key,
            code = %result.code,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Pipeline finished"
        );

        result
    }

    async fn check_cache(&self, descriptor: &RequestDescriptor) -> Option<PipelineResult> {
        match self.store.get(&descriptor.cache_key).await {
            Ok(cached) => {
                tracing::debug!(key = %descriptor.cache_key, "Cache hit");
                Some(
                    PipelineResult::terminal(
                        PipelineStage::CheckCache,
                        PipelineCode::FoundOnS3,
                        "cached artifact found",
                        Some(descriptor.cache_key.clone()),
                    )
                    .with_payload(PipelinePayload {
                        body: cached.body,
                        content_type: cached.content_type,
                    }),
                )
            }
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                // A broken cache lookup is a miss, not a terminal failure.
                tracing::warn!(
                    key = %descriptor.cache_key,
                    error = %e,
                    "Cache check failed; treating as miss"
                );
                None
            }
        }
    }

    async fn fetch_original(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<StoredObject, PipelineResult> {
        self.store
            .get(&descriptor.original_path)
            .await
            .map_err(|e| {
                tracing::debug!(path = %descriptor.original_path, error = %e, "Original not found");
                PipelineResult::terminal(
                    PipelineStage::FetchOriginal,
                    PipelineCode::OriginalNotFound,
                    format!("original image not available: {}", e),
                    Some(descriptor.cache_key.clone()),
                )
            })
    }

    async fn transform(
        &self,
        descriptor: &RequestDescriptor,
        original: &StoredObject,
    ) -> Result<PipelinePayload, PipelineResult> {
        let terminal = |code: PipelineCode, reason: String| {
            PipelineResult::terminal(
                PipelineStage::Transform,
                code,
                reason,
                Some(descriptor.cache_key.clone()),
            )
        };

        let mut meta = self
            .engine
            .probe(&original.body)
            .map_err(|e| terminal(PipelineCode::ErrorProcessingImage, e.to_string()))?;

        // The animation question is only asked for gif sources.
        if meta.format == SourceFormat::Gif {
            meta.animated = self
                .engine
                .is_animated(&original.body)
                .map_err(|e| terminal(PipelineCode::ErrorProcessingImage, e.to_string()))?;
        }

        let ops = TransformMapper::map_ops(&descriptor.params, &meta).map_err(|rejection| {
            match rejection {
                MapRejection::AnimatedGif => {
                    terminal(PipelineCode::AnimatedGif, rejection.to_string())
                }
            }
        })?;

        let output = self
            .engine
            .apply(&original.body, &meta, &ops)
            .await
            .map_err(|e| terminal(PipelineCode::ErrorProcessingImage, e.to_string()))?;

        Ok(PipelinePayload {
            body: output.body,
            content_type: Some(output.content_type),
        })
    }

    async fn store_cache(
        &self,
        descriptor: &RequestDescriptor,
        payload: PipelinePayload,
    ) -> PipelineResult {
        let content_type = payload
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");

        match self
            .store
            .put(&descriptor.cache_key, payload.body.clone(), content_type)
            .await
        {
            Ok(()) => PipelineResult::terminal(
                PipelineStage::StoreCache,
                PipelineCode::ProcessedImage,
                "transformed image cached",
                Some(descriptor.cache_key.clone()),
            )
            .with_payload(payload),
            Err(e) => {
                tracing::warn!(
                    key = %descriptor.cache_key,
                    error = %e,
                    "Cache write failed; serving uncached result"
                );
                PipelineResult::terminal(
                    PipelineStage::StoreCache,
                    PipelineCode::ProcessedImageNotCached,
                    format!("transformed image could not be cached: {}", e),
                    Some(descriptor.cache_key.clone()),
                )
                .with_payload(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reframe_core::{SourceMetadata, StorageBackend, TransformOp};
    use reframe_engine::{EngineError, EngineResult, TransformOutput};
    use reframe_storage::{StorageError, StorageResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory blob store that records puts and counts gets.
    #[derive(Default)]
    struct MockStore {
        blobs: Mutex<HashMap<String, StoredObject>>,
        fail_puts: bool,
    }

    impl MockStore {
        fn with_blob(self, key: &str, body: &'static [u8], content_type: &str) -> Self {
            self.blobs.lock().unwrap().insert(
                key.to_string(),
                StoredObject::new(
                    Bytes::from_static(body),
                    Some(content_type.to_string()),
                ),
            );
            self
        }

        fn contains(&self, key: &str) -> bool {
            self.blobs.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl BlobStore for MockStore {
        async fn get(&self, key: &str) -> StorageResult<StoredObject> {
            self.blobs
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }

        async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
            if self.fail_puts {
                return Err(StorageError::PutFailed("disk full".to_string()));
            }
            self.blobs.lock().unwrap().insert(
                key.to_string(),
                StoredObject::new(body, Some(content_type.to_string())),
            );
            Ok(())
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }
    }

    /// Engine stub with canned metadata; records the ops it was given.
    struct MockEngine {
        meta: SourceMetadata,
        animated: bool,
        applied: Mutex<Vec<Vec<TransformOp>>>,
    }

    impl MockEngine {
        fn new(format: SourceFormat) -> Self {
            MockEngine {
                meta: SourceMetadata {
                    width: 1000,
                    height: 500,
                    format,
                    animated: false,
                },
                animated: false,
                applied: Mutex::new(Vec::new()),
            }
        }

        fn animated(mut self) -> Self {
            self.animated = true;
            self
        }

        fn apply_count(&self) -> usize {
            self.applied.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TransformEngine for MockEngine {
        fn probe(&self, _blob: &[u8]) -> EngineResult<SourceMetadata> {
            Ok(self.meta.clone())
        }

        fn is_animated(&self, _blob: &[u8]) -> EngineResult<bool> {
            Ok(self.animated)
        }

        async fn apply(
            &self,
            _blob: &[u8],
            _meta: &SourceMetadata,
            ops: &[TransformOp],
        ) -> EngineResult<TransformOutput> {
            self.applied.lock().unwrap().push(ops.to_vec());
            Ok(TransformOutput {
                body: Bytes::from_static(b"transformed"),
                content_type: "image/jpeg".to_string(),
            })
        }
    }

    /// Engine whose apply always fails.
    struct FailingEngine;

    #[async_trait]
    impl TransformEngine for FailingEngine {
        fn probe(&self, _blob: &[u8]) -> EngineResult<SourceMetadata> {
            Ok(SourceMetadata {
                width: 10,
                height: 10,
                format: SourceFormat::Jpeg,
                animated: false,
            })
        }

        fn is_animated(&self, _blob: &[u8]) -> EngineResult<bool> {
            Ok(false)
        }

        async fn apply(
            &self,
            _blob: &[u8],
            _meta: &SourceMetadata,
            _ops: &[TransformOp],
        ) -> EngineResult<TransformOutput> {
            Err(EngineError::Decode("corrupt source".to_string()))
        }
    }

    fn pipeline(store: Arc<MockStore>, engine: Arc<MockEngine>) -> ImagePipeline {
        ImagePipeline::new(store, engine)
    }

    #[tokio::test]
    async fn test_invalid_extension_terminates_in_setup() {
        let store = Arc::new(MockStore::default());
        let engine = Arc::new(MockEngine::new(SourceFormat::Jpeg));
        let result = pipeline(store.clone(), engine).run("photo.bmp?w=300").await;

        assert_eq!(result.stage, PipelineStage::Setup);
        assert_eq!(result.code, PipelineCode::InvalidExtension);
        assert!(result.cache_key.is_none());
    }

    #[tokio::test]
    async fn test_invalid_query_string_terminates_in_setup() {
        let store = Arc::new(MockStore::default());
        let engine = Arc::new(MockEngine::new(SourceFormat::Jpeg));
        let result = pipeline(store, engine).run("photo.jpg?unknown=1").await;

        assert_eq!(result.stage, PipelineStage::Setup);
        assert_eq!(result.code, PipelineCode::InvalidQueryString);
    }

    #[tokio::test]
    async fn test_miss_fetch_transform_store() {
        let store = Arc::new(
            MockStore::default().with_blob("photo.jpg", b"original", "image/jpeg"),
        );
        let engine = Arc::new(MockEngine::new(SourceFormat::Jpeg));
        let result = pipeline(store.clone(), engine.clone())
            .run("photo.jpg?w=300")
            .await;

        assert_eq!(result.stage, PipelineStage::StoreCache);
        assert_eq!(result.code, PipelineCode::ProcessedImage);
        assert_eq!(result.cache_key.as_deref(), Some("resized/photo.jpg_w-300"));
        assert_eq!(
            result.payload.as_ref().unwrap().body,
            Bytes::from_static(b"transformed")
        );
        assert!(store.contains("resized/photo.jpg_w-300"));

        // w=300 against a 1000x500 source maps to a bounded resize
        let ops = engine.applied.lock().unwrap()[0].clone();
        assert_eq!(
            ops,
            vec![TransformOp::ResizeFit {
                width: Some(300),
                height: None
            }]
        );
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits() {
        let store = Arc::new(
            MockStore::default()
                .with_blob("photo.jpg", b"original", "image/jpeg")
                .with_blob("resized/photo.jpg_w-300", b"cached", "image/jpeg"),
        );
        let engine = Arc::new(MockEngine::new(SourceFormat::Jpeg));
        let result = pipeline(store, engine.clone()).run("photo.jpg?w=300").await;

        assert_eq!(result.stage, PipelineStage::CheckCache);
        assert_eq!(result.code, PipelineCode::FoundOnS3);
        assert_eq!(
            result.payload.as_ref().unwrap().body,
            Bytes::from_static(b"cached")
        );
        // Transform and store never ran
        assert_eq!(engine.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_original_is_terminal() {
        let store = Arc::new(MockStore::default());
        let engine = Arc::new(MockEngine::new(SourceFormat::Jpeg));
        let result = pipeline(store, engine.clone()).run("photo.jpg?w=300").await;

        assert_eq!(result.stage, PipelineStage::FetchOriginal);
        assert_eq!(result.code, PipelineCode::OriginalNotFound);
        assert!(result.payload.is_none());
        assert_eq!(engine.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_animated_gif_is_terminal_and_never_stored() {
        let store = Arc::new(
            MockStore::default().with_blob("anim.gif", b"gif bytes", "image/gif"),
        );
        let engine = Arc::new(MockEngine::new(SourceFormat::Gif).animated());
        let result = pipeline(store.clone(), engine.clone())
            .run("anim.gif?w=100")
            .await;

        assert_eq!(result.stage, PipelineStage::Transform);
        assert_eq!(result.code, PipelineCode::AnimatedGif);
        assert_eq!(engine.apply_count(), 0);
        assert!(!store.contains("resized/anim.gif_w-100"));
    }

    #[tokio::test]
    async fn test_engine_failure_is_terminal() {
        let store = Arc::new(
            MockStore::default().with_blob("photo.jpg", b"broken", "image/jpeg"),
        );
        let result = ImagePipeline::new(store, Arc::new(FailingEngine))
            .run("photo.jpg?w=300")
            .await;

        assert_eq!(result.stage, PipelineStage::Transform);
        assert_eq!(result.code, PipelineCode::ErrorProcessingImage);
        assert!(result.reason.contains("corrupt source"));
    }

    #[tokio::test]
    async fn test_store_failure_still_carries_payload() {
        let store = Arc::new(MockStore {
            fail_puts: true,
            ..MockStore::default()
        });
        store.blobs.lock().unwrap().insert(
            "photo.jpg".to_string(),
            StoredObject::new(Bytes::from_static(b"original"), None),
        );

        let engine = Arc::new(MockEngine::new(SourceFormat::Jpeg));
        let result = pipeline(store, engine).run("photo.jpg?w=300").await;

        assert_eq!(result.stage, PipelineStage::StoreCache);
        assert_eq!(result.code, PipelineCode::ProcessedImageNotCached);
        assert_eq!(
            result.payload.as_ref().unwrap().body,
            Bytes::from_static(b"transformed")
        );
    }

    #[tokio::test]
    async fn test_repeat_request_hits_cache() {
        let store = Arc::new(
            MockStore::default().with_blob("photo.jpg", b"original", "image/jpeg"),
        );
        let engine = Arc::new(MockEngine::new(SourceFormat::Jpeg));
        let p = pipeline(store, engine.clone());

        let first = p.run("photo.jpg?w=300").await;
        assert_eq!(first.code, PipelineCode::ProcessedImage);

        let second = p.run("photo.jpg?w=300").await;
        assert_eq!(second.code, PipelineCode::FoundOnS3);
        assert_eq!(engine.apply_count(), 1);
    }
}
