//! The public simplification facade.
//!
//! Request flow: resolve the source chunk, check the versioned cache,
//! collapse concurrent identical misses into one flight, run the
//! retry/fallback controller, write the result through both cache tiers.
//! The cache write and event publication happen inside the detached
//! flight, so a cancelled caller still populates the cache.

use crate::controller::RetryController;
use crate::routing;
use crate::single_flight::SingleFlight;
use gradelit_cache::TieredCache;
use gradelit_config::PipelineConfig;
use gradelit_core::{
    BookId, CacheEntry, CacheKey, Catalog, CefrLevel, DomainEvent, Error, EventBus, Result,
    SimplificationResult, SourceChunk,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

pub struct SimplificationService {
    catalog: Arc<dyn Catalog>,
    controller: Arc<RetryController>,
    cache: Arc<TieredCache>,
    flights: SingleFlight,
    config: RwLock<Arc<PipelineConfig>>,
    events: Arc<EventBus>,
}

impl SimplificationService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        controller: Arc<RetryController>,
        cache: Arc<TieredCache>,
        events: Arc<EventBus>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            catalog,
            controller,
            cache,
            flights: SingleFlight::new(),
            config: RwLock::new(Arc::new(config)),
            events,
        }
    }

    /// The active configuration snapshot.
    pub async fn config_snapshot(&self) -> Arc<PipelineConfig> {
        self.config.read().await.clone()
    }

    /// Re-key the cache for all future requests. Non-destructive: existing
    /// entries keep their old keys and age out by TTL, so reverting the
    /// version revives them.
    pub async fn bump_pipeline_version(&self, new_version: u32) {
        let mut config = self.config.write().await;
        info!(
            from = config.pipeline_version,
            to = new_version,
            "Pipeline version bumped"
        );
        *config = Arc::new(config.with_version(new_version));
    }

    /// Number of chunks in a book, from the catalog.
    pub async fn chunk_count(&self, book_id: &BookId) -> Result<u32> {
        Ok(self.catalog.chunk_count(book_id).await?)
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Whether a current-version result is already cached for this chunk.
    /// Used by the precompute scheduler to skip settled work.
    pub async fn peek_cached(
        &self,
        book_id: &BookId,
        chunk_index: u32,
        level: CefrLevel,
    ) -> Result<Option<SimplificationResult>> {
        let config = self.config_snapshot().await;
        let chunk = self.catalog.get_source_chunk(book_id, chunk_index).await?;
        let key = self.cache_key(&chunk, level, &config);
        Ok(self.cache.get(&key).await.map(|entry| entry.value))
    }

    /// Produce (or fetch) the level-graded rendition of one chunk.
    ///
    /// Quality failure is not an error: the worst outcome is the original
    /// text with `used_fallback = true`. Hard errors are catalog misses
    /// and configuration holes.
    pub async fn request_simplification(
        &self,
        book_id: &BookId,
        chunk_index: u32,
        level: CefrLevel,
    ) -> Result<SimplificationResult> {
        let config = self.config_snapshot().await;
        let chunk = self.catalog.get_source_chunk(book_id, chunk_index).await?;

        // Surface configuration holes before the flight is detached.
        let threshold = config.threshold_for(chunk.era, level)?;
        let first_params = routing::params_for(&config, chunk.era, level, 1)?;

        let key = self.cache_key(&chunk, level, &config);
        if let Some(entry) = self.cache.get(&key).await {
            self.events.publish(DomainEvent::SimplificationServed {
                book_id: book_id.clone(),
                chunk_index,
                level,
                cached: true,
                attempt: entry.value.attempt,
            });
            return Ok(entry.value);
        }

        let controller = Arc::clone(&self.controller);
        let cache = Arc::clone(&self.cache);
        let events = Arc::clone(&self.events);
        let flight_key = key.clone();

        let result = self
            .flights
            .run(&key, move || async move {
                let result = match controller.run(&chunk, level, &config).await {
                    Ok(result) => result,
                    Err(e) => {
                        // Pre-flight validation makes this unreachable in
                        // practice; the guarantee holds regardless.
                        error!(error = %e, "Controller failed, serving original text");
                        SimplificationResult::fallback(
                            chunk.text.clone(),
                            threshold,
                            config.generation.max_quality_attempts,
                            first_params,
                        )
                    }
                };

                let entry = CacheEntry::new(
                    flight_key,
                    result.clone(),
                    config.cache.durable_ttl(),
                    config.pipeline_version,
                );
                cache.put(entry).await;

                events.publish(DomainEvent::SimplificationServed {
                    book_id: chunk.book_id.clone(),
                    chunk_index: chunk.chunk_index,
                    level,
                    cached: false,
                    attempt: result.attempt,
                });
                Arc::new(result)
            })
            .await?;

        Ok((*result).clone())
    }

    fn cache_key(&self, chunk: &SourceChunk, level: CefrLevel, config: &PipelineConfig) -> CacheKey {
        CacheKey::new(
            &chunk.book_id,
            chunk.chunk_index,
            level,
            &chunk.content_hash(),
            config.pipeline_version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimplificationEngine;
    use async_trait::async_trait;
    use gradelit_cache::HotCacheStore;
    use gradelit_core::{
        CatalogError, EmbeddingProvider, Era, GeneratedText, GenerationParams, GenerationPrompt,
        GenerativeProvider, ProviderError, Quality,
    };
    use gradelit_scoring::QualityScorer;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SOURCE: &str = "The ship did not leave the harbor before the storm had passed.";
    const REWRITE: &str = "The ship did not leave the harbor until the storm passed.";

    struct MapCatalog {
        chunks: HashMap<(String, u32), SourceChunk>,
    }

    impl MapCatalog {
        fn single(book: &str, chunk_index: u32, text: &str, era: Era) -> Self {
            let mut chunks = HashMap::new();
            chunks.insert(
                (book.to_string(), chunk_index),
                SourceChunk::new(BookId::new(book), chunk_index, text, era),
            );
            Self { chunks }
        }
    }

    #[async_trait]
    impl Catalog for MapCatalog {
        async fn get_source_chunk(
            &self,
            book_id: &BookId,
            chunk_index: u32,
        ) -> std::result::Result<SourceChunk, CatalogError> {
            self.chunks
                .get(&(book_id.as_str().to_string(), chunk_index))
                .cloned()
                .ok_or(CatalogError::ChunkNotFound {
                    book_id: book_id.as_str().to_string(),
                    chunk_index,
                })
        }

        async fn chunk_count(
            &self,
            book_id: &BookId,
        ) -> std::result::Result<u32, CatalogError> {
            Ok(self
                .chunks
                .keys()
                .filter(|(book, _)| book == book_id.as_str())
                .count() as u32)
        }
    }

    struct CountingGenerator {
        calls: Arc<AtomicUsize>,
        output: String,
        delay: Duration,
    }

    #[async_trait]
    impl GenerativeProvider for CountingGenerator {
        fn name(&self) -> &str {
            "counting"
        }

        async fn generate(
            &self,
            _prompt: GenerationPrompt,
            params: GenerationParams,
        ) -> std::result::Result<GeneratedText, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(GeneratedText {
                text: self.output.clone(),
                model: "test-model".into(),
                params,
            })
        }
    }

    struct FixedEmbeddings {
        score: f32,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbeddings {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn similarity(
            &self,
            _a: &str,
            _b: &str,
        ) -> std::result::Result<f32, ProviderError> {
            Ok(self.score)
        }
    }

    struct Harness {
        service: Arc<SimplificationService>,
        generate_calls: Arc<AtomicUsize>,
    }

    fn build_service(embedding_score: f32, delay: Duration) -> Harness {
        let generate_calls = Arc::new(AtomicUsize::new(0));
        let generator = Arc::new(CountingGenerator {
            calls: generate_calls.clone(),
            output: REWRITE.into(),
            delay,
        });
        let events = Arc::new(EventBus::new(64));
        let controller = Arc::new(RetryController::new(
            SimplificationEngine::new(generator),
            QualityScorer::new(Arc::new(FixedEmbeddings {
                score: embedding_score,
            })),
            events.clone(),
        ));
        let cache = Arc::new(TieredCache::new(
            Arc::new(HotCacheStore::new(64)),
            Arc::new(HotCacheStore::new(64)),
            Duration::from_secs(900),
        ));
        let catalog = Arc::new(MapCatalog::single("moby-dick", 0, SOURCE, Era::Modern));

        let service = Arc::new(SimplificationService::new(
            catalog,
            controller,
            cache,
            events,
            PipelineConfig::default(),
        ));
        Harness {
            service,
            generate_calls,
        }
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let h = build_service(0.85, Duration::ZERO);
        let book = BookId::new("moby-dick");

        let first = h
            .service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();
        let second = h
            .service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(h.generate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_requests_generate_once() {
        let h = build_service(0.85, Duration::from_millis(50));
        let book = BookId::new("moby-dick");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = h.service.clone();
            let book = book.clone();
            handles.push(tokio::spawn(async move {
                service
                    .request_simplification(&book, 0, CefrLevel::B1)
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.text, REWRITE);
        }
        assert_eq!(h.generate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn quality_exhaustion_serves_original_text_not_an_error() {
        let h = build_service(0.10, Duration::ZERO);
        let book = BookId::new("moby-dick");

        let result = h
            .service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();

        assert_eq!(result.text, SOURCE);
        assert_eq!(result.quality, Quality::Failed);
        assert!(result.used_fallback);
    }

    #[tokio::test]
    async fn version_bump_re_keys_future_requests() {
        let h = build_service(0.85, Duration::ZERO);
        let book = BookId::new("moby-dick");

        h.service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();
        h.service.bump_pipeline_version(2).await;
        h.service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();

        // New keyspace: the second request regenerated.
        assert_eq!(h.generate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn served_events_carry_the_cached_flag() {
        let h = build_service(0.85, Duration::ZERO);
        let book = BookId::new("moby-dick");
        let mut rx = h.service.events().subscribe();

        h.service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();
        h.service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first.as_ref(), second.as_ref()) {
            (
                DomainEvent::SimplificationServed { cached: false, .. },
                DomainEvent::SimplificationServed { cached: true, .. },
            ) => {}
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_chunk_is_a_catalog_error() {
        let h = build_service(0.85, Duration::ZERO);
        let book = BookId::new("moby-dick");

        let err = h
            .service
            .request_simplification(&book, 99, CefrLevel::B1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[tokio::test]
    async fn peek_cached_sees_only_settled_results() {
        let h = build_service(0.85, Duration::ZERO);
        let book = BookId::new("moby-dick");

        assert!(h
            .service
            .peek_cached(&book, 0, CefrLevel::B1)
            .await
            .unwrap()
            .is_none());

        h.service
            .request_simplification(&book, 0, CefrLevel::B1)
            .await
            .unwrap();

        let cached = h
            .service
            .peek_cached(&book, 0, CefrLevel::B1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.text, REWRITE);
    }
}
