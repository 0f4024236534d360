//! Tiered facade — hot tier over durable tier with degraded mode.

use gradelit_core::{CacheEntry, CacheKey, CacheStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Read-through, write-through composition of the hot and durable tiers.
///
/// A durable-tier failure never propagates to callers; the cache degrades
/// to hot-only for that operation and logs a warning.
pub struct TieredCache {
    hot: Arc<dyn CacheStore>,
    durable: Arc<dyn CacheStore>,
    hot_ttl: Duration,
}

impl TieredCache {
    pub fn new(hot: Arc<dyn CacheStore>, durable: Arc<dyn CacheStore>, hot_ttl: Duration) -> Self {
        Self {
            hot,
            durable,
            hot_ttl,
        }
    }

    /// Check hot, fall through to durable. A durable hit repopulates hot
    /// under the shorter hot TTL.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.hot.get(key).await {
            Ok(Some(entry)) => {
                debug!(tier = self.hot.name(), key = %key, "Cache hit");
                return Some(entry);
            }
            Ok(None) => {}
            Err(e) => warn!(tier = self.hot.name(), error = %e, "Cache read failed"),
        }

        match self.durable.get(key).await {
            Ok(Some(entry)) => {
                debug!(tier = self.durable.name(), key = %key, "Cache hit");
                let mut hot_entry = entry.clone();
                hot_entry.ttl_secs = self.hot_ttl.as_secs();
                hot_entry.created_at = chrono::Utc::now();
                if let Err(e) = self.hot.put(hot_entry).await {
                    warn!(tier = self.hot.name(), error = %e, "Cache repopulation failed");
                }
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(tier = self.durable.name(), error = %e, "Durable tier unavailable, degrading to hot-only");
                None
            }
        }
    }

    /// Write through both tiers. The hot copy carries the hot TTL; the
    /// entry is stored in the durable tier as given.
    pub async fn put(&self, entry: CacheEntry) {
        let mut hot_entry = entry.clone();
        hot_entry.ttl_secs = self.hot_ttl.as_secs();
        if let Err(e) = self.hot.put(hot_entry).await {
            warn!(tier = self.hot.name(), error = %e, "Cache write failed");
        }
        if let Err(e) = self.durable.put(entry).await {
            warn!(tier = self.durable.name(), error = %e, "Durable tier unavailable, entry held hot-only");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hot::HotCacheStore;
    use async_trait::async_trait;
    use gradelit_core::{
        BookId, CacheError, CefrLevel, GenerationParams, PromptStrategy, Quality,
        SimplificationResult,
    };
    use std::sync::Mutex;

    /// Durable tier stand-in that fails every call and counts attempts.
    struct BrokenStore {
        calls: Mutex<usize>,
    }

    impl BrokenStore {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
            *self.calls.lock().unwrap() += 1;
            Err(CacheError::Storage("disk gone".into()))
        }

        async fn put(&self, _entry: CacheEntry) -> Result<(), CacheError> {
            *self.calls.lock().unwrap() += 1;
            Err(CacheError::Storage("disk gone".into()))
        }

        async fn delete(&self, _key: &CacheKey) -> Result<bool, CacheError> {
            *self.calls.lock().unwrap() += 1;
            Err(CacheError::Storage("disk gone".into()))
        }
    }

    fn test_entry(book: &str, ttl_secs: u64) -> CacheEntry {
        let key = CacheKey::new(&BookId::new(book), 0, CefrLevel::B1, "hash", 1);
        let result = SimplificationResult {
            text: "Simple.".into(),
            similarity_score: Some(0.8),
            threshold: 0.7,
            rule_violations: vec![],
            quality: Quality::High,
            used_fallback: false,
            attempt: 1,
            model_params: GenerationParams {
                temperature: 0.6,
                strategy: PromptStrategy::Balanced,
                attempt: 1,
            },
        };
        CacheEntry::new(key, result, Duration::from_secs(ttl_secs), 1)
    }

    fn two_hot_tiers() -> (Arc<HotCacheStore>, Arc<HotCacheStore>, TieredCache) {
        let hot = Arc::new(HotCacheStore::new(16));
        let durable = Arc::new(HotCacheStore::new(16));
        let cache = TieredCache::new(hot.clone(), durable.clone(), Duration::from_secs(900));
        (hot, durable, cache)
    }

    #[tokio::test]
    async fn write_through_populates_both_tiers() {
        let (hot, durable, cache) = two_hot_tiers();
        let entry = test_entry("book-1", 2_592_000);
        let key = entry.key.clone();

        cache.put(entry).await;

        assert!(hot.get(&key).await.unwrap().is_some());
        let durable_copy = durable.get(&key).await.unwrap().unwrap();
        assert_eq!(durable_copy.ttl_secs, 2_592_000);
        let hot_copy = hot.get(&key).await.unwrap().unwrap();
        assert_eq!(hot_copy.ttl_secs, 900);
    }

    #[tokio::test]
    async fn durable_hit_repopulates_hot() {
        let (hot, durable, cache) = two_hot_tiers();
        let entry = test_entry("book-1", 2_592_000);
        let key = entry.key.clone();
        durable.put(entry).await.unwrap();

        assert!(hot.get(&key).await.unwrap().is_none());
        let fetched = cache.get(&key).await.unwrap();
        assert_eq!(fetched.value.text, "Simple.");

        let hot_copy = hot.get(&key).await.unwrap().unwrap();
        assert_eq!(hot_copy.ttl_secs, 900);
    }

    #[tokio::test]
    async fn miss_in_both_tiers_is_none() {
        let (_hot, _durable, cache) = two_hot_tiers();
        let key = CacheKey::new(&BookId::new("nope"), 0, CefrLevel::A1, "x", 1);
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn broken_durable_degrades_to_hot_only() {
        let hot = Arc::new(HotCacheStore::new(16));
        let durable = Arc::new(BrokenStore::new());
        let cache = TieredCache::new(hot.clone(), durable.clone(), Duration::from_secs(900));

        let entry = test_entry("book-1", 2_592_000);
        let key = entry.key.clone();

        // Put does not error even though the durable tier is down.
        cache.put(entry).await;
        assert!(durable.call_count() >= 1);

        // Read still serves from hot.
        let fetched = cache.get(&key).await.unwrap();
        assert_eq!(fetched.value.text, "Simple.");
    }

    #[tokio::test]
    async fn broken_durable_read_is_a_miss_not_an_error() {
        let hot = Arc::new(HotCacheStore::new(16));
        let durable = Arc::new(BrokenStore::new());
        let cache = TieredCache::new(hot, durable, Duration::from_secs(900));

        let key = CacheKey::new(&BookId::new("book"), 0, CefrLevel::A1, "x", 1);
        assert!(cache.get(&key).await.is_none());
    }
}
