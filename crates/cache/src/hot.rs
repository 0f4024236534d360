//! Hot tier — in-memory TTL store with oldest-first eviction.

use async_trait::async_trait;
use gradelit_core::{CacheEntry, CacheError, CacheKey, CacheStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory cache tier bounded by entry count.
///
/// Expired entries are dropped lazily on read; when the map is full the
/// oldest entry by creation time is evicted to make room.
pub struct HotCacheStore {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    capacity: usize,
}

impl HotCacheStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for HotCacheStore {
    fn name(&self) -> &str {
        "hot"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.clone())),
                None => return Ok(None),
                Some(_) => {} // expired, fall through to remove
            }
        }
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(&entry.key) && entries.len() >= self.capacity {
            let oldest = entries
                .values()
                .min_by_key(|e| e.created_at)
                .map(|e| e.key.clone());
            if let Some(key) = oldest {
                entries.remove(&key);
            }
        }

        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}
