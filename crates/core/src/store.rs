//! Versioned cache key, entry, and the key-value store trait both cache
//! tiers implement.
//!
//! Keys are append-only: a pipeline version bump changes the key space
//! instead of mutating or deleting old entries. Old entries age out via
//! TTL, and reverting the version makes them live again if still fresh.

use crate::chunk::BookId;
use crate::error::CacheError;
use crate::level::CefrLevel;
use crate::simplify::SimplificationResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Composite cache key over (book, chunk, level, content hash, pipeline
/// version), hashed to a fixed-width hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        book_id: &BookId,
        chunk_index: u32,
        level: CefrLevel,
        content_hash: &str,
        pipeline_version: u32,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(book_id.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(chunk_index.to_le_bytes());
        hasher.update(level.label().as_bytes());
        hasher.update([0]);
        hasher.update(content_hash.as_bytes());
        hasher.update([0]);
        hasher.update(pipeline_version.to_le_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(32);
        for byte in &digest[..16] {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// A reserved (non-hashed) key for internal bookkeeping records, e.g.
    /// the precompute scheduler's resume cursors.
    pub fn reserved(namespace: &str, id: &str) -> Self {
        Self(format!("{namespace}/{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached simplification result plus its freshness metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: SimplificationResult,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub version: u32,
}

impl CacheEntry {
    pub fn new(key: CacheKey, value: SimplificationResult, ttl: Duration, version: u32) -> Self {
        Self {
            key,
            value,
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
            version,
        }
    }

    /// Whether the entry has outlived its TTL as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_seconds() >= self.ttl_secs as i64
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// A single cache tier. Writes are idempotent upserts by key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch a live entry. Expired entries are treated as absent.
    async fn get(&self, key: &CacheKey) -> std::result::Result<Option<CacheEntry>, CacheError>;

    /// Upsert an entry.
    async fn put(&self, entry: CacheEntry) -> std::result::Result<(), CacheError>;

    /// Remove an entry. Used only for bookkeeping records; result entries
    /// expire rather than being deleted.
    async fn delete(&self, key: &CacheKey) -> std::result::Result<bool, CacheError>;
}

/// Arbitrary bookkeeping blobs (e.g. scheduler cursors) stored through the
/// same durable tier, keeping the cache the only shared mutable resource.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_blob(
        &self,
        key: &CacheKey,
    ) -> std::result::Result<Option<serde_json::Value>, CacheError>;

    async fn put_blob(
        &self,
        key: &CacheKey,
        value: serde_json::Value,
    ) -> std::result::Result<(), CacheError>;
}
