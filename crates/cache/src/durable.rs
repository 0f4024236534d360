//! Durable tier — SQLite key-value store with TTL.
//!
//! One table keyed by the composite cache key, holding the serialized
//! result plus freshness metadata. WAL journal mode, small pool, schema
//! created on open. Pass `":memory:"` for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gradelit_core::store::BlobStore;
use gradelit_core::{CacheEntry, CacheError, CacheKey, CacheStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// The durable SQLite cache tier.
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path`.
    pub async fn new(path: &str) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| CacheError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite cache tier initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ttl_secs   INTEGER NOT NULL,
                version    INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("cache_entries table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("blobs table: {e}")))?;

        Ok(())
    }

    /// Drop entries past their TTL. Safe to call from a periodic sweeper;
    /// reads already treat expired rows as absent.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query(
            "DELETE FROM cache_entries
             WHERE unixepoch(created_at) + ttl_secs <= unixepoch('now')",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(format!("purge: {e}")))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    fn name(&self) -> &str {
        "durable"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query(
            "SELECT value, created_at, ttl_secs, version FROM cache_entries WHERE key = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(format!("get: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value_json: String = row.get("value");
        let created_at_raw: String = row.get("created_at");
        let ttl_secs: i64 = row.get("ttl_secs");
        let version: i64 = row.get("version");

        let value = serde_json::from_str(&value_json).map_err(|e| CacheError::CorruptEntry {
            key: key.to_string(),
            reason: format!("value: {e}"),
        })?;
        let created_at: DateTime<Utc> = created_at_raw
            .parse()
            .map_err(|e| CacheError::CorruptEntry {
                key: key.to_string(),
                reason: format!("created_at: {e}"),
            })?;

        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at,
            ttl_secs: ttl_secs as u64,
            version: version as u32,
        };

        if entry.is_expired() {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let value_json = serde_json::to_string(&entry.value)
            .map_err(|e| CacheError::Storage(format!("serialize: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, created_at, ttl_secs, version)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                created_at = excluded.created_at,
                ttl_secs = excluded.ttl_secs,
                version = excluded.version
            "#,
        )
        .bind(entry.key.as_str())
        .bind(value_json)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.ttl_secs as i64)
        .bind(entry.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(format!("put: {e}")))?;

        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Storage(format!("delete: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BlobStore for SqliteCacheStore {
    async fn get_blob(&self, key: &CacheKey) -> Result<Option<serde_json::Value>, CacheError> {
        let row = sqlx::query("SELECT value FROM blobs WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::Storage(format!("get_blob: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.get("value");
        let value = serde_json::from_str(&raw).map_err(|e| CacheError::CorruptEntry {
            key: key.to_string(),
            reason: format!("blob: {e}"),
        })?;
        Ok(Some(value))
    }

    async fn put_blob(
        &self,
        key: &CacheKey,
        value: serde_json::Value,
    ) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO blobs (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key.as_str())
        .bind(value.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(format!("put_blob: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradelit_core::{
        BookId, CefrLevel, GenerationParams, PromptStrategy, Quality, SimplificationResult,
    };
    use std::time::Duration;

    async fn memory_store() -> SqliteCacheStore {
        SqliteCacheStore::new(":memory:").await.unwrap()
    }

    fn test_entry(ttl_secs: u64, version: u32) -> CacheEntry {
        let key = CacheKey::new(&BookId::new("book"), 1, CefrLevel::A2, "hash", version);
        let result = SimplificationResult {
            text: "Plain words.".into(),
            similarity_score: Some(0.77),
            threshold: 0.7,
            rule_violations: vec![],
            quality: Quality::High,
            used_fallback: false,
            attempt: 2,
            model_params: GenerationParams {
                temperature: 0.5,
                strategy: PromptStrategy::ConstrainedRetry,
                attempt: 2,
            },
        };
        CacheEntry::new(key, result, Duration::from_secs(ttl_secs), version)
    }

    #[tokio::test]
    async fn roundtrip_through_sqlite() {
        let store = memory_store().await;
        let entry = test_entry(3600, 1);
        let key = entry.key.clone();

        store.put(entry.clone()).await.unwrap();
        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.value, entry.value);
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = memory_store().await;
        let key = CacheKey::new(&BookId::new("nope"), 0, CefrLevel::C1, "x", 1);
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let store = memory_store().await;
        let mut entry = test_entry(60, 1);
        entry.created_at = Utc::now() - chrono::Duration::seconds(120);
        let key = entry.key.clone();

        store.put(entry).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites() {
        let store = memory_store().await;
        let mut entry = test_entry(3600, 1);
        let key = entry.key.clone();
        store.put(entry.clone()).await.unwrap();

        entry.value.text = "Rewritten again.".into();
        store.put(entry).await.unwrap();

        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.value.text, "Rewritten again.");
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = memory_store().await;
        let entry = test_entry(3600, 1);
        let key = entry.key.clone();
        store.put(entry).await.unwrap();

        assert!(store.delete(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn version_bump_creates_disjoint_keys() {
        let store = memory_store().await;
        let v1 = test_entry(3600, 1);
        let v2 = test_entry(3600, 2);
        assert_ne!(v1.key, v2.key);

        store.put(v1.clone()).await.unwrap();
        // The v2 key misses; the v1 entry is untouched (safe rollback).
        assert!(store.get(&v2.key).await.unwrap().is_none());
        assert!(store.get(&v1.key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let store = memory_store().await;
        let mut stale = test_entry(60, 1);
        stale.created_at = Utc::now() - chrono::Duration::seconds(600);
        let fresh = test_entry(3600, 2);
        let fresh_key = fresh.key.clone();

        store.put(stale).await.unwrap();
        store.put(fresh).await.unwrap();

        let purged = store.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(&fresh_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn blob_roundtrip() {
        let store = memory_store().await;
        let key = CacheKey::reserved("precompute", "book:a1");
        let value = serde_json::json!({ "next_chunk": 17 });

        store.put_blob(&key, value.clone()).await.unwrap();
        let fetched = store.get_blob(&key).await.unwrap().unwrap();
        assert_eq!(fetched, value);
        assert!(store.get_blob(&CacheKey::reserved("precompute", "other")).await.unwrap().is_none());
    }
}
