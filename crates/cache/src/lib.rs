//! Versioned two-tier result cache for GradeLit.
//!
//! A hot in-memory tier (short TTL) sits over a durable SQLite tier (long
//! TTL). Reads check hot first, fall through to durable, and repopulate
//! hot on a durable hit. Writes go through both tiers. A pipeline version
//! bump changes the key space instead of touching stored entries, so old
//! entries age out by TTL and reverting the version revives them — safe
//! rollback with no migration.

pub mod durable;
pub mod hot;
pub mod tiered;

pub use durable::SqliteCacheStore;
pub use hot::HotCacheStore;
pub use tiered::TieredCache;
