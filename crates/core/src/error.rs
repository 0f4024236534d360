//! Error types for the GradeLit domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Note the deliberate asymmetry baked into the taxonomy: a *quality gate*
//! failure is not an error at all — it is data (`Quality::Failed` plus the
//! guaranteed original-text fallback). Errors here are reserved for infra
//! faults, configuration holes, and terminal narration conditions.

use thiserror::Error;

/// The top-level error type for all GradeLit operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- External provider errors (generative / embedding / speech) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Catalog errors ---
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    // --- Cache errors ---
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // --- Narration errors ---
    #[error("Narration error: {0}")]
    Narration(#[from] NarrationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the generative-text, embedding, or speech services.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether this failure is transient (worth retrying with backoff at
    /// the SAME quality attempt) rather than a condition that should
    /// consume the quality-attempt budget or abort outright.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::Network(_)
            | ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            ProviderError::AuthenticationFailed(_)
            | ProviderError::NotConfigured(_)
            | ProviderError::MalformedResponse(_) => false,
        }
    }
}

/// Failures fetching source chunks from the external catalog.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Chunk not found: book {book_id}, chunk {chunk_index}")]
    ChunkNotFound { book_id: String, chunk_index: u32 },

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Failures in the versioned cache tiers.
///
/// The tiered cache absorbs durable-tier unavailability (degrading to
/// hot-only); these errors surface only from direct tier access.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt cache entry for key {key}: {reason}")]
    CorruptEntry { key: String, reason: String },
}

/// Failures inside a narration session.
#[derive(Debug, Clone, Error)]
pub enum NarrationError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already ended: {0}")]
    SessionEnded(String),

    #[error("All speech providers failed: {0}")]
    AllProvidersFailed(String),

    #[error("Invalid word timings: {0}")]
    InvalidTimings(String),
}
