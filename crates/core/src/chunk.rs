//! Source chunks — the read-only units of catalog text the pipeline rewrites.

use crate::level::Era;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a book in the external catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A sentence-aligned slice of catalog text.
///
/// Owned by the external catalog and treated as immutable here — the
/// pipeline never rewrites a `SourceChunk` in place, only derives
/// candidates from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub book_id: BookId,
    pub chunk_index: u32,
    pub text: String,
    pub word_count: usize,
    pub era: Era,
}

impl SourceChunk {
    pub fn new(
        book_id: impl Into<BookId>,
        chunk_index: u32,
        text: impl Into<String>,
        era: Era,
    ) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            book_id: book_id.into(),
            chunk_index,
            text,
            word_count,
            era,
        }
    }

    /// Stable content hash of the chunk text.
    ///
    /// Part of the cache key: if the catalog re-ingests a book and the text
    /// changes, old cached rewrites stop matching automatically.
    pub fn content_hash(&self) -> String {
        content_hash(&self.text)
    }
}

impl From<String> for BookId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// sha256 hex digest of a text, truncated to 16 hex chars.
///
/// Truncation keeps composite cache keys readable in logs; 64 bits of
/// content hash is ample for per-book chunk disambiguation.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}
