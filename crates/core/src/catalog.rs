//! Catalog trait — the read-only document store the pipeline pulls source
//! chunks from. Ingestion and metadata live outside this core.

use crate::chunk::{BookId, SourceChunk};
use crate::error::CatalogError;
use async_trait::async_trait;

/// Read access to the external document catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch one chunk of a book. Stable per content hash.
    async fn get_source_chunk(
        &self,
        book_id: &BookId,
        chunk_index: u32,
    ) -> std::result::Result<SourceChunk, CatalogError>;

    /// Number of chunks in a book, if known. Used by the precompute
    /// scheduler to bound its sweep.
    async fn chunk_count(&self, book_id: &BookId) -> std::result::Result<u32, CatalogError>;
}
