//! Synchronized spoken narration.
//!
//! A session walks a book's chunk sequence at one level: fetch the graded
//! text, synthesize audio with word timings, emit highlight events against
//! a playback clock, prefetch the next chunk near the end, and advance
//! through a bounded crossfade window. Synthesis stalls fail over to the
//! next speech provider mid-session, with heuristic timings until real
//! ones exist.

pub mod session;
pub mod synchronizer;

pub use synchronizer::{NarrationSynchronizer, SessionSnapshot};

use async_trait::async_trait;
use gradelit_core::{BookId, CefrLevel, Result};
use gradelit_pipeline::SimplificationService;

/// Where the narration gets its level-graded text from.
///
/// In production this is the simplification service, so narration shares
/// the cache and single-flight with interactive reading.
#[async_trait]
pub trait ChunkTextSource: Send + Sync {
    async fn chunk_text(
        &self,
        book_id: &BookId,
        chunk_index: u32,
        level: CefrLevel,
    ) -> Result<String>;

    async fn chunk_count(&self, book_id: &BookId) -> Result<u32>;
}

#[async_trait]
impl ChunkTextSource for SimplificationService {
    async fn chunk_text(
        &self,
        book_id: &BookId,
        chunk_index: u32,
        level: CefrLevel,
    ) -> Result<String> {
        let result = self
            .request_simplification(book_id, chunk_index, level)
            .await?;
        Ok(result.text)
    }

    async fn chunk_count(&self, book_id: &BookId) -> Result<u32> {
        SimplificationService::chunk_count(self, book_id).await
    }
}
