//! Text analysis for GradeLit: source-era classification and sentence-safe
//! chunking.
//!
//! Both operations are pure, synchronous, and deterministic — they sit in
//! front of the async pipeline and never touch an external service.

pub mod chunker;
pub mod era;

pub use chunker::{chunk_text, ChunkSpan};
pub use era::classify_era;

use gradelit_core::{BookId, SourceChunk};

/// Turn a book's raw text into ordered source chunks, each tagged with its
/// classified era.
///
/// Convenience composition for catalog implementations: chunking and
/// classification together, in one pass over the text.
pub fn ingest_book(
    book_id: impl Into<BookId>,
    text: &str,
    target_words: usize,
) -> Vec<SourceChunk> {
    let book_id = book_id.into();
    chunk_text(text, target_words)
        .into_iter()
        .map(|span| {
            let era = classify_era(&span.text);
            SourceChunk::new(book_id.clone(), span.index, span.text, era)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradelit_core::Era;

    #[test]
    fn ingest_tags_each_chunk_with_its_own_era() {
        let text = "Thou shalt not pass, for thy hour hath not come. \
                    The committee approved the new schedule after a short discussion.";
        let chunks = ingest_book("book-1", text, 8);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].era, Era::EarlyModern);
        assert_eq!(chunks[1].era, Era::Modern);
        assert_eq!(chunks[0].book_id, BookId::new("book-1"));
        assert_eq!(chunks[1].chunk_index, 1);
    }
}
