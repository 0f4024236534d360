//! Domain event system — decoupled communication between bounded contexts.
//!
//! Narration subscribers receive highlight/advance events here; the
//! pipeline and scheduler publish progress and fallback telemetry. Uses
//! `tokio::sync::broadcast` for multi-consumer pub/sub.

use crate::chunk::BookId;
use crate::level::CefrLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Continuity metadata carried across a chunk boundary so a consuming
/// surface can scroll and highlight immediately on switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub next_chunk_index: u32,
    /// Start offset of the next chunk's first word in its audio track.
    pub first_word_start_ms: u64,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The narration clock reached a new word.
    WordHighlight {
        session_id: String,
        chunk_index: u32,
        word_index: usize,
        word: String,
        at_ms: u64,
    },

    /// Playback advanced to the next chunk.
    ChunkAdvance {
        session_id: String,
        handoff: Handoff,
        /// Length of the crossfade/silence window used at the boundary.
        crossfade_ms: u64,
    },

    /// Speech synthesis failed over to another provider mid-session.
    ProviderSwitched {
        session_id: String,
        from: String,
        to: String,
        chunk_index: u32,
    },

    /// A narration session reached the end of its chunk sequence.
    NarrationEnded { session_id: String },

    /// A narration session hit a terminal error.
    NarrationFailed {
        session_id: String,
        reason: String,
    },

    /// A simplification result was produced (fresh or cached).
    SimplificationServed {
        book_id: BookId,
        chunk_index: u32,
        level: CefrLevel,
        cached: bool,
        attempt: u32,
    },

    /// The quality gate exhausted its attempts and the original text was
    /// served. Telemetry only; never an error.
    FallbackServed {
        book_id: BookId,
        chunk_index: u32,
        level: CefrLevel,
        last_score: Option<f32>,
        timestamp: DateTime<Utc>,
    },

    /// The precompute scheduler finished (or skipped) a chunk.
    PrecomputeProgress {
        book_id: BookId,
        level: CefrLevel,
        chunk_index: u32,
        skipped: bool,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Components can subscribe to receive all events and filter for what they
/// care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::WordHighlight {
            session_id: "s1".into(),
            chunk_index: 2,
            word_index: 7,
            word: "whale".into(),
            at_ms: 1420,
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::WordHighlight {
                word, word_index, ..
            } => {
                assert_eq!(word, "whale");
                assert_eq!(*word_index, 7);
            }
            _ => panic!("Expected WordHighlight event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::NarrationEnded {
            session_id: "gone".into(),
        });
    }
}
