//! Background precompute of level-graded renditions.
//!
//! Walks priority (book, level) pairs and pushes every chunk through the
//! shared [`SimplificationService`], so background work deduplicates
//! against interactive traffic and lands in the same cache. Chunks whose
//! current-version result is already cached are skipped. A resume cursor
//! per (book, level) is persisted to the durable store after each chunk,
//! so a restart continues where the sweep left off.

use gradelit_config::SchedulerConfig;
use gradelit_core::store::BlobStore;
use gradelit_core::{BookId, CacheKey, CefrLevel, DomainEvent, Error, EventBus, Result};
use gradelit_pipeline::SimplificationService;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One entry of the precompute priority list, most urgent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecomputePriority {
    pub book_id: BookId,
    pub level: CefrLevel,
}

#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    next_chunk: u32,
}

pub struct PrecomputeScheduler {
    service: Arc<SimplificationService>,
    cursors: Arc<dyn BlobStore>,
    events: Arc<EventBus>,
    concurrency: usize,
    chunk_pause: Duration,
}

impl PrecomputeScheduler {
    pub fn new(
        service: Arc<SimplificationService>,
        cursors: Arc<dyn BlobStore>,
        config: &SchedulerConfig,
    ) -> Self {
        let events = Arc::clone(service.events());
        Self {
            service,
            cursors,
            events,
            concurrency: config.concurrency.max(1),
            chunk_pause: Duration::from_millis(config.chunk_pause_ms),
        }
    }

    /// Sweep the priority list in order. A failing sweep is logged and the
    /// next priority proceeds; only internal faults abort the run.
    pub async fn run(&self, priorities: &[PrecomputePriority]) -> Result<()> {
        for priority in priorities {
            if let Err(e) = self.sweep(priority).await {
                warn!(
                    book_id = %priority.book_id,
                    level = %priority.level,
                    error = %e,
                    "Precompute sweep failed, moving to next priority"
                );
            }
        }
        Ok(())
    }

    async fn sweep(&self, priority: &PrecomputePriority) -> Result<()> {
        let count = self.service.chunk_count(&priority.book_id).await?;
        let cursor_key = cursor_key(&priority.book_id, priority.level);
        let start = self.load_cursor(&cursor_key).await;

        if start >= count {
            debug!(
                book_id = %priority.book_id,
                level = %priority.level,
                "Precompute already complete"
            );
            return Ok(());
        }
        info!(
            book_id = %priority.book_id,
            level = %priority.level,
            start,
            count,
            "Precompute sweep starting"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut pending: VecDeque<(u32, JoinHandle<()>)> = VecDeque::new();

        for chunk_index in start..count {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| Error::Internal("scheduler semaphore closed".into()))?;

            let service = Arc::clone(&self.service);
            let events = Arc::clone(&self.events);
            let book_id = priority.book_id.clone();
            let level = priority.level;
            let handle = tokio::spawn(async move {
                let _permit = permit;
                process_chunk(service, events, book_id, level, chunk_index).await;
            });
            pending.push_back((chunk_index, handle));

            // The cursor only advances in submission order, so a restart
            // can never skip a chunk that was still in flight.
            while pending.len() >= self.concurrency {
                self.drain_front(&mut pending, &cursor_key).await;
            }

            if !self.chunk_pause.is_zero() {
                tokio::time::sleep(self.chunk_pause).await;
            }
        }

        while !pending.is_empty() {
            self.drain_front(&mut pending, &cursor_key).await;
        }

        info!(
            book_id = %priority.book_id,
            level = %priority.level,
            count,
            "Precompute sweep finished"
        );
        Ok(())
    }

    async fn drain_front(
        &self,
        pending: &mut VecDeque<(u32, JoinHandle<()>)>,
        cursor_key: &CacheKey,
    ) {
        if let Some((chunk_index, handle)) = pending.pop_front() {
            if let Err(e) = handle.await {
                warn!(chunk_index, error = %e, "Precompute task panicked");
            }
            self.save_cursor(cursor_key, chunk_index + 1).await;
        }
    }

    async fn load_cursor(&self, key: &CacheKey) -> u32 {
        match self.cursors.get_blob(key).await {
            Ok(Some(value)) => match serde_json::from_value::<Cursor>(value) {
                Ok(cursor) => cursor.next_chunk,
                Err(e) => {
                    warn!(key = %key, error = %e, "Unreadable precompute cursor, restarting sweep");
                    0
                }
            },
            Ok(None) => 0,
            Err(e) => {
                warn!(key = %key, error = %e, "Cursor store unavailable, restarting sweep");
                0
            }
        }
    }

    async fn save_cursor(&self, key: &CacheKey, next_chunk: u32) {
        let value = match serde_json::to_value(Cursor { next_chunk }) {
            Ok(value) => value,
            Err(_) => return,
        };
        if let Err(e) = self.cursors.put_blob(key, value).await {
            warn!(key = %key, error = %e, "Failed to persist precompute cursor");
        }
    }
}

async fn process_chunk(
    service: Arc<SimplificationService>,
    events: Arc<EventBus>,
    book_id: BookId,
    level: CefrLevel,
    chunk_index: u32,
) {
    match service.peek_cached(&book_id, chunk_index, level).await {
        Ok(Some(_)) => {
            events.publish(DomainEvent::PrecomputeProgress {
                book_id,
                level,
                chunk_index,
                skipped: true,
            });
            return;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(
                book_id = %book_id,
                chunk_index,
                error = %e,
                "Precompute cache peek failed"
            );
            return;
        }
    }

    match service.request_simplification(&book_id, chunk_index, level).await {
        Ok(_) => {
            events.publish(DomainEvent::PrecomputeProgress {
                book_id,
                level,
                chunk_index,
                skipped: false,
            });
        }
        Err(e) => {
            warn!(
                book_id = %book_id,
                chunk_index,
                level = %level,
                error = %e,
                "Precompute chunk failed"
            );
        }
    }
}

fn cursor_key(book_id: &BookId, level: CefrLevel) -> CacheKey {
    CacheKey::reserved("precompute", &format!("{}:{}", book_id, level.label()))
}
