//! Session registry and control surface.

use crate::session::{PlaybackState, SessionTask};
use crate::ChunkTextSource;
use gradelit_config::NarrationConfig;
use gradelit_core::{
    BookId, CefrLevel, DomainEvent, Error, EventBus, Handoff, NarrationError, ProviderError,
    Result, SpeechProvider, VoiceParams,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::info;

/// A point-in-time view of one session's progress.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub current_chunk_index: u32,
    pub current_word_index: usize,
    /// Name of the speech provider behind the current audio.
    pub provider: String,
    pub handoff: Option<Handoff>,
    pub ended: bool,
}

struct SessionHandle {
    state: watch::Sender<PlaybackState>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
}

/// Owns all narration sessions. Sessions are created by [`start`], mutated
/// only by their own task, and removed on stop or natural end.
///
/// [`start`]: NarrationSynchronizer::start
pub struct NarrationSynchronizer {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    text: Arc<dyn ChunkTextSource>,
    speech: Vec<Arc<dyn SpeechProvider>>,
    events: Arc<EventBus>,
    config: NarrationConfig,
}

impl NarrationSynchronizer {
    pub fn new(
        text: Arc<dyn ChunkTextSource>,
        speech: Vec<Arc<dyn SpeechProvider>>,
        events: Arc<EventBus>,
        config: NarrationConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            text,
            speech,
            events,
            config,
        }
    }

    /// Begin narrating a book at one level from `start_chunk`.
    pub async fn start(
        &self,
        book_id: BookId,
        start_chunk: u32,
        level: CefrLevel,
        voice: VoiceParams,
    ) -> Result<String> {
        if self.speech.is_empty() {
            return Err(ProviderError::NotConfigured("no speech providers".into()).into());
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let (state_tx, state_rx) = watch::channel(PlaybackState::Playing);
        let snapshot = Arc::new(Mutex::new(SessionSnapshot {
            current_chunk_index: start_chunk,
            ..SessionSnapshot::default()
        }));

        info!(
            session_id = %session_id,
            book_id = %book_id,
            level = %level,
            start_chunk,
            "Narration session starting"
        );

        let task = SessionTask {
            session_id: session_id.clone(),
            book_id,
            level,
            voice,
            text: Arc::clone(&self.text),
            speech: self.speech.clone(),
            events: Arc::clone(&self.events),
            config: self.config.clone(),
            state: state_rx,
            snapshot: Arc::clone(&snapshot),
        };

        let sessions = Arc::clone(&self.sessions);
        let id_for_cleanup = session_id.clone();
        tokio::spawn(async move {
            task.run(start_chunk).await;
            sessions.write().await.remove(&id_for_cleanup);
        });

        self.sessions.write().await.insert(
            session_id.clone(),
            SessionHandle {
                state: state_tx,
                snapshot,
            },
        );
        Ok(session_id)
    }

    /// Receiver of all domain events; filter by `session_id` fields.
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<broadcast::Receiver<Arc<DomainEvent>>> {
        self.ensure_exists(session_id).await?;
        Ok(self.events.subscribe())
    }

    pub async fn pause(&self, session_id: &str) -> Result<()> {
        self.set_state(session_id, PlaybackState::Paused).await
    }

    pub async fn resume(&self, session_id: &str) -> Result<()> {
        self.set_state(session_id, PlaybackState::Playing).await
    }

    /// Stop and destroy a session. The task exits at its next word
    /// boundary; the handle is removed immediately.
    pub async fn stop(&self, session_id: &str) -> Result<()> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        let _ = handle.state.send(PlaybackState::Stopped);
        info!(session_id, "Narration session stopped");
        Ok(())
    }

    /// Progress snapshot of a live session.
    pub async fn session(&self, session_id: &str) -> Option<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        let handle = sessions.get(session_id)?;
        handle.snapshot.lock().ok().map(|s| s.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn set_state(&self, session_id: &str, state: PlaybackState) -> Result<()> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        handle
            .state
            .send(state)
            .map_err(|_| Error::from(NarrationError::SessionEnded(session_id.to_string())))
    }

    async fn ensure_exists(&self, session_id: &str) -> Result<()> {
        if self.sessions.read().await.contains_key(session_id) {
            Ok(())
        } else {
            Err(session_not_found(session_id))
        }
    }
}

fn session_not_found(session_id: &str) -> Error {
    NarrationError::SessionNotFound(session_id.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gradelit_core::{CatalogError, SpeechOutput, WordTiming};
    use std::time::Duration;

    struct TwoChunkText;

    #[async_trait]
    impl ChunkTextSource for TwoChunkText {
        async fn chunk_text(
            &self,
            _book_id: &BookId,
            chunk_index: u32,
            _level: CefrLevel,
        ) -> Result<String> {
            match chunk_index {
                0 => Ok("the storm broke at dawn".into()),
                1 => Ok("the crew held the line".into()),
                _ => Err(CatalogError::ChunkNotFound {
                    book_id: "book".into(),
                    chunk_index,
                }
                .into()),
            }
        }

        async fn chunk_count(&self, _book_id: &BookId) -> Result<u32> {
            Ok(2)
        }
    }

    struct TimedSpeech {
        name: String,
        word_ms: u64,
    }

    #[async_trait]
    impl SpeechProvider for TimedSpeech {
        fn name(&self) -> &str {
            &self.name
        }

        async fn synthesize(
            &self,
            text: &str,
            _voice: &VoiceParams,
        ) -> std::result::Result<SpeechOutput, ProviderError> {
            let timings: Vec<WordTiming> = text
                .split_whitespace()
                .enumerate()
                .map(|(i, w)| {
                    WordTiming::new(w, i as u64 * self.word_ms, (i as u64 + 1) * self.word_ms)
                })
                .collect();
            let duration_ms = timings.last().map(|t| t.end_ms).unwrap_or(0);
            Ok(SpeechOutput {
                audio: vec![0u8; 16],
                timings,
                duration_ms,
                provider: self.name.clone(),
            })
        }
    }

    struct HangingSpeech;

    #[async_trait]
    impl SpeechProvider for HangingSpeech {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn synthesize(
            &self,
            _text: &str,
            _voice: &VoiceParams,
        ) -> std::result::Result<SpeechOutput, ProviderError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Err(ProviderError::Timeout("never".into()))
        }
    }

    fn synchronizer(speech: Vec<Arc<dyn SpeechProvider>>) -> (NarrationSynchronizer, Arc<EventBus>) {
        let events = Arc::new(EventBus::new(256));
        let sync = NarrationSynchronizer::new(
            Arc::new(TwoChunkText),
            speech,
            events.clone(),
            NarrationConfig::default(),
        );
        (sync, events)
    }

    fn primary() -> Arc<dyn SpeechProvider> {
        Arc::new(TimedSpeech {
            name: "primary".into(),
            word_ms: 200,
        })
    }

    async fn collect_until_ended(
        rx: &mut broadcast::Receiver<Arc<DomainEvent>>,
    ) -> Vec<Arc<DomainEvent>> {
        let mut collected = Vec::new();
        loop {
            let event = rx.recv().await.unwrap();
            let ended = matches!(
                event.as_ref(),
                DomainEvent::NarrationEnded { .. } | DomainEvent::NarrationFailed { .. }
            );
            collected.push(event);
            if ended {
                return collected;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn highlights_are_monotonic_and_cover_both_chunks() {
        let (sync, events) = synchronizer(vec![primary()]);
        let mut rx = events.subscribe();

        sync.start(BookId::new("book"), 0, CefrLevel::A2, VoiceParams::default())
            .await
            .unwrap();
        let collected = collect_until_ended(&mut rx).await;

        let mut per_chunk: HashMap<u32, Vec<u64>> = HashMap::new();
        for event in &collected {
            if let DomainEvent::WordHighlight {
                chunk_index, at_ms, ..
            } = event.as_ref()
            {
                per_chunk.entry(*chunk_index).or_default().push(*at_ms);
            }
        }

        // 5 words per chunk, non-decreasing within each chunk.
        assert_eq!(per_chunk[&0].len(), 5);
        assert_eq!(per_chunk[&1].len(), 5);
        for times in per_chunk.values() {
            assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }

        assert!(matches!(
            collected.last().unwrap().as_ref(),
            DomainEvent::NarrationEnded { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_advance_carries_handoff_within_crossfade_bounds() {
        let (sync, events) = synchronizer(vec![primary()]);
        let mut rx = events.subscribe();

        sync.start(BookId::new("book"), 0, CefrLevel::A2, VoiceParams::default())
            .await
            .unwrap();
        let collected = collect_until_ended(&mut rx).await;

        let advance = collected
            .iter()
            .find_map(|e| match e.as_ref() {
                DomainEvent::ChunkAdvance {
                    handoff,
                    crossfade_ms,
                    ..
                } => Some((handoff.clone(), *crossfade_ms)),
                _ => None,
            })
            .expect("expected a ChunkAdvance event");

        assert_eq!(advance.0.next_chunk_index, 1);
        assert_eq!(advance.0.first_word_start_ms, 0);
        assert!((150..=250).contains(&advance.1));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_primary_switches_provider_and_keeps_narrating() {
        let (sync, events) = synchronizer(vec![Arc::new(HangingSpeech), primary()]);
        let mut rx = events.subscribe();

        sync.start(BookId::new("book"), 0, CefrLevel::A2, VoiceParams::default())
            .await
            .unwrap();
        let collected = collect_until_ended(&mut rx).await;

        assert!(collected.iter().any(|e| matches!(
            e.as_ref(),
            DomainEvent::ProviderSwitched { from, to, .. } if from == "hanging" && to == "primary"
        )));
        let highlights = collected
            .iter()
            .filter(|e| matches!(e.as_ref(), DomainEvent::WordHighlight { .. }))
            .count();
        assert_eq!(highlights, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_highlights_until_resume() {
        let (sync, events) = synchronizer(vec![primary()]);
        let mut rx = events.subscribe();

        let id = sync
            .start(BookId::new("book"), 0, CefrLevel::A2, VoiceParams::default())
            .await
            .unwrap();

        // First highlight arrives, then pause.
        loop {
            if matches!(
                rx.recv().await.unwrap().as_ref(),
                DomainEvent::WordHighlight { .. }
            ) {
                break;
            }
        }
        sync.pause(&id).await.unwrap();

        // Give the task time to reach the pause gate, then drain whatever
        // was already in flight.
        tokio::time::sleep(Duration::from_millis(300)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err(), "no events while paused");

        sync.resume(&id).await.unwrap();
        let collected = collect_until_ended(&mut rx).await;
        assert!(matches!(
            collected.last().unwrap().as_ref(),
            DomainEvent::NarrationEnded { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_destroys_the_session() {
        let (sync, _events) = synchronizer(vec![primary()]);

        let id = sync
            .start(BookId::new("book"), 0, CefrLevel::A2, VoiceParams::default())
            .await
            .unwrap();
        assert_eq!(sync.session_count().await, 1);

        sync.stop(&id).await.unwrap();
        assert_eq!(sync.session_count().await, 0);
        assert!(sync.pause(&id).await.is_err());
        assert!(sync.subscribe(&id).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn session_ends_after_last_chunk_and_removes_itself() {
        let (sync, events) = synchronizer(vec![primary()]);
        let mut rx = events.subscribe();

        sync.start(BookId::new("book"), 1, CefrLevel::A2, VoiceParams::default())
            .await
            .unwrap();
        let collected = collect_until_ended(&mut rx).await;

        // Started on the final chunk: highlights but no advance.
        assert!(!collected
            .iter()
            .any(|e| matches!(e.as_ref(), DomainEvent::ChunkAdvance { .. })));

        // Let the cleanup task run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sync.session_count().await, 0);
    }

    #[tokio::test]
    async fn no_speech_providers_is_an_error() {
        let (sync, _events) = synchronizer(vec![]);
        let err = sync
            .start(BookId::new("book"), 0, CefrLevel::A2, VoiceParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
