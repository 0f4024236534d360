//! The per-session playback task.
//!
//! One task owns all mutable session state. It fetches the graded text,
//! synthesizes audio, then drives a playback clock over the word timings,
//! publishing highlights as it goes. Pause stretches the clock; stop ends
//! the task at the next word boundary.

use crate::synchronizer::SessionSnapshot;
use crate::ChunkTextSource;
use gradelit_config::NarrationConfig;
use gradelit_core::timing::{heuristic_timings, timings_are_monotonic};
use gradelit_core::{
    BookId, CefrLevel, DomainEvent, EventBus, Handoff, NarrationError, ProviderError, Result,
    SpeechOutput, SpeechProvider, VoiceParams,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

enum Playback {
    Stopped,
    Finished(Option<SpeechOutput>),
}

enum SessionEnd {
    Completed,
    Stopped,
}

/// Everything a detached synthesis call needs; cloned into prefetch tasks.
#[derive(Clone)]
struct SynthContext {
    session_id: String,
    book_id: BookId,
    level: CefrLevel,
    voice: VoiceParams,
    text: Arc<dyn ChunkTextSource>,
    speech: Vec<Arc<dyn SpeechProvider>>,
    events: Arc<EventBus>,
    stall_timeout: Duration,
}

pub(crate) struct SessionTask {
    pub session_id: String,
    pub book_id: BookId,
    pub level: CefrLevel,
    pub voice: VoiceParams,
    pub text: Arc<dyn ChunkTextSource>,
    pub speech: Vec<Arc<dyn SpeechProvider>>,
    pub events: Arc<EventBus>,
    pub config: NarrationConfig,
    pub state: watch::Receiver<PlaybackState>,
    pub snapshot: Arc<Mutex<SessionSnapshot>>,
}

impl SessionTask {
    pub async fn run(mut self, start_chunk: u32) {
        match self.drive(start_chunk).await {
            Ok(SessionEnd::Completed) => {
                info!(session_id = %self.session_id, "Narration reached end of book");
                self.events.publish(DomainEvent::NarrationEnded {
                    session_id: self.session_id.clone(),
                });
            }
            Ok(SessionEnd::Stopped) => {
                debug!(session_id = %self.session_id, "Narration stopped");
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Narration failed");
                self.events.publish(DomainEvent::NarrationFailed {
                    session_id: self.session_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        self.update_snapshot(|s| s.ended = true);
    }

    async fn drive(&mut self, start_chunk: u32) -> Result<SessionEnd> {
        let chunk_count = self.text.chunk_count(&self.book_id).await?;
        if start_chunk >= chunk_count {
            return Ok(SessionEnd::Completed);
        }

        let mut current = start_chunk;
        let mut audio = synthesize_chunk(self.synth_ctx(), current).await?;

        loop {
            let provider = audio.provider.clone();
            self.update_snapshot(|s| {
                s.current_chunk_index = current;
                s.current_word_index = 0;
                s.provider = provider.clone();
            });

            let has_next = current + 1 < chunk_count;
            match self.play_chunk(current, &audio, has_next).await? {
                Playback::Stopped => return Ok(SessionEnd::Stopped),
                Playback::Finished(prefetched) => {
                    if !has_next {
                        return Ok(SessionEnd::Completed);
                    }
                    let next_index = current + 1;
                    // Hold here if the prefetch missed; the clock resumes
                    // once the next chunk's audio exists.
                    let next_audio = match prefetched {
                        Some(audio) => audio,
                        None => synthesize_chunk(self.synth_ctx(), next_index).await?,
                    };

                    let handoff = Handoff {
                        next_chunk_index: next_index,
                        first_word_start_ms: next_audio
                            .timings
                            .first()
                            .map(|t| t.start_ms)
                            .unwrap_or(0),
                    };
                    tokio::time::sleep(Duration::from_millis(self.config.crossfade_ms)).await;
                    self.events.publish(DomainEvent::ChunkAdvance {
                        session_id: self.session_id.clone(),
                        handoff: handoff.clone(),
                        crossfade_ms: self.config.crossfade_ms,
                    });
                    self.update_snapshot(|s| s.handoff = Some(handoff));

                    current = next_index;
                    audio = next_audio;
                }
            }
        }
    }

    async fn play_chunk(
        &mut self,
        chunk_index: u32,
        audio: &SpeechOutput,
        has_next: bool,
    ) -> Result<Playback> {
        let mut prefetch: Option<JoinHandle<Result<SpeechOutput>>> = None;
        let start = tokio::time::Instant::now();
        let mut paused = Duration::ZERO;
        let total_ms = audio
            .duration_ms
            .max(audio.timings.last().map(|t| t.end_ms).unwrap_or(0));
        let word_total = audio.timings.len();

        for (index, timing) in audio.timings.iter().enumerate() {
            if !self.wait_until_playing(&mut paused).await {
                if let Some(handle) = prefetch {
                    handle.abort();
                }
                return Ok(Playback::Stopped);
            }

            tokio::time::sleep_until(start + paused + Duration::from_millis(timing.start_ms))
                .await;
            self.events.publish(DomainEvent::WordHighlight {
                session_id: self.session_id.clone(),
                chunk_index,
                word_index: index,
                word: timing.word.clone(),
                at_ms: timing.start_ms,
            });
            self.update_snapshot(|s| s.current_word_index = index);

            if has_next && prefetch.is_none() {
                let elapsed_fraction = timing.start_ms as f64 / total_ms.max(1) as f64;
                let words_remaining = word_total - index - 1;
                if elapsed_fraction >= self.config.prefetch_elapsed_fraction as f64
                    || words_remaining <= self.config.prefetch_words_remaining
                {
                    debug!(
                        session_id = %self.session_id,
                        chunk_index,
                        words_remaining,
                        "Prefetching next chunk"
                    );
                    prefetch = Some(tokio::spawn(synthesize_chunk(
                        self.synth_ctx(),
                        chunk_index + 1,
                    )));
                }
            }
        }

        // Let the audio tail past the last word finish playing.
        tokio::time::sleep_until(start + paused + Duration::from_millis(total_ms)).await;

        let prefetched = match prefetch {
            Some(handle) => match handle.await {
                Ok(Ok(audio)) => Some(audio),
                Ok(Err(e)) => {
                    warn!(error = %e, "Prefetch failed, synthesizing at the boundary");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Prefetch task aborted");
                    None
                }
            },
            None => None,
        };
        Ok(Playback::Finished(prefetched))
    }

    /// Block while paused, accumulating the pause into the clock offset.
    /// Returns false when the session was stopped.
    async fn wait_until_playing(&mut self, paused: &mut Duration) -> bool {
        loop {
            let state = *self.state.borrow();
            match state {
                PlaybackState::Playing => return true,
                PlaybackState::Stopped => return false,
                PlaybackState::Paused => {
                    let pause_start = tokio::time::Instant::now();
                    if self.state.changed().await.is_err() {
                        return false;
                    }
                    *paused += pause_start.elapsed();
                }
            }
        }
    }

    fn synth_ctx(&self) -> SynthContext {
        SynthContext {
            session_id: self.session_id.clone(),
            book_id: self.book_id.clone(),
            level: self.level,
            voice: self.voice.clone(),
            text: Arc::clone(&self.text),
            speech: self.speech.clone(),
            events: Arc::clone(&self.events),
            stall_timeout: Duration::from_millis(self.config.stall_timeout_ms),
        }
    }

    fn update_snapshot(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        if let Ok(mut snapshot) = self.snapshot.lock() {
            f(&mut snapshot);
        }
    }
}

/// Fetch the graded text and synthesize it, failing over across providers.
///
/// The primary provider gets one retry after a stall; each fallback
/// provider gets one try. Output with a missing or broken timing track is
/// patched with length-weighted heuristic timings.
async fn synthesize_chunk(ctx: SynthContext, chunk_index: u32) -> Result<SpeechOutput> {
    let text = ctx
        .text
        .chunk_text(&ctx.book_id, chunk_index, ctx.level)
        .await?;

    let mut last_error: Option<ProviderError> = None;
    for (position, provider) in ctx.speech.iter().enumerate() {
        let tries = if position == 0 { 2 } else { 1 };
        for attempt in 1..=tries {
            match tokio::time::timeout(ctx.stall_timeout, provider.synthesize(&text, &ctx.voice))
                .await
            {
                Ok(Ok(mut output)) => {
                    if output.timings.is_empty() || !timings_are_monotonic(&output.timings) {
                        output.timings = heuristic_timings(&text, output.duration_ms);
                    }
                    if position > 0 {
                        warn!(
                            session_id = %ctx.session_id,
                            chunk_index,
                            from = ctx.speech[0].name(),
                            to = provider.name(),
                            "Speech provider switched mid-session"
                        );
                        ctx.events.publish(DomainEvent::ProviderSwitched {
                            session_id: ctx.session_id.clone(),
                            from: ctx.speech[0].name().to_string(),
                            to: provider.name().to_string(),
                            chunk_index,
                        });
                    }
                    return Ok(output);
                }
                Ok(Err(e)) => {
                    warn!(
                        provider = provider.name(),
                        chunk_index,
                        attempt,
                        error = %e,
                        "Speech synthesis failed"
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        chunk_index,
                        attempt,
                        stall_ms = ctx.stall_timeout.as_millis() as u64,
                        "Speech synthesis stalled"
                    );
                    last_error = Some(ProviderError::Timeout(format!(
                        "synthesis stalled beyond {}ms",
                        ctx.stall_timeout.as_millis()
                    )));
                }
            }
        }
    }

    Err(NarrationError::AllProvidersFailed(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no speech providers configured".into()),
    )
    .into())
}
