//! Retry/fallback controller — the state machine that guarantees a result.
//!
//! Each quality attempt generates a candidate and scores it. A rejected
//! candidate consumes one attempt and the next one runs with reduced
//! creativity under the constrained strategy. Transient infrastructure
//! failures do NOT consume a quality attempt; they retry the same attempt
//! under a separate, bounded backoff budget.
//!
//! When the attempt budget is exhausted the controller serves the original
//! text with `Quality::Failed` and `used_fallback = true`. The only hard
//! errors out of `run` are configuration holes.

use crate::engine::SimplificationEngine;
use crate::routing;
use chrono::Utc;
use gradelit_config::PipelineConfig;
use gradelit_core::{
    CefrLevel, Error, EventBus, GeneratedText, GenerationParams, ProviderError, Quality,
    SimplificationResult, SourceChunk,
};
use gradelit_scoring::{QualityScorer, ScoreReport, ScoringError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct RetryController {
    engine: SimplificationEngine,
    scorer: QualityScorer,
    events: Arc<EventBus>,
}

impl RetryController {
    pub fn new(engine: SimplificationEngine, scorer: QualityScorer, events: Arc<EventBus>) -> Self {
        Self {
            engine,
            scorer,
            events,
        }
    }

    /// Drive one chunk through generate/score until accepted or exhausted.
    pub async fn run(
        &self,
        chunk: &SourceChunk,
        level: CefrLevel,
        config: &PipelineConfig,
    ) -> Result<SimplificationResult, Error> {
        let threshold = config.threshold_for(chunk.era, level).map_err(Error::from)?;
        let max_attempts = config.generation.max_quality_attempts;
        let deadline = Duration::from_secs(config.generation.generate_timeout_secs);

        let mut last_params = routing::params_for(config, chunk.era, level, 1)?;
        let mut last_score: Option<f32> = None;
        let mut last_attempt = 1;

        for attempt in 1..=max_attempts {
            let params = routing::params_for(config, chunk.era, level, attempt)?;
            last_params = params;
            last_attempt = attempt;

            let generated = match self
                .generate_with_backoff(chunk, level, params, deadline, config)
                .await
            {
                Ok(generated) => generated,
                Err(e) => {
                    warn!(
                        book_id = %chunk.book_id,
                        chunk_index = chunk.chunk_index,
                        attempt,
                        error = %e,
                        "Generation unavailable, serving fallback"
                    );
                    break;
                }
            };

            let report = match self
                .score_with_backoff(&chunk.text, &generated.text, chunk, level, config)
                .await
            {
                Ok(report) => report,
                Err(ScoringError::Config(e)) => return Err(e.into()),
                Err(ScoringError::Provider(e)) => {
                    warn!(
                        book_id = %chunk.book_id,
                        chunk_index = chunk.chunk_index,
                        attempt,
                        error = %e,
                        "Scoring unavailable, serving fallback"
                    );
                    break;
                }
            };
            last_score = report.score.or(last_score);

            if report.quality != Quality::Failed {
                return Ok(SimplificationResult {
                    text: generated.text,
                    similarity_score: report.score,
                    threshold: report.threshold,
                    rule_violations: report.violations,
                    quality: report.quality,
                    used_fallback: false,
                    attempt,
                    model_params: params,
                });
            }

            info!(
                book_id = %chunk.book_id,
                chunk_index = chunk.chunk_index,
                level = %level,
                attempt,
                score = ?report.score,
                threshold = report.threshold,
                violations = report.violations.len(),
                "Candidate rejected by quality gate"
            );
        }

        warn!(
            book_id = %chunk.book_id,
            chunk_index = chunk.chunk_index,
            level = %level,
            attempts = last_attempt,
            last_score = ?last_score,
            "Quality attempts exhausted, serving original text"
        );
        self.events.publish(gradelit_core::DomainEvent::FallbackServed {
            book_id: chunk.book_id.clone(),
            chunk_index: chunk.chunk_index,
            level,
            last_score,
            timestamp: Utc::now(),
        });

        // `attempt` records the work actually done: an infrastructure
        // break on attempt 1 is not three attempts.
        Ok(SimplificationResult::fallback(
            chunk.text.clone(),
            threshold,
            last_attempt,
            last_params,
        ))
    }

    async fn generate_with_backoff(
        &self,
        chunk: &SourceChunk,
        level: CefrLevel,
        params: GenerationParams,
        deadline: Duration,
        config: &PipelineConfig,
    ) -> Result<GeneratedText, ProviderError> {
        let mut retries = 0u32;
        loop {
            match self
                .engine
                .generate(&chunk.text, chunk.era, level, params, deadline)
                .await
            {
                Ok(generated) => return Ok(generated),
                Err(e) if e.is_transient() && retries < config.generation.transient_retry_limit => {
                    let backoff = Duration::from_millis(
                        config.generation.transient_backoff_ms * 2u64.pow(retries),
                    );
                    warn!(error = %e, retries, backoff_ms = backoff.as_millis() as u64, "Transient generation failure, backing off");
                    tokio::time::sleep(backoff).await;
                    retries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn score_with_backoff(
        &self,
        original: &str,
        candidate: &str,
        chunk: &SourceChunk,
        level: CefrLevel,
        config: &PipelineConfig,
    ) -> Result<ScoreReport, ScoringError> {
        let mut retries = 0u32;
        loop {
            match self
                .scorer
                .score(original, candidate, chunk.era, level, config)
                .await
            {
                Ok(report) => return Ok(report),
                Err(ScoringError::Provider(e))
                    if e.is_transient() && retries < config.generation.transient_retry_limit =>
                {
                    let backoff = Duration::from_millis(
                        config.generation.transient_backoff_ms * 2u64.pow(retries),
                    );
                    warn!(error = %e, retries, "Transient scoring failure, backing off");
                    tokio::time::sleep(backoff).await;
                    retries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
