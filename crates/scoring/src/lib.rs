//! Quality scorer — the two-stage similarity gate plus rule validation.
//!
//! Stage 1 is a synchronous coarse lexical-overlap check that rejects
//! garbled or wrong-language output without spending an embedding call.
//! Stage 2 is the full embedding similarity compared against the
//! era-specific threshold. The rule validator runs independently and can
//! rescue a just-below-threshold candidate into the acceptable band when
//! it has zero violations.
//!
//! The scorer is a pure function of (original, candidate, era, level,
//! config snapshot) — given the same inputs and the same embedding
//! service, every decision is replayable.

pub mod overlap;
pub mod rules;

use gradelit_config::{ConfigError, PipelineConfig};
use gradelit_core::{CefrLevel, EmbeddingProvider, Era, ProviderError, Quality, RuleViolation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// The scorer's verdict on one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub quality: Quality,

    /// Full embedding similarity, when the candidate got that far.
    pub score: Option<f32>,

    /// The threshold compared against, recorded for auditability.
    pub threshold: f32,

    pub violations: Vec<RuleViolation>,

    /// True when stage 1 rejected the candidate before the embedding call.
    pub precheck_rejected: bool,
}

/// Why scoring could not produce a verdict at all.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// The (era, level) pair has no configured threshold. Fatal for the
    /// request; never silently defaulted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The embedding service failed; transient failures bubble up for the
    /// controller's backoff budget.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// The two-stage quality scorer.
pub struct QualityScorer {
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl QualityScorer {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embeddings }
    }

    /// Score a candidate rewrite of `original` for the given era/level.
    pub async fn score(
        &self,
        original: &str,
        candidate: &str,
        era: Era,
        level: CefrLevel,
        config: &PipelineConfig,
    ) -> Result<ScoreReport, ScoringError> {
        let threshold = config.threshold_for(era, level)?;

        // Stage 1: coarse lexical overlap, no suspension.
        let coarse = overlap::overlap_score(original, candidate);
        if coarse < config.scoring.precheck_floor {
            debug!(coarse, floor = config.scoring.precheck_floor, "Pre-check rejected candidate");
            return Ok(ScoreReport {
                quality: Quality::Failed,
                score: None,
                threshold,
                violations: Vec::new(),
                precheck_rejected: true,
            });
        }

        // Stage 2: full embedding similarity.
        let score = self.embeddings.similarity(original, candidate).await?;

        // Independent rule validation.
        let violations = rules::validate(original, candidate);

        let quality = if score >= threshold {
            Quality::High
        } else if score >= threshold - config.scoring.acceptable_band && violations.is_empty() {
            Quality::Acceptable
        } else {
            Quality::Failed
        };

        debug!(
            score,
            threshold,
            era = %era,
            level = %level,
            violations = violations.len(),
            quality = ?quality,
            "Scored candidate"
        );

        Ok(ScoreReport {
            quality,
            score: Some(score),
            threshold,
            violations,
            precheck_rejected: false,
        })
    }
}
