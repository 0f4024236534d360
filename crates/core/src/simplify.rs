//! Simplification results and the generation parameters echoed back with
//! every result.

use serde::{Deserialize, Serialize};

/// How the prompt is framed for a given attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStrategy {
    /// Light vocabulary pruning — modern text at higher levels.
    LightPrune,
    /// Standard rewrite balancing simplification and fidelity.
    Balanced,
    /// Aggressive restructuring — archaic syntax down to low levels.
    AggressiveRewrite,
    /// Retry strategy: explicit preservation constraints for negation,
    /// conditionals, entities, and numbers. Trades aggressiveness for
    /// fidelity.
    ConstrainedRetry,
}

/// The concrete generation parameters selected for one attempt.
///
/// Echoed into the result so a cached entry records exactly how its text
/// was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature handed to the generative service.
    pub temperature: f32,
    pub strategy: PromptStrategy,
    /// 1-based quality attempt this text was generated on.
    pub attempt: u32,
}

/// Outcome bucket of the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Cleared the similarity threshold outright.
    High,
    /// Just below threshold but zero rule violations.
    Acceptable,
    /// Rejected; the served text is the untouched original.
    Failed,
}

/// A specific meaning-preservation rule the candidate broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleViolation {
    /// A negation present in the source is missing from the candidate.
    NegationDropped { word: String },
    /// A conditional marker ("if", "unless", ...) was lost.
    ConditionalDropped { word: String },
    /// A named entity changed or vanished.
    EntityChanged { entity: String },
    /// A number changed or vanished.
    NumberChanged { number: String },
    /// A core content noun of the source is absent from the candidate.
    ContentNounDropped { noun: String },
}

/// The final, cacheable outcome of one simplification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplificationResult {
    /// The text to serve: the accepted rewrite, or the original on fallback.
    pub text: String,

    /// Embedding similarity against the original, as measured at
    /// generation time. `None` when no candidate survived the pre-check.
    pub similarity_score: Option<f32>,

    /// The threshold the score was compared against at generation time.
    /// Stored alongside the score so the decision is auditable without
    /// consulting current configuration.
    pub threshold: f32,

    pub rule_violations: Vec<RuleViolation>,

    pub quality: Quality,

    /// True iff the original text is being served instead of a rewrite.
    pub used_fallback: bool,

    /// The quality attempt that produced this result (1-based).
    pub attempt: u32,

    /// The generation parameters used on that attempt.
    pub model_params: GenerationParams,
}

impl SimplificationResult {
    /// The guaranteed-safe result: original text, failed quality.
    ///
    /// Invariant: `quality == Failed` always pairs with
    /// `used_fallback == true` and the untouched source text.
    pub fn fallback(
        original_text: impl Into<String>,
        threshold: f32,
        attempt: u32,
        params: GenerationParams,
    ) -> Self {
        Self {
            text: original_text.into(),
            similarity_score: None,
            threshold,
            rule_violations: Vec::new(),
            quality: Quality::Failed,
            used_fallback: true,
            attempt,
            model_params: params,
        }
    }

    /// Whether this result holds a usable rewrite (high or acceptable).
    pub fn is_accepted(&self) -> bool {
        matches!(self.quality, Quality::High | Quality::Acceptable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_preserves_invariant() {
        let params = GenerationParams {
            temperature: 0.4,
            strategy: PromptStrategy::ConstrainedRetry,
            attempt: 3,
        };
        let result = SimplificationResult::fallback("the original", 0.65, 3, params);
        assert_eq!(result.quality, Quality::Failed);
        assert!(result.used_fallback);
        assert_eq!(result.text, "the original");
        assert!(!result.is_accepted());
    }

    #[test]
    fn rule_violation_serde_is_tagged() {
        let v = RuleViolation::NegationDropped { word: "not".into() };
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("negation_dropped"));
        assert!(json.contains("not"));
    }

    #[test]
    fn result_roundtrips_through_json() {
        let result = SimplificationResult {
            text: "Simple text.".into(),
            similarity_score: Some(0.81),
            threshold: 0.72,
            rule_violations: vec![],
            quality: Quality::High,
            used_fallback: false,
            attempt: 1,
            model_params: GenerationParams {
                temperature: 0.7,
                strategy: PromptStrategy::Balanced,
                attempt: 1,
            },
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: SimplificationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
