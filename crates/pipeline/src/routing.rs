//! Generation parameter routing and prompt construction.
//!
//! The first attempt takes its temperature and strategy from the
//! configured (era, level) routing table. Every retry ratchets the
//! temperature DOWN by the configured step and switches to the constrained
//! strategy: retries exist because the quality gate rejected a candidate,
//! so the next one must trade creativity for fidelity.

use gradelit_config::{ConfigError, PipelineConfig};
use gradelit_core::{CefrLevel, Era, GenerationParams, GenerationPrompt, PromptStrategy};

/// Minimum temperature the retry ratchet can reach.
const TEMPERATURE_FLOOR: f32 = 0.1;

/// Parameters for the given 1-based quality attempt.
pub fn params_for(
    config: &PipelineConfig,
    era: Era,
    level: CefrLevel,
    attempt: u32,
) -> Result<GenerationParams, ConfigError> {
    let route = config.routing_for(era, level)?;
    if attempt <= 1 {
        return Ok(GenerationParams {
            temperature: route.temperature,
            strategy: route.strategy,
            attempt: 1,
        });
    }

    let step = config.generation.retry_temperature_step;
    let temperature = (route.temperature - step * (attempt - 1) as f32).max(TEMPERATURE_FLOOR);
    Ok(GenerationParams {
        temperature,
        strategy: PromptStrategy::ConstrainedRetry,
        attempt,
    })
}

fn strategy_instructions(strategy: PromptStrategy) -> &'static str {
    match strategy {
        PromptStrategy::LightPrune => {
            "Replace only vocabulary above the target level. Keep the sentence \
             structure, order, and length as close to the original as possible."
        }
        PromptStrategy::Balanced => {
            "Rewrite the passage at the target level. Simplify vocabulary and \
             split long sentences, but keep every event, claim, and detail."
        }
        PromptStrategy::AggressiveRewrite => {
            "Restructure the passage freely into plain contemporary English at \
             the target level. Modernize archaic grammar and vocabulary \
             completely while keeping the full meaning."
        }
        PromptStrategy::ConstrainedRetry => {
            "Rewrite the passage at the target level, staying close to the \
             original wording. Preserve every negation (not, never, no), every \
             conditional (if, unless, until), every name, and every number \
             exactly as they appear. Do not drop any detail."
        }
    }
}

/// Build the prompt payload for one generation call.
pub fn build_prompt(
    text: &str,
    era: Era,
    level: CefrLevel,
    strategy: PromptStrategy,
) -> GenerationPrompt {
    let system = format!(
        "You rewrite literary passages for readers at CEFR level {}. The \
         source text is {} prose. {} Respond with the rewritten passage only.",
        level.label(),
        era.label(),
        strategy_instructions(strategy),
    );
    GenerationPrompt {
        system,
        user: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_follows_routing_table() {
        let config = PipelineConfig::default();
        let route = config.routing_for(Era::Victorian, CefrLevel::B2).unwrap();
        let params = params_for(&config, Era::Victorian, CefrLevel::B2, 1).unwrap();
        assert_eq!(params.temperature, route.temperature);
        assert_eq!(params.strategy, route.strategy);
        assert_eq!(params.attempt, 1);
    }

    #[test]
    fn retries_ratchet_temperature_down() {
        let config = PipelineConfig::default();
        let first = params_for(&config, Era::EarlyModern, CefrLevel::A1, 1).unwrap();
        let second = params_for(&config, Era::EarlyModern, CefrLevel::A1, 2).unwrap();
        let third = params_for(&config, Era::EarlyModern, CefrLevel::A1, 3).unwrap();

        assert!(second.temperature < first.temperature);
        assert!(third.temperature < second.temperature);
        assert_eq!(second.strategy, PromptStrategy::ConstrainedRetry);
        assert_eq!(third.strategy, PromptStrategy::ConstrainedRetry);
    }

    #[test]
    fn ratchet_never_goes_below_floor() {
        let mut config = PipelineConfig::default();
        config.generation.retry_temperature_step = 0.5;
        let params = params_for(&config, Era::Modern, CefrLevel::C2, 3).unwrap();
        assert!(params.temperature >= TEMPERATURE_FLOOR);
    }

    #[test]
    fn missing_route_is_an_error() {
        let mut config = PipelineConfig::default();
        config.generation.routing.clear();
        assert!(params_for(&config, Era::Modern, CefrLevel::A1, 1).is_err());
    }

    #[test]
    fn constrained_prompt_names_the_preserved_categories() {
        let prompt = build_prompt(
            "If the tide does not turn, we sail at dawn.",
            Era::Victorian,
            CefrLevel::A2,
            PromptStrategy::ConstrainedRetry,
        );
        assert!(prompt.system.contains("negation"));
        assert!(prompt.system.contains("conditional"));
        assert!(prompt.system.contains("number"));
        assert!(prompt.system.contains("A2"));
        assert_eq!(prompt.user, "If the tide does not turn, we sail at dawn.");
    }
}
