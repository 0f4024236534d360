//! Thin wrapper over the generative provider: prompt assembly plus a hard
//! per-call deadline. A deadline overrun is a transient provider failure,
//! indistinguishable from any other timeout to the controller.

use crate::routing;
use gradelit_core::{
    CefrLevel, Era, GeneratedText, GenerationParams, GenerativeProvider, ProviderError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SimplificationEngine {
    generator: Arc<dyn GenerativeProvider>,
}

impl SimplificationEngine {
    pub fn new(generator: Arc<dyn GenerativeProvider>) -> Self {
        Self { generator }
    }

    /// One generation call for one quality attempt.
    pub async fn generate(
        &self,
        text: &str,
        era: Era,
        level: CefrLevel,
        params: GenerationParams,
        deadline: Duration,
    ) -> Result<GeneratedText, ProviderError> {
        let prompt = routing::build_prompt(text, era, level, params.strategy);
        debug!(
            provider = self.generator.name(),
            temperature = params.temperature,
            strategy = ?params.strategy,
            attempt = params.attempt,
            "Requesting rewrite"
        );

        match tokio::time::timeout(deadline, self.generator.generate(prompt, params)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "generation exceeded {}s deadline",
                deadline.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gradelit_core::{GenerationPrompt, PromptStrategy};
    use std::sync::Mutex;

    struct SlowGenerator {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl GenerativeProvider for SlowGenerator {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(
            &self,
            _prompt: GenerationPrompt,
            params: GenerationParams,
        ) -> Result<GeneratedText, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(GeneratedText {
                text: "too late".into(),
                model: "m".into(),
                params,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_overrun_is_a_timeout() {
        let engine = SimplificationEngine::new(Arc::new(SlowGenerator {
            calls: Mutex::new(0),
        }));
        let params = GenerationParams {
            temperature: 0.5,
            strategy: PromptStrategy::Balanced,
            attempt: 1,
        };

        let result = engine
            .generate(
                "some text",
                Era::Modern,
                CefrLevel::B1,
                params,
                Duration::from_secs(30),
            )
            .await;

        match result {
            Err(e) => assert!(e.is_transient()),
            Ok(_) => panic!("expected timeout"),
        }
    }
}
