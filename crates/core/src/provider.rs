//! Provider traits — the abstraction over external generative, embedding,
//! and speech-synthesis services.
//!
//! Every backend is consumed as a black box behind one of these traits.
//! Implementations live in `gradelit-providers`; tests use mocks.

use crate::error::ProviderError;
use crate::simplify::GenerationParams;
use crate::timing::WordTiming;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The prompt payload sent to the generative-text service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPrompt {
    /// System framing (level target, strategy, constraints).
    pub system: String,

    /// The source text to rewrite.
    pub user: String,
}

/// A candidate rewrite returned by the generative service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,

    /// Which model actually responded (may differ from requested).
    pub model: String,

    /// Echo of the parameters the engine used for this call.
    pub params: GenerationParams,
}

/// The core generative-text trait.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// A human-readable name for this provider (e.g. "openai", "local").
    fn name(&self) -> &str;

    /// Rewrite text according to the prompt and parameters.
    async fn generate(
        &self,
        prompt: GenerationPrompt,
        params: GenerationParams,
    ) -> std::result::Result<GeneratedText, ProviderError>;
}

/// Embedding/similarity service trait.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Semantic similarity of two texts in `[0.0, 1.0]`.
    async fn similarity(
        &self,
        text_a: &str,
        text_b: &str,
    ) -> std::result::Result<f32, ProviderError>;
}

/// Voice selection handed to speech synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice_id: String,

    /// Playback speed multiplier, 1.0 = natural.
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice_id: "narrator-en-1".into(),
            speed: 1.0,
        }
    }
}

/// Synthesized audio plus its word-level timing track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechOutput {
    /// Encoded audio bytes (format is provider-specific; opaque here).
    pub audio: Vec<u8>,

    /// Word timings, monotonically non-decreasing and non-overlapping.
    pub timings: Vec<WordTiming>,

    /// Total audio duration.
    pub duration_ms: u64,

    /// Which provider produced this audio.
    pub provider: String,
}

/// Speech-synthesis service trait. At least two interchangeable providers
/// are expected in production so narration can fail over mid-chunk.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
    ) -> std::result::Result<SpeechOutput, ProviderError>;
}
