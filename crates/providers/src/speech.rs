//! HTTP speech-synthesis provider.
//!
//! Speaks to a synthesis endpoint that returns base64 audio plus a
//! word-timing track. The timing track is validated on receipt: a provider
//! emitting overlapping or regressing timings would corrupt highlight
//! ordering downstream, so it is rejected here as a malformed response.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use gradelit_core::timing::timings_are_monotonic;
use gradelit_core::{ProviderError, SpeechOutput, SpeechProvider, VoiceParams, WordTiming};
use serde::Deserialize;
use tracing::{debug, warn};

/// A speech-synthesis backend reachable over HTTP.
pub struct HttpSpeechProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpSpeechProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct SynthesisResponse {
    /// Base64-encoded audio payload.
    audio: String,
    timings: Vec<ApiTiming>,
    duration_ms: u64,
}

#[derive(Deserialize)]
struct ApiTiming {
    word: String,
    start_ms: u64,
    end_ms: u64,
}

#[async_trait]
impl SpeechProvider for HttpSpeechProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
    ) -> Result<SpeechOutput, ProviderError> {
        let url = format!("{}/synthesize", self.base_url);

        let body = serde_json::json!({
            "text": text,
            "voice_id": voice.voice_id,
            "speed": voice.speed,
        });

        debug!(provider = %self.name, voice = %voice.voice_id, chars = text.len(), "Requesting synthesis");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, "Synthesis failed");
            return Err(ProviderError::ApiError {
                status_code: status,
                message,
            });
        }

        let parsed: SynthesisResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("synthesis: {e}")))?;

        let audio = BASE64
            .decode(&parsed.audio)
            .map_err(|e| ProviderError::MalformedResponse(format!("audio payload: {e}")))?;

        let timings: Vec<WordTiming> = parsed
            .timings
            .into_iter()
            .map(|t| WordTiming::new(t.word, t.start_ms, t.end_ms))
            .collect();

        if !timings_are_monotonic(&timings) {
            return Err(ProviderError::MalformedResponse(
                "Word timings are not monotonic".into(),
            ));
        }

        Ok(SpeechOutput {
            audio,
            timings,
            duration_ms: parsed.duration_ms,
            provider: self.name.clone(),
        })
    }
}
