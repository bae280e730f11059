// src/speech/openai.rs — OpenAI text-to-speech backend

use async_trait::async_trait;
use std::time::Duration;

use super::{ProviderKind, QualityTier, SpeechBackend, SynthesisOptions, Voice};
use crate::audio::assembler::AudioAssembler;
use crate::infra::config::OpenAiConfig;
use crate::infra::credentials;
use crate::infra::errors::VoxbookError;

/// Hard cap on `input` length enforced by the API.
pub const MAX_INPUT_CHARS: usize = 4096;
pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;

const VOICES: &[(&str, &str)] = &[
    ("alloy", "Alloy (neutral, balanced)"),
    ("ash", "Ash (clear, direct)"),
    ("coral", "Coral (warm, friendly)"),
    ("echo", "Echo (calm, male)"),
    ("fable", "Fable (expressive, British)"),
    ("nova", "Nova (bright, female)"),
    ("onyx", "Onyx (deep, male)"),
    ("sage", "Sage (soft, measured)"),
    ("shimmer", "Shimmer (light, female)"),
];

/// The fixed voice catalogue; no request needed.
pub fn voices() -> Vec<Voice> {
    VOICES
        .iter()
        .map(|(id, label)| Voice {
            id: (*id).into(),
            label: (*label).into(),
            language: None,
        })
        .collect()
}

pub struct OpenAiBackend {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    assembler: AudioAssembler,
}

impl OpenAiBackend {
    pub fn new(api_key: String, config: &OpenAiConfig, assembler: AudioAssembler) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            assembler,
        }
    }

    pub fn model_for(tier: QualityTier) -> &'static str {
        match tier {
            QualityTier::Standard => "tts-1",
            QualityTier::High => "tts-1-hd",
        }
    }

    fn error(&self, message: impl Into<String>) -> VoxbookError {
        VoxbookError::Backend {
            provider: "openai".into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl SpeechBackend for OpenAiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn assembler(&self) -> &AudioAssembler {
        &self.assembler
    }

    fn max_input_chars(&self) -> Option<usize> {
        Some(MAX_INPUT_CHARS)
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, VoxbookError> {
        Ok(voices())
    }

    async fn validate(&self, options: &SynthesisOptions) -> Result<(), VoxbookError> {
        if !VOICES.iter().any(|(id, _)| *id == options.voice) {
            return Err(VoxbookError::UnknownVoice {
                provider: "openai".into(),
                voice: options.voice.clone(),
            });
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&options.speed) {
            return Err(VoxbookError::Speed {
                provider: "openai".into(),
                speed: options.speed,
                min: MIN_SPEED,
                max: MAX_SPEED,
            });
        }
        Ok(())
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<Vec<u8>, VoxbookError> {
        self.validate(options).await?;
        let chars = text.chars().count();
        if chars == 0 {
            return Err(VoxbookError::Validation("nothing to synthesize".into()));
        }
        if chars > MAX_INPUT_CHARS {
            return Err(VoxbookError::Validation(format!(
                "{chars} characters exceeds the OpenAI limit of {MAX_INPUT_CHARS}"
            )));
        }

        let body = serde_json::json!({
            "model": Self::model_for(options.tier),
            "input": text,
            "voice": options.voice,
            "speed": options.speed,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VoxbookError::Timeout {
                        provider: "openai".into(),
                    }
                } else {
                    self.error(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(VoxbookError::RateLimited {
                provider: "openai".into(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = response.text().await.unwrap_or_default();
            return Err(VoxbookError::Auth {
                provider: "openai".into(),
                message: format!("HTTP {status}: {}", error_message(&body)),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            if status == reqwest::StatusCode::PAYLOAD_TOO_LARGE
                || (status == reqwest::StatusCode::BAD_REQUEST && message.contains("maximum"))
            {
                return Err(VoxbookError::SizeLimit {
                    provider: "openai".into(),
                    message,
                });
            }
            return Err(self.error(format!("HTTP {status}: {message}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.error(format!("Failed to read audio: {e}")))?;
        if bytes.is_empty() {
            return Err(self.error("empty audio response"));
        }
        Ok(bytes.to_vec())
    }

    async fn is_available(&self) -> bool {
        credentials::is_well_formed("openai", &self.api_key)
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| crate::util::truncate_str(body.trim(), 300).to_string())
}
