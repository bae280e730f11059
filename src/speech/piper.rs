// src/speech/piper.rs — Local Piper backend (one child process per request)
//
// Voices are the `*.onnx` models found in the models directory. Model files
// are named `<lang>_<REGION>-<name>-<quality>.onnx`, which gives the language.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

use super::{ProviderKind, QualityTier, SpeechBackend, SynthesisOptions, Voice};
use crate::audio::assembler::AudioAssembler;
use crate::infra::config::PiperConfig;
use crate::infra::errors::VoxbookError;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

pub struct PiperBackend {
    binary: String,
    models_dir: PathBuf,
    assembler: AudioAssembler,
}

impl PiperBackend {
    pub fn new(config: &PiperConfig, assembler: AudioAssembler) -> Self {
        Self {
            binary: config.binary.clone(),
            models_dir: config.models_dir(),
            assembler,
        }
    }

    fn model_path(&self, voice: &str) -> PathBuf {
        self.models_dir.join(format!("{voice}.onnx"))
    }

    fn error(message: impl Into<String>) -> VoxbookError {
        VoxbookError::Backend {
            provider: "piper".into(),
            message: message.into(),
        }
    }
}

/// `en_US-lessac-medium` -> `en_US`
pub fn language_of(model_name: &str) -> Option<String> {
    let lang = model_name.split('-').next()?;
    let mut parts = lang.split('_');
    let code = parts.next()?;
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Some(lang.to_string())
    } else {
        None
    }
}

/// `en_US-lessac-medium` -> `Lessac (en_US, medium)`
fn label_of(model_name: &str) -> String {
    let parts: Vec<&str> = model_name.split('-').collect();
    match parts.as_slice() {
        [lang, name, quality] => {
            let mut chars = name.chars();
            let name = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            };
            format!("{name} ({lang}, {quality})")
        }
        _ => model_name.to_string(),
    }
}

async fn scan_models(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl SpeechBackend for PiperBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Piper
    }

    fn assembler(&self) -> &AudioAssembler {
        &self.assembler
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, VoxbookError> {
        let names = match scan_models(&self.models_dir).await {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(names
            .into_iter()
            .map(|name| Voice {
                label: label_of(&name),
                language: language_of(&name),
                id: name,
            })
            .collect())
    }

    async fn validate(&self, options: &SynthesisOptions) -> Result<(), VoxbookError> {
        if options.tier != QualityTier::Standard {
            return Err(VoxbookError::Tier {
                provider: "piper".into(),
                tier: options.tier.to_string(),
            });
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&options.speed) {
            return Err(VoxbookError::Speed {
                provider: "piper".into(),
                speed: options.speed,
                min: MIN_SPEED,
                max: MAX_SPEED,
            });
        }
        if options.voice.contains(['/', '\\'])
            || !tokio::fs::try_exists(self.model_path(&options.voice))
                .await
                .unwrap_or(false)
        {
            return Err(VoxbookError::UnknownVoice {
                provider: "piper".into(),
                voice: options.voice.clone(),
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
        if text.trim().is_empty() {
            return Err(VoxbookError::Validation("nothing to synthesize".into()));
        }

        let out = std::env::temp_dir().join(format!("voxbook-piper-{}.wav", uuid::Uuid::new_v4()));
        let length_scale = 1.0 / options.speed;

        let mut child = tokio::process::Command::new(&self.binary)
            .arg("--model")
            .arg(self.model_path(&options.voice))
            .arg("--output_file")
            .arg(&out)
            .arg("--length_scale")
            .arg(format!("{length_scale:.3}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VoxbookError::BackendUnavailable {
                        provider: "piper".into(),
                        reason: format!("'{}' not found in PATH", self.binary),
                    }
                } else {
                    Self::error(format!("failed to start piper: {e}"))
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| Self::error(format!("failed to feed text: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Self::error(e.to_string()))?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&out).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::error(format!(
                "piper exited with {}: {}",
                output.status,
                crate::util::truncate_str(stderr.trim(), 300)
            )));
        }

        let audio = tokio::fs::read(&out)
            .await
            .map_err(|e| Self::error(format!("no audio produced: {e}")))?;
        let _ = tokio::fs::remove_file(&out).await;
        if audio.is_empty() {
            return Err(Self::error("empty audio produced"));
        }
        Ok(audio)
    }

    async fn is_available(&self) -> bool {
        if which::which(&self.binary).is_err() {
            tracing::debug!("piper binary '{}' not found", self.binary);
            return false;
        }
        matches!(scan_models(&self.models_dir).await, Ok(models) if !models.is_empty())
    }
}
