// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::infra::paths;
use crate::session::types::OutputLayout;
use crate::speech::{ProviderKind, QualityTier};
use crate::text::segmenter::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub piper: PiperConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Defaults offered when configuring a new conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub chunk_size: usize,
    pub provider: ProviderKind,
    pub voice: Option<String>,
    pub speed: f32,
    pub tier: QualityTier,
    pub layout: OutputLayout,
    /// Root under which per-session output directories are created.
    pub output_dir: Option<PathBuf>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            provider: ProviderKind::OpenAi,
            voice: None,
            speed: 1.0,
            tier: QualityTier::Standard,
            layout: OutputLayout::Single,
            output_dir: None,
        }
    }
}

impl ConversionConfig {
    pub fn output_root(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(paths::default_output_root)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiperConfig {
    pub binary: String,
    pub models_dir: Option<PathBuf>,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            binary: "piper".into(),
            models_dir: None,
        }
    }
}

impl PiperConfig {
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(paths::piper_models_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub ffmpeg: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub concurrency: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_file_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_file_mb: 50 }
    }
}

impl LimitsConfig {
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb * 1024 * 1024
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
