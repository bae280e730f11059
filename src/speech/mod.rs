// src/speech/mod.rs — Speech backend layer

pub mod openai;
pub mod piper;
pub mod preview;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::audio::assembler::AudioAssembler;
use crate::infra::config::Config;
use crate::infra::credentials;
use crate::infra::errors::VoxbookError;
use crate::session::types::ConversionOptions;
use crate::text::segmenter::Chunk;

/// The closed set of speech providers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    #[value(name = "openai")]
    OpenAi,
    #[serde(rename = "piper")]
    #[value(name = "piper")]
    Piper,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Piper];

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Piper => "piper",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI TTS (hosted, paid)",
            ProviderKind::Piper => "Piper (local, free)",
        }
    }

    pub fn requires_credential(self) -> bool {
        matches!(self, ProviderKind::OpenAi)
    }

    pub fn audio_extension(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "mp3",
            ProviderKind::Piper => "wav",
        }
    }

    /// USD per million input characters.
    pub fn price_per_million_chars(self, tier: QualityTier) -> f64 {
        match (self, tier) {
            (ProviderKind::OpenAi, QualityTier::Standard) => 15.0,
            (ProviderKind::OpenAi, QualityTier::High) => 30.0,
            (ProviderKind::Piper, _) => 0.0,
        }
    }

    pub fn estimate_cost(self, tier: QualityTier, characters: usize) -> f64 {
        self.price_per_million_chars(tier) * characters as f64 / 1_000_000.0
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    #[default]
    Standard,
    High,
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTier::Standard => write!(f, "standard"),
            QualityTier::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub label: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    pub voice: String,
    pub speed: f32,
    pub tier: QualityTier,
}

impl From<&ConversionOptions> for SynthesisOptions {
    fn from(o: &ConversionOptions) -> Self {
        Self {
            voice: o.voice.clone(),
            speed: o.speed,
            tier: o.tier,
        }
    }
}

/// Emitted after each chunk's audio is on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkProgress {
    pub current: usize,
    pub total: usize,
    pub file_path: PathBuf,
}

/// The first unrecoverable error of a chunk run, with the chunk it hit.
#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub error: VoxbookError,
}

pub type ChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<ChunkProgress, ChunkFailure>> + Send + 'a>>;

/// Contract every speech provider implements.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn audio_extension(&self) -> &'static str {
        self.kind().audio_extension()
    }

    fn assembler(&self) -> &AudioAssembler;

    /// Longest text one `synthesize` call accepts, if the backend has a cap.
    fn max_input_chars(&self) -> Option<usize> {
        None
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, VoxbookError>;

    /// Reject bad voice/speed/tier combinations. No network or process calls.
    async fn validate(&self, options: &SynthesisOptions) -> Result<(), VoxbookError>;

    /// Synthesize one piece of text into encoded audio bytes.
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<Vec<u8>, VoxbookError>;

    /// Local backends: runtime present. Hosted backends: credential present
    /// and well-formed.
    async fn is_available(&self) -> bool;

    async fn concatenate(
        &self,
        ordered_files: &[PathBuf],
        output: &Path,
    ) -> Result<PathBuf, VoxbookError> {
        self.assembler().concatenate(ordered_files, output).await
    }

    /// Cached or freshly generated short sample of `voice`.
    async fn preview_voice(&self, voice: &Voice, cache_dir: &Path) -> Result<PathBuf, VoxbookError> {
        let path = cache_dir.join(format!(
            "{}.{}",
            preview::cache_key(self.kind(), &voice.id, voice.language.as_deref()),
            self.audio_extension()
        ));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("Preview cache hit for {}/{}", self.kind(), voice.id);
            return Ok(path);
        }

        let options = SynthesisOptions {
            voice: voice.id.clone(),
            speed: 1.0,
            tier: QualityTier::Standard,
        };
        let phrase = preview::preview_phrase(voice.language.as_deref());
        let audio = self.synthesize(phrase, &options).await?;
        tokio::fs::create_dir_all(cache_dir).await?;
        write_file_atomic(&path, &audio).await?;
        Ok(path)
    }

    /// Synthesize `chunks` one after another into `out_dir`.
    ///
    /// The stream is lazy: a chunk is only synthesized when the consumer polls
    /// for it, so progress can be persisted between chunks. It ends after the
    /// first failure.
    fn process_chunks<'a>(
        &'a self,
        chunks: &'a [Chunk],
        total: usize,
        options: &'a SynthesisOptions,
        out_dir: &'a Path,
    ) -> ChunkStream<'a> {
        Box::pin(async_stream::try_stream! {
            for chunk in chunks {
                let file_path = out_dir.join(chunk.file_name(self.audio_extension()));
                tracing::debug!("Synthesizing chunk {}/{} ({} chars)", chunk.index, total, chunk.text.len());

                let audio = self
                    .synthesize(&chunk.text, options)
                    .await
                    .map_err(|error| ChunkFailure { chunk: chunk.index, error })?;
                write_file_atomic(&file_path, &audio)
                    .await
                    .map_err(|e| ChunkFailure { chunk: chunk.index, error: e.into() })?;

                yield ChunkProgress {
                    current: chunk.index,
                    total,
                    file_path,
                };
            }
        })
    }
}

/// Write to `<path>.part` then rename, so a killed process never leaves a
/// truncated file under the final name.
pub async fn write_file_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    let mut f = tokio::fs::File::create(&tmp).await?;
    f.write_all(data).await?;
    f.flush().await?;
    f.sync_all().await?;
    drop(f);
    tokio::fs::rename(&tmp, path).await
}

/// Construct the backend for `kind`. Hosted providers need `credential`.
pub fn build_backend(
    kind: ProviderKind,
    config: &Config,
    credential: Option<String>,
) -> Result<Arc<dyn SpeechBackend>, VoxbookError> {
    let assembler = AudioAssembler::new(&config.audio.ffmpeg);
    match kind {
        ProviderKind::OpenAi => {
            let key = credential.ok_or_else(|| VoxbookError::MissingCredential(kind.id().into()))?;
            Ok(Arc::new(openai::OpenAiBackend::new(
                key,
                &config.openai,
                assembler,
            )))
        }
        ProviderKind::Piper => Ok(Arc::new(piper::PiperBackend::new(&config.piper, assembler))),
    }
}

/// Voices offered by `kind`, without needing a credential.
pub async fn list_voices(kind: ProviderKind, config: &Config) -> Result<Vec<Voice>, VoxbookError> {
    match kind {
        ProviderKind::OpenAi => Ok(openai::voices()),
        ProviderKind::Piper => {
            piper::PiperBackend::new(&config.piper, AudioAssembler::new(&config.audio.ffmpeg))
                .list_voices()
                .await
        }
    }
}

/// Resolve credentials as needed and build the backend.
pub async fn resolve_backend(
    kind: ProviderKind,
    config: &Config,
) -> Result<Arc<dyn SpeechBackend>, VoxbookError> {
    let credential = if kind.requires_credential() {
        Some(credentials::ensure_credential(kind.id()).await?)
    } else {
        None
    };
    build_backend(kind, config, credential)
}
