// src/session/types.rs — Durable conversion session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::speech::{ProviderKind, QualityTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Created => "created",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// How chunk audio is delivered once every chunk is synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// One combined file; chunk files are removed after assembly.
    Single,
    /// Chunk files only, no assembly.
    Separate,
    /// Combined file and chunk files.
    Both,
}

impl OutputLayout {
    pub fn needs_assembly(self) -> bool {
        !matches!(self, OutputLayout::Separate)
    }

    pub fn keeps_chunks(self) -> bool {
        !matches!(self, OutputLayout::Single)
    }
}

impl std::fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputLayout::Single => "single",
            OutputLayout::Separate => "separate",
            OutputLayout::Both => "both",
        };
        write!(f, "{s}")
    }
}

/// Settings chosen for a session. Never changed after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub provider: ProviderKind,
    pub voice: String,
    pub speed: f32,
    pub tier: QualityTier,
    pub layout: OutputLayout,
    /// Root directory; the session writes into its own child directory.
    pub output_dir: PathBuf,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub chunk_number: usize,
    pub file_path: PathBuf,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkError {
    pub chunk_number: usize,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub current_chunk: usize,
    pub percentage: u8,
    #[serde(default)]
    pub processed_files: Vec<ProcessedFile>,
    #[serde(default)]
    pub errors: Vec<ChunkError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub source_path: PathBuf,
    pub source_name: String,
    pub source_size: u64,
    pub source_modified_at: DateTime<Utc>,
    pub options: ConversionOptions,
    pub status: SessionStatus,
    pub progress: Progress,
    pub output_dir: Option<PathBuf>,
    pub final_output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update merged by `SessionStore::update`.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub total_chunks: Option<usize>,
    /// Last completed chunk; also sets `completed_chunks` and `percentage`.
    pub current_chunk: Option<usize>,
    pub processed_file: Option<ProcessedFile>,
    pub error: Option<ChunkError>,
    pub status: Option<SessionStatus>,
    pub output_dir: Option<PathBuf>,
    pub final_output_path: Option<PathBuf>,
}

impl SessionUpdate {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn chunk_completed(chunk_number: usize, file_path: PathBuf) -> Self {
        Self {
            current_chunk: Some(chunk_number),
            processed_file: Some(ProcessedFile {
                chunk_number,
                file_path,
                completed_at: Utc::now(),
            }),
            ..Default::default()
        }
    }

    pub fn chunk_failed(chunk_number: usize, error: impl Into<String>) -> Self {
        Self {
            error: Some(ChunkError {
                chunk_number,
                error: error.into(),
                timestamp: Utc::now(),
            }),
            status: Some(SessionStatus::Failed),
            ..Default::default()
        }
    }
}

impl Session {
    /// Merge `update` into this session, enforcing the progress invariants.
    /// On error the session is left unchanged.
    pub fn apply(&mut self, update: SessionUpdate) -> Result<(), String> {
        let mut next = self.progress.clone();

        if let Some(total) = update.total_chunks {
            if total < next.completed_chunks {
                return Err(format!(
                    "total_chunks {total} below completed_chunks {}",
                    next.completed_chunks
                ));
            }
            next.total_chunks = total;
        }

        if let Some(file) = update.processed_file {
            let expected = next.processed_files.len() + 1;
            if file.chunk_number != expected {
                return Err(format!(
                    "processed chunk {} out of order (expected {expected})",
                    file.chunk_number
                ));
            }
            next.processed_files.push(file);
        }

        if let Some(current) = update.current_chunk {
            if current < next.completed_chunks {
                return Err(format!(
                    "completed_chunks cannot decrease ({} -> {current})",
                    next.completed_chunks
                ));
            }
            if current > next.total_chunks {
                return Err(format!(
                    "completed_chunks {current} exceeds total_chunks {}",
                    next.total_chunks
                ));
            }
            next.current_chunk = current;
            next.completed_chunks = current;
            next.percentage = percentage(current, next.total_chunks);
        }

        if next.processed_files.len() != next.completed_chunks {
            return Err(format!(
                "{} processed file(s) recorded for {} completed chunk(s)",
                next.processed_files.len(),
                next.completed_chunks
            ));
        }

        if let Some(error) = update.error {
            next.errors.push(error);
        }

        let final_output = update
            .final_output_path
            .or_else(|| self.final_output_path.clone());
        let status = update.status.unwrap_or(self.status);
        if status == SessionStatus::Completed {
            if next.completed_chunks != next.total_chunks {
                return Err(format!(
                    "cannot complete with {}/{} chunks",
                    next.completed_chunks, next.total_chunks
                ));
            }
            if self.options.layout.needs_assembly() && final_output.is_none() {
                return Err("cannot complete without a final output file".into());
            }
        }

        self.progress = next;
        self.status = status;
        self.final_output_path = final_output;
        if let Some(dir) = update.output_dir {
            self.output_dir = Some(dir);
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn remaining_chunks(&self) -> usize {
        self.progress
            .total_chunks
            .saturating_sub(self.progress.completed_chunks)
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Partial work worth offering to resume.
    pub fn has_resumable_progress(&self) -> bool {
        !self.is_complete() && self.progress.completed_chunks > 0
    }

    pub fn last_error(&self) -> Option<&ChunkError> {
        self.progress.errors.last()
    }

    /// Chunk files in chunk order, regardless of how they were recorded.
    pub fn ordered_chunk_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<&ProcessedFile> = self.progress.processed_files.iter().collect();
        files.sort_by_key(|f| f.chunk_number);
        files.into_iter().map(|f| f.file_path.clone()).collect()
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// Per-session output directory under `root`: `<slug(stem)>-<short id>`.
pub fn session_output_dir(root: &Path, source_name: &str, id: &str) -> PathBuf {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let mut name = slug::slugify(stem);
    if name.is_empty() {
        name = "document".into();
    }
    root.join(format!("{name}-{}", short_id(id)))
}

/// Combined artifact name: `<slug(stem)>_audiobook.<ext>`.
pub fn final_output_name(source_name: &str, extension: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let mut name = slug::slugify(stem);
    if name.is_empty() {
        name = "document".into();
    }
    format!("{name}_audiobook.{extension}")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub total_processed_chunks: usize,
}
