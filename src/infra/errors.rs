// src/infra/errors.rs — Error types for voxbook

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxbookError {
    // Validation errors (rejected before any I/O, never retried)
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Chunk size {size} out of range ({min}..={max})")]
    ChunkSize { size: usize, min: usize, max: usize },

    #[error("Voice '{voice}' is not offered by '{provider}'")]
    UnknownVoice { provider: String, voice: String },

    #[error("Speed {speed} out of range for '{provider}' ({min}..={max})")]
    Speed {
        provider: String,
        speed: f32,
        min: f32,
        max: f32,
    },

    #[error("Quality tier '{tier}' is not supported by '{provider}'")]
    Tier { provider: String, tier: String },

    // Resource errors
    #[error("Source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Output directory not found: {}", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("ffmpeg not found in PATH. Install ffmpeg to combine audio chunks.")]
    MuxerUnavailable,

    #[error("No credential for '{0}'. Set OPENAI_API_KEY or run `voxbook doctor`.")]
    MissingCredential(String),

    #[error("Backend '{provider}' is not available: {reason}")]
    BackendUnavailable { provider: String, reason: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("No readable text in {}", .0.display())]
    EmptyDocument(PathBuf),

    // Backend errors (recorded into the session, resumable)
    #[error("Backend '{provider}' error: {message}")]
    Backend { provider: String, message: String },

    #[error("Authentication with '{provider}' failed: {message}")]
    Auth { provider: String, message: String },

    #[error("Rate limited by '{provider}'")]
    RateLimited { provider: String },

    #[error("Request to '{provider}' timed out")]
    Timeout { provider: String },

    #[error("Input rejected by '{provider}' as too large: {message}")]
    SizeLimit { provider: String, message: String },

    // Assembly errors
    #[error("Audio assembly failed: {0}")]
    Assembly(String),

    // Session errors
    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("Progress invariant violated for session '{id}': {message}")]
    ProgressInvariant { id: String, message: String },

    #[error(
        "Cannot resume session '{id}': document now splits into {found} chunk(s), \
         session recorded {expected}"
    )]
    ChunkCountMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Replacement file does not match the original: {0}")]
    RelocationMismatch(String),

    #[error("Session '{id}' cannot be {action} while {status}")]
    InvalidState {
        id: String,
        action: String,
        status: String,
    },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session store is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse error taxonomy used for reporting and resume decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Resource,
    Backend,
    Assembly,
    Internal,
}

impl VoxbookError {
    pub fn class(&self) -> ErrorClass {
        use VoxbookError::*;
        match self {
            Validation(_) | ChunkSize { .. } | UnknownVoice { .. } | Speed { .. } | Tier { .. } => {
                ErrorClass::Validation
            }
            SourceMissing(_)
            | OutputDirMissing(_)
            | MuxerUnavailable
            | MissingCredential(_)
            | BackendUnavailable { .. }
            | UnsupportedFile(_)
            | FileTooLarge { .. }
            | EmptyDocument(_)
            | RelocationMismatch(_) => ErrorClass::Resource,
            Backend { .. }
            | Auth { .. }
            | RateLimited { .. }
            | Timeout { .. }
            | SizeLimit { .. } => ErrorClass::Backend,
            Assembly(_) => ErrorClass::Assembly,
            _ => ErrorClass::Internal,
        }
    }

    /// Process exit status: 2 for bad input, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self.class() {
            ErrorClass::Validation => 2,
            _ => 1,
        }
    }

    /// Whether a session that failed with this error can be picked up again
    /// by `voxbook resume` once the cause is fixed.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Backend | ErrorClass::Assembly | ErrorClass::Resource
        ) || matches!(self, VoxbookError::Io(_))
    }
}
