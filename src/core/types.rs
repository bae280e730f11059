// src/core/types.rs — Conversion lifecycle types

use std::path::PathBuf;

use crate::session::Session;

/// Where a conversion is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPhase {
    Created,
    Analyzing,
    ConfiguringSettings,
    Processing,
    Assembling,
    Completed,
    Failed,
}

impl std::fmt::Display for ConversionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConversionPhase::Created => "created",
            ConversionPhase::Analyzing => "analyzing",
            ConversionPhase::ConfiguringSettings => "configuring",
            ConversionPhase::Processing => "processing",
            ConversionPhase::Assembling => "assembling",
            ConversionPhase::Completed => "completed",
            ConversionPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Progress notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionEvent {
    PhaseChanged(ConversionPhase),
    ChunkCompleted {
        session_id: String,
        current: usize,
        total: usize,
        file_path: PathBuf,
    },
    ChunkFailed {
        session_id: String,
        chunk: usize,
        error: String,
        /// Whether `voxbook resume` can pick the session up once the cause is fixed.
        resumable: bool,
    },
    Assembled {
        session_id: String,
        path: PathBuf,
        chunks: usize,
    },
    Completed {
        session_id: String,
        final_output: Option<PathBuf>,
        output_dir: Option<PathBuf>,
    },
}

/// Result of a successful `process`, `resume` or `assemble`.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub session: Session,
    /// Chunks synthesized by this call (0 for an already finished session).
    pub synthesized: usize,
    pub final_output: Option<PathBuf>,
}
