// src/cli/mod.rs — CLI definition (clap derive)

pub mod convert;
pub mod doctor;
pub mod progress;
pub mod resume;
pub mod sessions;
pub mod voices;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::session::OutputLayout;
use crate::speech::{ProviderKind, QualityTier};

#[derive(Parser)]
#[command(name = "voxbook", about = "Resumable long-form text-to-speech", version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log progress details (same as RUST_LOG=info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a document to audio (offers to resume earlier progress)
    Convert(ConvertArgs),
    /// Continue an interrupted or failed conversion
    Resume {
        /// Session id (a unique prefix is enough)
        id: String,
        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },
    /// Retry combining the chunk files of a fully synthesized session
    Assemble {
        /// Session id (a unique prefix is enough)
        id: String,
    },
    /// Show chunk count, word count and estimated cost without converting
    Analyze {
        file: PathBuf,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,
        #[arg(long, value_enum)]
        tier: Option<QualityTier>,
    },
    /// Inspect and manage saved sessions
    Sessions {
        #[command(subcommand)]
        action: Option<SessionsAction>,
    },
    /// List voices, optionally generating previews
    Voices {
        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,
        /// Voice ids to preview (cached after the first run)
        #[arg(long, num_args = 1..)]
        preview: Vec<String>,
    },
    /// Check external tools, credentials and storage
    Doctor,
}

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List sessions, most recent first
    List {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one session in detail
    Show { id: String },
    /// Delete a session and its output directory
    Delete {
        /// Session id; omit with --all to delete everything
        id: Option<String>,
        #[arg(long)]
        all: bool,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Totals across all sessions
    Stats,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Document to convert (.txt, .md, .pdf)
    pub file: PathBuf,

    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Voice id (see `voxbook voices`)
    #[arg(long)]
    pub voice: Option<String>,

    #[arg(long)]
    pub speed: Option<f32>,

    #[arg(long, value_enum)]
    pub tier: Option<QualityTier>,

    #[arg(long, value_enum)]
    pub layout: Option<OutputLayout>,

    /// Root directory for session output
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum characters per chunk (1000-10000)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Accept defaults and cost without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Start over even if earlier progress exists
    #[arg(long)]
    pub fresh: bool,

    /// Suppress progress output
    #[arg(long)]
    pub quiet: bool,
}

/// True when prompts can be shown.
pub fn interactive() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}
