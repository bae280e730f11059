// src/core/analysis.rs — Document analysis before any synthesis

use std::path::Path;

use crate::infra::errors::VoxbookError;
use crate::session::{Session, SourceIdentity};
use crate::speech::{ProviderKind, QualityTier};
use crate::text::segmenter::{chunk_document, validate_chunk_size, Chunk};
use crate::text::{extract, DocumentInfo};

/// Everything known about a document before a session exists for it.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub source: SourceIdentity,
    pub document: DocumentInfo,
    pub chunks: Vec<Chunk>,
    pub chunk_size: usize,
    pub provider: ProviderKind,
    pub tier: QualityTier,
    pub estimated_cost: f64,
    /// Session already recorded for this exact file, if any.
    pub existing: Option<Session>,
}

impl Analysis {
    pub fn session_id(&self) -> String {
        self.source.session_id()
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Partial work on this file that can be picked up instead of starting over.
    pub fn resumable(&self) -> Option<&Session> {
        self.existing.as_ref().filter(|s| s.has_resumable_progress())
    }

    pub fn estimate_for(&self, provider: ProviderKind, tier: QualityTier) -> f64 {
        provider.estimate_cost(tier, self.document.character_count)
    }
}

/// Extract, segment and price `path`.
pub async fn analyze(
    path: &Path,
    chunk_size: usize,
    provider: ProviderKind,
    tier: QualityTier,
    max_bytes: u64,
) -> Result<Analysis, VoxbookError> {
    validate_chunk_size(chunk_size)?;
    let source = SourceIdentity::inspect(path).await?;
    let document = extract(&source.path, max_bytes).await?;
    let chunks = chunk_document(&document.text, chunk_size)?;
    let estimated_cost = provider.estimate_cost(tier, document.character_count);

    tracing::info!(
        "Analyzed {}: {} chars, {} chunk(s), est. ${:.2}",
        source.name,
        document.character_count,
        chunks.len(),
        estimated_cost
    );

    Ok(Analysis {
        source,
        document,
        chunks,
        chunk_size,
        provider,
        tier,
        estimated_cost,
        existing: None,
    })
}
