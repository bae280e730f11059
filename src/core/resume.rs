// src/core/resume.rs — Resume safety checks
//
// A session only ever resumes against the file it was created for. A moved
// file must match the original name and size, and re-segmenting it must give
// the same number of chunks that were persisted.

use std::path::Path;

use crate::infra::errors::VoxbookError;
use crate::session::{Session, SourceIdentity};
use crate::text::segmenter::Chunk;

/// State of a session's source file on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCheck {
    /// Same path, same modification time.
    Unchanged(SourceIdentity),
    /// The path exists but the file was modified after the session started.
    Changed(SourceIdentity),
    Missing,
}

pub async fn check_source(session: &Session) -> Result<SourceCheck, VoxbookError> {
    match SourceIdentity::inspect(&session.source_path).await {
        Ok(ident) if ident.session_id() == session.id => Ok(SourceCheck::Unchanged(ident)),
        Ok(ident) => Ok(SourceCheck::Changed(ident)),
        Err(VoxbookError::SourceMissing(_)) => Ok(SourceCheck::Missing),
        Err(e) => Err(e),
    }
}

/// Accept `candidate` as the session's source only if name and size match.
pub async fn validate_relocation(
    session: &Session,
    candidate: &Path,
) -> Result<SourceIdentity, VoxbookError> {
    let ident = SourceIdentity::inspect(candidate).await?;
    if ident.name != session.source_name {
        return Err(VoxbookError::RelocationMismatch(format!(
            "expected a file named '{}', got '{}'",
            session.source_name, ident.name
        )));
    }
    if ident.size != session.source_size {
        return Err(VoxbookError::RelocationMismatch(format!(
            "'{}' is {} bytes, the original was {}",
            ident.name, ident.size, session.source_size
        )));
    }
    Ok(ident)
}

/// The chunks still to synthesize: every chunk after `completed_chunks`.
pub fn plan_remaining(session: &Session, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, VoxbookError> {
    let expected = session.progress.total_chunks;
    if chunks.len() != expected {
        return Err(VoxbookError::ChunkCountMismatch {
            id: session.id.clone(),
            expected,
            found: chunks.len(),
        });
    }
    let done = session.progress.completed_chunks;
    Ok(chunks.into_iter().filter(|c| c.index > done).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{ConversionOptions, OutputLayout, Progress, SessionStatus};
    use crate::speech::{ProviderKind, QualityTier};
    use chrono::Utc;
    use tempfile::TempDir;

    fn session_for(ident: &SourceIdentity, total: usize, done: usize) -> Session {
        Session {
            id: ident.session_id(),
            source_path: ident.path.clone(),
            source_name: ident.name.clone(),
            source_size: ident.size,
            source_modified_at: ident.modified_at(),
            options: ConversionOptions {
                provider: ProviderKind::Piper,
                voice: "en_US-lessac-medium".into(),
                speed: 1.0,
                tier: QualityTier::Standard,
                layout: OutputLayout::Single,
                output_dir: "/tmp/out".into(),
                chunk_size: 4000,
            },
            status: SessionStatus::Failed,
            progress: Progress {
                total_chunks: total,
                completed_chunks: done,
                current_chunk: done,
                ..Default::default()
            },
            output_dir: None,
            final_output_path: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (1..=n)
            .map(|index| Chunk {
                index,
                text: format!("Chunk {index}."),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_plan_remaining_slices_after_completed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, "text").unwrap();
        let ident = SourceIdentity::inspect(&path).await.unwrap();

        let s = session_for(&ident, 3, 2);
        let rest = plan_remaining(&s, chunks(3)).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].index, 3);

        let err = plan_remaining(&s, chunks(4)).unwrap_err();
        assert!(matches!(
            err,
            VoxbookError::ChunkCountMismatch { expected: 3, found: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_check_source_states() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, "text").unwrap();
        let ident = SourceIdentity::inspect(&path).await.unwrap();
        let s = session_for(&ident, 1, 0);

        assert!(matches!(
            check_source(&s).await.unwrap(),
            SourceCheck::Unchanged(_)
        ));

        let f = std::fs::File::options().write(true).open(&path).unwrap();
        f.set_modified(ident.modified + std::time::Duration::from_secs(5))
            .unwrap();
        assert!(matches!(check_source(&s).await.unwrap(), SourceCheck::Changed(_)));

        std::fs::remove_file(&path).unwrap();
        assert_eq!(check_source(&s).await.unwrap(), SourceCheck::Missing);
    }

    #[tokio::test]
    async fn test_relocation_requires_name_and_size() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("book.txt");
        std::fs::write(&original, "same bytes").unwrap();
        let s = session_for(&SourceIdentity::inspect(&original).await.unwrap(), 1, 0);

        let moved_dir = dir.path().join("moved");
        std::fs::create_dir(&moved_dir).unwrap();
        let moved = moved_dir.join("book.txt");
        std::fs::write(&moved, "same bytes").unwrap();
        assert!(validate_relocation(&s, &moved).await.is_ok());

        let renamed = moved_dir.join("other.txt");
        std::fs::write(&renamed, "same bytes").unwrap();
        assert!(matches!(
            validate_relocation(&s, &renamed).await,
            Err(VoxbookError::RelocationMismatch(_))
        ));

        std::fs::write(&moved, "different length").unwrap();
        assert!(matches!(
            validate_relocation(&s, &moved).await,
            Err(VoxbookError::RelocationMismatch(_))
        ));
    }
}
