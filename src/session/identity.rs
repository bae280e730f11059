// src/session/identity.rs — Content-derived session identity
//
// A session id is a pure function of the source file's resolved path and its
// modification time: the same untouched file always maps to the same session,
// touching or replacing it starts a new one.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::infra::errors::VoxbookError;

/// Snapshot of a source file taken when a session is created or looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceIdentity {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl SourceIdentity {
    pub async fn inspect(path: &Path) -> Result<Self, VoxbookError> {
        let resolved = match tokio::fs::canonicalize(path).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VoxbookError::SourceMissing(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let meta = tokio::fs::metadata(&resolved).await?;
        if !meta.is_file() {
            return Err(VoxbookError::Validation(format!(
                "{} is not a regular file",
                resolved.display()
            )));
        }

        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: resolved,
            name,
            size: meta.len(),
            modified: meta.modified()?,
        })
    }

    pub fn session_id(&self) -> String {
        session_id(&self.path, self.modified)
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.modified)
    }
}

/// First 16 hex chars of SHA-256 over "<path>\n<mtime millis>".
pub fn session_id(resolved_path: &Path, modified: SystemTime) -> String {
    let millis = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i128,
        Err(e) => -(e.duration().as_millis() as i128),
    };

    let mut hasher = Sha256::new();
    hasher.update(resolved_path.to_string_lossy().as_bytes());
    hasher.update(b"\n");
    hasher.update(millis.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
