// src/session/store.rs — Durable session store (single JSON document)
//
// Every mutation is a read-modify-write of the whole document followed by an
// atomic replace (temp file + rename). One process at a time; there is no
// locking, concurrent writers from separate processes are unsupported.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::identity::SourceIdentity;
use super::types::{
    ConversionOptions, Progress, Session, SessionStats, SessionStatus, SessionUpdate,
};
use crate::infra::errors::VoxbookError;
use crate::infra::paths;

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    sessions: BTreeMap<String, Session>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store under the user's data directory.
    pub fn default_location() -> Self {
        Self::open(paths::sessions_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreDocument, VoxbookError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, doc: &mut StoreDocument) -> Result<(), VoxbookError> {
        doc.version = DOCUMENT_VERSION;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = tokio::fs::File::create(&tmp).await?;
        f.write_all(&json).await?;
        f.flush().await?;
        f.sync_all().await?;
        drop(f);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Create (or reset) the session for `source`.
    pub async fn create(
        &self,
        source: &Path,
        options: ConversionOptions,
    ) -> Result<Session, VoxbookError> {
        let ident = SourceIdentity::inspect(source).await?;
        let now = Utc::now();
        let session = Session {
            id: ident.session_id(),
            source_path: ident.path.clone(),
            source_name: ident.name.clone(),
            source_size: ident.size,
            source_modified_at: ident.modified_at(),
            options,
            status: SessionStatus::Created,
            progress: Progress::default(),
            output_dir: None,
            final_output_path: None,
            created_at: now,
            updated_at: now,
        };

        let mut doc = self.load().await?;
        if doc.sessions.contains_key(&session.id) {
            tracing::warn!("Replacing existing session {}", session.id);
        }
        doc.sessions.insert(session.id.clone(), session.clone());
        self.save(&mut doc).await?;

        tracing::info!("Created session {} for {}", session.id, session.source_name);
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Session>, VoxbookError> {
        Ok(self.load().await?.sessions.remove(id))
    }

    /// Like `get`, but a missing session is an error.
    pub async fn require(&self, id: &str) -> Result<Session, VoxbookError> {
        self.get(id)
            .await?
            .ok_or_else(|| VoxbookError::SessionNotFound(id.into()))
    }

    /// Look up the session for `path` as it is on disk right now. A file whose
    /// modification time changed since creation is not found.
    pub async fn find_by_path(&self, path: &Path) -> Result<Option<Session>, VoxbookError> {
        let ident = match SourceIdentity::inspect(path).await {
            Ok(i) => i,
            Err(VoxbookError::SourceMissing(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.get(&ident.session_id()).await
    }

    pub async fn update(&self, id: &str, update: SessionUpdate) -> Result<Session, VoxbookError> {
        let mut doc = self.load().await?;
        let session = doc
            .sessions
            .get_mut(id)
            .ok_or_else(|| VoxbookError::SessionNotFound(id.into()))?;

        session
            .apply(update)
            .map_err(|message| VoxbookError::ProgressInvariant {
                id: id.into(),
                message,
            })?;
        let updated = session.clone();

        self.save(&mut doc).await?;
        Ok(updated)
    }

    /// All sessions; most recently updated first when `sort_by_updated_desc`.
    pub async fn list(
        &self,
        sort_by_updated_desc: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Session>, VoxbookError> {
        let mut sessions: Vec<Session> = self.load().await?.sessions.into_values().collect();
        if sort_by_updated_desc {
            sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
        if let Some(limit) = limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }

    /// Remove a session and its session-scoped output directory.
    pub async fn delete(&self, id: &str) -> Result<Session, VoxbookError> {
        let mut doc = self.load().await?;
        let session = doc
            .sessions
            .remove(id)
            .ok_or_else(|| VoxbookError::SessionNotFound(id.into()))?;
        self.save(&mut doc).await?;
        remove_session_output(&session).await;
        tracing::info!("Deleted session {}", id);
        Ok(session)
    }

    /// Remove every session. Returns how many were deleted.
    pub async fn delete_all(&self) -> Result<usize, VoxbookError> {
        let mut doc = self.load().await?;
        let removed: Vec<Session> = std::mem::take(&mut doc.sessions).into_values().collect();
        self.save(&mut doc).await?;
        for session in &removed {
            remove_session_output(session).await;
        }
        tracing::info!("Deleted {} session(s)", removed.len());
        Ok(removed.len())
    }

    /// Move a session to the identity of a relocated source file, keeping its
    /// options, progress and output directory.
    pub async fn rekey(&self, id: &str, new_source: &Path) -> Result<Session, VoxbookError> {
        let ident = SourceIdentity::inspect(new_source).await?;
        let mut doc = self.load().await?;
        let mut session = doc
            .sessions
            .remove(id)
            .ok_or_else(|| VoxbookError::SessionNotFound(id.into()))?;

        let new_id = ident.session_id();
        if new_id != id && doc.sessions.contains_key(&new_id) {
            return Err(VoxbookError::Validation(format!(
                "{} already has its own session ({new_id})",
                ident.path.display()
            )));
        }

        session.id = new_id;
        session.source_path = ident.path.clone();
        session.source_name = ident.name.clone();
        session.source_size = ident.size;
        session.source_modified_at = ident.modified_at();
        session.updated_at = Utc::now();

        doc.sessions.insert(session.id.clone(), session.clone());
        self.save(&mut doc).await?;
        tracing::info!("Session {} relocated to {} ({})", id, ident.path.display(), session.id);
        Ok(session)
    }

    pub async fn stats(&self) -> Result<SessionStats, VoxbookError> {
        let doc = self.load().await?;
        let mut stats = SessionStats::default();
        for s in doc.sessions.values() {
            stats.total += 1;
            match s.status {
                SessionStatus::Completed => stats.completed += 1,
                SessionStatus::Failed => stats.failed += 1,
                SessionStatus::Created | SessionStatus::Processing => stats.in_progress += 1,
            }
            stats.total_processed_chunks += s.progress.completed_chunks;
        }
        Ok(stats)
    }
}

/// Only a directory created for this session (a direct child of the chosen
/// output root) is ever removed.
async fn remove_session_output(session: &Session) {
    let Some(dir) = session.output_dir.as_deref() else {
        return;
    };
    if dir.parent() != Some(session.options.output_dir.as_path()) {
        tracing::warn!(
            "Not removing {}: outside the session's output root",
            dir.display()
        );
        return;
    }
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", dir.display(), e),
    }
}
