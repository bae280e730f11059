// src/core/orchestrator.rs — Conversion state machine
//
// Created → Analyzing → ConfiguringSettings → Processing → Assembling → Completed,
// with Failed reachable from Processing and Assembling. Progress is written to
// the session store after every chunk, before the next one is synthesized.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use super::analysis::{self, Analysis};
use super::resume::{self, SourceCheck};
use super::types::{ConversionEvent, ConversionOutcome, ConversionPhase};
use crate::infra::errors::VoxbookError;
use crate::session::types::{final_output_name, session_output_dir};
use crate::session::{ConversionOptions, Session, SessionStatus, SessionStore, SessionUpdate};
use crate::speech::{QualityTier, SpeechBackend, SynthesisOptions};
use crate::text::segmenter::MIN_CHUNK_SIZE;
use crate::text::{chunk_document, extract, Chunk};

/// Chunk number recorded for errors that happen during assembly.
pub const ASSEMBLY_ERROR_CHUNK: usize = 0;

pub struct ConversionOrchestrator {
    store: SessionStore,
    backend: Arc<dyn SpeechBackend>,
    events: Option<UnboundedSender<ConversionEvent>>,
    phase: ConversionPhase,
}

impl ConversionOrchestrator {
    pub fn new(store: SessionStore, backend: Arc<dyn SpeechBackend>) -> Self {
        Self {
            store,
            backend,
            events: None,
            phase: ConversionPhase::Created,
        }
    }

    /// Send lifecycle and per-chunk events to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<ConversionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn phase(&self) -> ConversionPhase {
        self.phase
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn emit(&self, event: ConversionEvent) {
        if let Some(ref tx) = self.events {
            // Receiver gone means nobody is rendering; not an error.
            let _ = tx.send(event);
        }
    }

    fn set_phase(&mut self, phase: ConversionPhase) {
        if self.phase != phase {
            tracing::debug!("Phase {} -> {}", self.phase, phase);
            self.phase = phase;
            self.emit(ConversionEvent::PhaseChanged(phase));
        }
    }

    /// Analyze `path` and attach any session already recorded for it.
    pub async fn analyze(
        &mut self,
        path: &Path,
        chunk_size: usize,
        tier: QualityTier,
        max_bytes: u64,
    ) -> Result<Analysis, VoxbookError> {
        self.set_phase(ConversionPhase::Analyzing);
        let mut analysis =
            analysis::analyze(path, chunk_size, self.backend.kind(), tier, max_bytes).await?;
        analysis.existing = self.store.get(&analysis.session_id()).await?;
        if analysis.resumable().is_none() {
            self.set_phase(ConversionPhase::ConfiguringSettings);
        }
        Ok(analysis)
    }

    /// Persist a new session with `options` and prepare its output directory.
    pub async fn start(
        &mut self,
        analysis: &Analysis,
        mut options: ConversionOptions,
    ) -> Result<Session, VoxbookError> {
        self.set_phase(ConversionPhase::ConfiguringSettings);
        if options.provider != self.backend.kind() {
            return Err(VoxbookError::Validation(format!(
                "options are for '{}' but the backend is '{}'",
                options.provider,
                self.backend.kind()
            )));
        }
        if options.chunk_size != analysis.chunk_size {
            return Err(VoxbookError::Validation(format!(
                "document was segmented at {} chars, options say {}",
                analysis.chunk_size, options.chunk_size
            )));
        }
        if let Some(cap) = self.backend.max_input_chars() {
            if options.chunk_size > cap {
                return Err(VoxbookError::ChunkSize {
                    size: options.chunk_size,
                    min: MIN_CHUNK_SIZE,
                    max: cap,
                });
            }
        }
        self.backend
            .validate(&SynthesisOptions::from(&options))
            .await?;

        // Stored paths must not depend on the directory `resume` runs from
        options.output_dir = std::path::absolute(&options.output_dir)?;
        let root = options.output_dir.clone();
        let session = self.store.create(&analysis.source.path, options).await?;
        let out_dir = session_output_dir(&root, &session.source_name, &session.id);
        tokio::fs::create_dir_all(&out_dir).await?;

        let session = self
            .store
            .update(
                &session.id,
                SessionUpdate {
                    total_chunks: Some(analysis.total_chunks()),
                    output_dir: Some(out_dir),
                    status: Some(SessionStatus::Processing),
                    ..Default::default()
                },
            )
            .await?;
        Ok(session)
    }

    /// Synthesize every chunk after the session's `completed_chunks`, then
    /// assemble or finish according to the output layout.
    pub async fn process(
        &mut self,
        session: &Session,
        chunks: Vec<Chunk>,
    ) -> Result<ConversionOutcome, VoxbookError> {
        self.ensure_backend_matches(session)?;
        let remaining = resume::plan_remaining(session, chunks)?;
        let out_dir = session
            .output_dir
            .clone()
            .unwrap_or_else(|| {
                session_output_dir(&session.options.output_dir, &session.source_name, &session.id)
            });
        tokio::fs::create_dir_all(&out_dir).await?;

        self.set_phase(ConversionPhase::Processing);
        if session.status != SessionStatus::Processing {
            self.store
                .update(&session.id, SessionUpdate::status(SessionStatus::Processing))
                .await?;
        }

        let total = session.progress.total_chunks;
        let options = SynthesisOptions::from(&session.options);
        let backend = Arc::clone(&self.backend);
        let mut synthesized = 0;

        {
            let mut stream = backend.process_chunks(&remaining, total, &options, &out_dir);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(done) => {
                        self.store
                            .update(
                                &session.id,
                                SessionUpdate::chunk_completed(done.current, done.file_path.clone()),
                            )
                            .await?;
                        synthesized += 1;
                        tracing::debug!("Chunk {}/{} saved", done.current, done.total);
                        self.emit(ConversionEvent::ChunkCompleted {
                            session_id: session.id.clone(),
                            current: done.current,
                            total: done.total,
                            file_path: done.file_path,
                        });
                    }
                    Err(failure) => {
                        let message = failure.error.to_string();
                        tracing::warn!("Chunk {} failed: {}", failure.chunk, message);
                        self.store
                            .update(
                                &session.id,
                                SessionUpdate::chunk_failed(failure.chunk, message.clone()),
                            )
                            .await?;
                        self.emit(ConversionEvent::ChunkFailed {
                            session_id: session.id.clone(),
                            chunk: failure.chunk,
                            error: message,
                            resumable: failure.error.is_resumable(),
                        });
                        self.set_phase(ConversionPhase::Failed);
                        return Err(failure.error);
                    }
                }
            }
        }

        let mut outcome = self.finish(&session.id).await?;
        outcome.synthesized = synthesized;
        Ok(outcome)
    }

    /// Pick up session `id` where it stopped. A finished session is returned
    /// as-is; a session with every chunk done goes straight to assembly.
    pub async fn resume(
        &mut self,
        id: &str,
        max_bytes: u64,
    ) -> Result<ConversionOutcome, VoxbookError> {
        let session = self.store.require(id).await?;
        if session.is_complete() {
            tracing::info!("Session {} already completed", id);
            self.set_phase(ConversionPhase::Completed);
            return Ok(ConversionOutcome {
                final_output: session.final_output_path.clone(),
                session,
                synthesized: 0,
            });
        }
        self.ensure_backend_matches(&session)?;

        match resume::check_source(&session).await? {
            SourceCheck::Unchanged(_) => {}
            SourceCheck::Changed(ident) => {
                return Err(VoxbookError::RelocationMismatch(format!(
                    "{} was modified after session {} started",
                    ident.path.display(),
                    session.short_id()
                )))
            }
            SourceCheck::Missing => {
                return Err(VoxbookError::SourceMissing(session.source_path.clone()))
            }
        }

        self.set_phase(ConversionPhase::Analyzing);
        let document = extract(&session.source_path, max_bytes).await?;
        let chunks = chunk_document(&document.text, session.options.chunk_size)?;
        let remaining = resume::plan_remaining(&session, chunks.clone())?;

        tracing::info!(
            "Resuming session {} at chunk {}/{}",
            session.short_id(),
            session.progress.completed_chunks + 1,
            session.progress.total_chunks
        );

        if remaining.is_empty() {
            return self.finish(&session.id).await;
        }
        self.backend
            .validate(&SynthesisOptions::from(&session.options))
            .await?;
        self.process(&session, chunks).await
    }

    /// Combine the chunk files of a fully synthesized session. Can be retried
    /// after an assembly failure without any re-synthesis.
    pub async fn assemble(&mut self, id: &str) -> Result<ConversionOutcome, VoxbookError> {
        let session = self.store.require(id).await?;
        let progress = &session.progress;
        if progress.total_chunks == 0 || progress.completed_chunks != progress.total_chunks {
            return Err(VoxbookError::InvalidState {
                id: id.into(),
                action: "assembled".into(),
                status: format!(
                    "{} with {}/{} chunks",
                    session.status, progress.completed_chunks, progress.total_chunks
                ),
            });
        }
        self.ensure_backend_matches(&session)?;

        if !session.options.layout.needs_assembly() {
            return self.complete(&session, None).await;
        }

        self.set_phase(ConversionPhase::Assembling);
        let files = session.ordered_chunk_files();
        let out_dir = session.output_dir.clone().unwrap_or_else(|| {
            session_output_dir(&session.options.output_dir, &session.source_name, &session.id)
        });
        let output = out_dir.join(final_output_name(
            &session.source_name,
            self.backend.audio_extension(),
        ));

        let path = match self.backend.concatenate(&files, &output).await {
            Ok(p) => p,
            Err(e) => {
                let message = format!("assembly failed: {e}");
                tracing::warn!("Session {}: {}", session.short_id(), message);
                self.store
                    .update(
                        &session.id,
                        SessionUpdate::chunk_failed(ASSEMBLY_ERROR_CHUNK, message),
                    )
                    .await?;
                self.set_phase(ConversionPhase::Failed);
                return Err(e);
            }
        };
        self.emit(ConversionEvent::Assembled {
            session_id: session.id.clone(),
            path: path.clone(),
            chunks: files.len(),
        });

        if !session.options.layout.keeps_chunks() {
            let removed = self.backend.assembler().remove_chunks(&files).await;
            tracing::debug!("Removed {} chunk file(s)", removed);
        }

        self.complete(&session, Some(path)).await
    }

    async fn finish(&mut self, id: &str) -> Result<ConversionOutcome, VoxbookError> {
        let session = self.store.require(id).await?;
        if session.options.layout.needs_assembly() {
            self.assemble(id).await
        } else {
            self.complete(&session, None).await
        }
    }

    async fn complete(
        &mut self,
        session: &Session,
        final_output: Option<PathBuf>,
    ) -> Result<ConversionOutcome, VoxbookError> {
        let updated = self
            .store
            .update(
                &session.id,
                SessionUpdate {
                    status: Some(SessionStatus::Completed),
                    final_output_path: final_output.clone(),
                    ..Default::default()
                },
            )
            .await?;
        self.set_phase(ConversionPhase::Completed);
        self.emit(ConversionEvent::Completed {
            session_id: updated.id.clone(),
            final_output: final_output.clone(),
            output_dir: updated.output_dir.clone(),
        });
        tracing::info!("Session {} completed", updated.short_id());
        Ok(ConversionOutcome {
            session: updated,
            synthesized: 0,
            final_output,
        })
    }

    fn ensure_backend_matches(&self, session: &Session) -> Result<(), VoxbookError> {
        if session.options.provider != self.backend.kind() {
            return Err(VoxbookError::Validation(format!(
                "session {} uses '{}', not '{}'",
                session.short_id(),
                session.options.provider,
                self.backend.kind()
            )));
        }
        Ok(())
    }
}
