// tests/orchestrator_test.rs — Integration test: conversion lifecycle with a mock backend

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use voxbook::audio::AudioAssembler;
use voxbook::core::{ConversionEvent, ConversionOrchestrator, ConversionPhase};
use voxbook::infra::errors::VoxbookError;
use voxbook::session::{
    ConversionOptions, OutputLayout, SessionStatus, SessionStore, SessionUpdate,
};
use voxbook::speech::{ProviderKind, QualityTier, SpeechBackend, SynthesisOptions, Voice};

/// Returns each chunk's text as its "audio", so assembled output can be
/// checked for order. Optionally fails on the Nth synthesize call.
struct MockBackend {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    fail_concat: AtomicBool,
    max_input: Option<usize>,
    texts: Mutex<Vec<String>>,
    assembler: AudioAssembler,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            fail_concat: AtomicBool::new(false),
            max_input: None,
            texts: Mutex::new(Vec::new()),
            assembler: AudioAssembler::new("ffmpeg-not-used-in-tests"),
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechBackend for MockBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Piper
    }

    fn assembler(&self) -> &AudioAssembler {
        &self.assembler
    }

    fn max_input_chars(&self) -> Option<usize> {
        self.max_input
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, VoxbookError> {
        Ok(vec![Voice {
            id: "mock".into(),
            label: "Mock".into(),
            language: Some("en_US".into()),
        }])
    }

    async fn validate(&self, options: &SynthesisOptions) -> Result<(), VoxbookError> {
        if options.voice != "mock" {
            return Err(VoxbookError::UnknownVoice {
                provider: "piper".into(),
                voice: options.voice.clone(),
            });
        }
        Ok(())
    }

    async fn synthesize(
        &self,
        text: &str,
        _options: &SynthesisOptions,
    ) -> Result<Vec<u8>, VoxbookError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(VoxbookError::RateLimited {
                provider: "piper".into(),
            });
        }
        self.texts.lock().unwrap().push(text.to_string());
        Ok(text.as_bytes().to_vec())
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn concatenate(
        &self,
        ordered_files: &[PathBuf],
        output: &Path,
    ) -> Result<PathBuf, VoxbookError> {
        if self.fail_concat.load(Ordering::SeqCst) {
            return Err(VoxbookError::Assembly("corrupt segment".into()));
        }
        let mut joined = Vec::new();
        for f in ordered_files {
            joined.extend(std::fs::read(f)?);
        }
        std::fs::write(output, joined)?;
        Ok(output.to_path_buf())
    }
}

struct Fixture {
    dir: TempDir,
    store: SessionStore,
    book: PathBuf,
}

impl Fixture {
    /// 95 sentences of 100 characters: 9,500 characters, 3 chunks at 4000.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("data").join("sessions.json"));
        let book = dir.path().join("My Book.txt");
        std::fs::write(&book, sentences(95)).unwrap();
        Self { dir, store, book }
    }

    fn options(&self, layout: OutputLayout) -> ConversionOptions {
        ConversionOptions {
            provider: ProviderKind::Piper,
            voice: "mock".into(),
            speed: 1.0,
            tier: QualityTier::Standard,
            layout,
            output_dir: self.dir.path().join("out"),
            chunk_size: 4000,
        }
    }

    fn orchestrator(&self, backend: &Arc<MockBackend>) -> ConversionOrchestrator {
        ConversionOrchestrator::new(self.store.clone(), backend.clone())
    }
}

fn sentences(n: usize) -> String {
    (0..n)
        .map(|i| format!("{:0>3} {}.", i, "w".repeat(95)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Start a conversion and process it, returning the session id and result.
async fn convert(
    fx: &Fixture,
    backend: &Arc<MockBackend>,
    layout: OutputLayout,
) -> (String, Result<voxbook::core::ConversionOutcome, VoxbookError>, Vec<String>) {
    let mut orch = fx.orchestrator(backend);
    let analysis = orch
        .analyze(&fx.book, 4000, QualityTier::Standard, u64::MAX)
        .await
        .unwrap();
    let expected: Vec<String> = analysis.chunks.iter().map(|c| c.text.clone()).collect();
    let session = orch.start(&analysis, fx.options(layout)).await.unwrap();
    let result = orch.process(&session, analysis.chunks.clone()).await;
    (session.id, result, expected)
}

#[tokio::test]
async fn test_full_conversion_single_layout() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    let (id, result, chunks) = convert(&fx, &backend, OutputLayout::Single).await;
    let outcome = result.unwrap();

    assert_eq!(chunks.len(), 3);
    assert_eq!(outcome.synthesized, 3);
    assert_eq!(backend.calls(), 3);

    let final_path = outcome.final_output.unwrap();
    assert!(final_path.ends_with("my-book_audiobook.wav"));
    assert_eq!(std::fs::read_to_string(&final_path).unwrap(), chunks.concat());

    let session = fx.store.require(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.progress.completed_chunks, 3);
    assert_eq!(session.progress.percentage, 100);
    assert_eq!(session.final_output_path.as_deref(), Some(final_path.as_path()));

    // Single layout removes chunk files after assembly
    for f in session.ordered_chunk_files() {
        assert!(!f.exists(), "{} should be removed", f.display());
    }
}

#[tokio::test]
async fn test_interrupted_conversion_resumes_at_failed_chunk() {
    let fx = Fixture::new();
    let failing = Arc::new(MockBackend::failing_on(3));
    let (id, result, chunks) = convert(&fx, &failing, OutputLayout::Both).await;

    assert!(matches!(result, Err(VoxbookError::RateLimited { .. })));
    let failed = fx.store.require(&id).await.unwrap();
    assert_eq!(failed.status, SessionStatus::Failed);
    assert_eq!(failed.progress.completed_chunks, 2);
    assert_eq!(failed.progress.errors.len(), 1);
    assert_eq!(failed.progress.errors[0].chunk_number, 3);
    assert!(failed.final_output_path.is_none());

    let done = failed.ordered_chunk_files();
    let before: Vec<(Vec<u8>, std::time::SystemTime)> = done
        .iter()
        .map(|f| {
            (
                std::fs::read(f).unwrap(),
                std::fs::metadata(f).unwrap().modified().unwrap(),
            )
        })
        .collect();

    let healthy = Arc::new(MockBackend::new());
    let mut orch = fx.orchestrator(&healthy);
    let outcome = orch.resume(&id, u64::MAX).await.unwrap();

    assert_eq!(outcome.synthesized, 1);
    assert_eq!(healthy.calls(), 1);
    assert_eq!(healthy.texts.lock().unwrap().as_slice(), &chunks[2..]);
    assert_eq!(orch.phase(), ConversionPhase::Completed);

    // Files for chunks 1 and 2 are untouched
    for (f, (bytes, mtime)) in done.iter().zip(before) {
        assert_eq!(std::fs::read(f).unwrap(), bytes);
        assert_eq!(std::fs::metadata(f).unwrap().modified().unwrap(), mtime);
    }

    let session = fx.store.require(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    let numbers: Vec<usize> = session
        .progress
        .processed_files
        .iter()
        .map(|p| p.chunk_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(
        std::fs::read_to_string(outcome.final_output.unwrap()).unwrap(),
        chunks.concat()
    );
    // Both layout keeps chunk files
    assert!(session.ordered_chunk_files().iter().all(|f| f.exists()));
}

#[tokio::test]
async fn test_resume_after_kill_mid_processing() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    let mut orch = fx.orchestrator(&backend);
    let analysis = orch
        .analyze(&fx.book, 4000, QualityTier::Standard, u64::MAX)
        .await
        .unwrap();
    let chunks: Vec<String> = analysis.chunks.iter().map(|c| c.text.clone()).collect();
    let session = orch
        .start(&analysis, fx.options(OutputLayout::Both))
        .await
        .unwrap();
    let out_dir = session.output_dir.clone().unwrap();

    // Process killed after persisting chunk 2: no Failed status, no error recorded
    for (n, text) in chunks.iter().enumerate().take(2) {
        let file = out_dir.join(format!("chunk_{:03}.wav", n + 1));
        std::fs::write(&file, text).unwrap();
        fx.store
            .update(&session.id, SessionUpdate::chunk_completed(n + 1, file))
            .await
            .unwrap();
    }
    let killed = fx.store.require(&session.id).await.unwrap();
    assert_eq!(killed.status, SessionStatus::Processing);
    assert_eq!(killed.progress.completed_chunks, 2);

    let healthy = Arc::new(MockBackend::new());
    let outcome = fx
        .orchestrator(&healthy)
        .resume(&session.id, u64::MAX)
        .await
        .unwrap();

    assert_eq!(outcome.synthesized, 1);
    assert_eq!(healthy.calls(), 1);
    assert_eq!(healthy.texts.lock().unwrap().as_slice(), &chunks[2..]);
    assert_eq!(
        std::fs::read_to_string(outcome.final_output.unwrap()).unwrap(),
        chunks.concat()
    );

    let done = fx.store.require(&session.id).await.unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.progress.completed_chunks, 3);
    assert!(done.progress.errors.is_empty());
}

#[tokio::test]
async fn test_relative_output_dir_survives_cwd_change() {
    let fx = Fixture::new();
    let first = fx.dir.path().join("a");
    let second = fx.dir.path().join("b");
    std::fs::create_dir_all(&first).unwrap();
    std::fs::create_dir_all(&second).unwrap();
    let original_cwd = std::env::current_dir().unwrap();

    std::env::set_current_dir(&first).unwrap();
    let first_cwd = std::env::current_dir().unwrap();
    let failing = Arc::new(MockBackend::failing_on(3));
    let mut orch = fx.orchestrator(&failing);
    let analysis = orch
        .analyze(&fx.book, 4000, QualityTier::Standard, u64::MAX)
        .await
        .unwrap();
    let mut options = fx.options(OutputLayout::Both);
    options.output_dir = PathBuf::from("out");
    let session = orch.start(&analysis, options).await.unwrap();
    let result = orch.process(&session, analysis.chunks.clone()).await;
    assert!(result.is_err());

    let failed = fx.store.require(&session.id).await.unwrap();
    assert!(failed.options.output_dir.is_absolute());
    assert!(failed.output_dir.as_ref().unwrap().is_absolute());
    assert!(failed.ordered_chunk_files().iter().all(|f| f.is_absolute()));

    std::env::set_current_dir(&second).unwrap();
    let healthy = Arc::new(MockBackend::new());
    let resumed = fx
        .orchestrator(&healthy)
        .resume(&session.id, u64::MAX)
        .await;
    std::env::set_current_dir(&original_cwd).unwrap();

    let outcome = resumed.unwrap();
    assert_eq!(healthy.calls(), 1);
    let final_path = outcome.final_output.unwrap();
    assert!(final_path.starts_with(first_cwd.join("out")));

    let session = fx.store.require(&session.id).await.unwrap();
    let out_dir = session.output_dir.unwrap();
    assert!(out_dir.starts_with(first_cwd.join("out")));
    assert!(out_dir.join("chunk_003.wav").exists());
    assert!(!second.join("out").exists());
}

#[tokio::test]
async fn test_resume_of_completed_session_does_nothing() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    let (id, result, _) = convert(&fx, &backend, OutputLayout::Single).await;
    let first = result.unwrap();

    let again = Arc::new(MockBackend::new());
    let outcome = fx.orchestrator(&again).resume(&id, u64::MAX).await.unwrap();
    assert_eq!(outcome.synthesized, 0);
    assert_eq!(again.calls(), 0);
    assert_eq!(outcome.final_output, first.final_output);
}

#[tokio::test]
async fn test_resume_after_all_chunks_only_assembles() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    backend.fail_concat.store(true, Ordering::SeqCst);
    let (id, result, chunks) = convert(&fx, &backend, OutputLayout::Single).await;

    assert!(matches!(result, Err(VoxbookError::Assembly(_))));
    let failed = fx.store.require(&id).await.unwrap();
    assert_eq!(failed.status, SessionStatus::Failed);
    assert_eq!(failed.progress.completed_chunks, 3);
    assert_eq!(failed.last_error().unwrap().chunk_number, 0);

    let retry = Arc::new(MockBackend::new());
    let outcome = fx.orchestrator(&retry).resume(&id, u64::MAX).await.unwrap();
    assert_eq!(retry.calls(), 0);
    assert_eq!(outcome.synthesized, 0);
    assert_eq!(
        std::fs::read_to_string(outcome.final_output.unwrap()).unwrap(),
        chunks.concat()
    );
}

#[tokio::test]
async fn test_assemble_retry_without_resynthesis() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    backend.fail_concat.store(true, Ordering::SeqCst);
    let (id, result, _) = convert(&fx, &backend, OutputLayout::Both).await;
    assert!(result.is_err());

    backend.fail_concat.store(false, Ordering::SeqCst);
    let outcome = fx.orchestrator(&backend).assemble(&id).await.unwrap();
    assert_eq!(backend.calls(), 3);
    assert!(outcome.final_output.unwrap().exists());
    assert_eq!(
        fx.store.require(&id).await.unwrap().status,
        SessionStatus::Completed
    );
}

#[tokio::test]
async fn test_assemble_refuses_incomplete_session() {
    let fx = Fixture::new();
    let failing = Arc::new(MockBackend::failing_on(2));
    let (id, _, _) = convert(&fx, &failing, OutputLayout::Single).await;

    let err = fx.orchestrator(&failing).assemble(&id).await.unwrap_err();
    assert!(matches!(err, VoxbookError::InvalidState { .. }));
}

#[tokio::test]
async fn test_separate_layout_skips_assembly() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    backend.fail_concat.store(true, Ordering::SeqCst);
    let (id, result, _) = convert(&fx, &backend, OutputLayout::Separate).await;

    let outcome = result.unwrap();
    assert!(outcome.final_output.is_none());
    let session = fx.store.require(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    let files = session.ordered_chunk_files();
    assert_eq!(files.len(), 3);
    assert!(files[0].ends_with("chunk_001.wav"));
    assert!(files.iter().all(|f| f.exists()));
}

#[tokio::test]
async fn test_resume_rejects_changed_chunk_count() {
    let fx = Fixture::new();
    let failing = Arc::new(MockBackend::failing_on(2));
    let (id, _, _) = convert(&fx, &failing, OutputLayout::Single).await;

    // New content under the same identity (mtime restored)
    let mtime = std::fs::metadata(&fx.book).unwrap().modified().unwrap();
    std::fs::write(&fx.book, sentences(200)).unwrap();
    std::fs::File::options()
        .write(true)
        .open(&fx.book)
        .unwrap()
        .set_modified(mtime)
        .unwrap();

    let backend = Arc::new(MockBackend::new());
    let err = fx
        .orchestrator(&backend)
        .resume(&id, u64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VoxbookError::ChunkCountMismatch { expected: 3, .. }
    ));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_resume_refuses_modified_source() {
    let fx = Fixture::new();
    let failing = Arc::new(MockBackend::failing_on(2));
    let (id, _, _) = convert(&fx, &failing, OutputLayout::Single).await;

    let mtime = std::fs::metadata(&fx.book).unwrap().modified().unwrap();
    std::fs::File::options()
        .write(true)
        .open(&fx.book)
        .unwrap()
        .set_modified(mtime + std::time::Duration::from_secs(60))
        .unwrap();

    let err = fx
        .orchestrator(&Arc::new(MockBackend::new()))
        .resume(&id, u64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, VoxbookError::RelocationMismatch(_)));
}

#[tokio::test]
async fn test_missing_source_then_relocation() {
    let fx = Fixture::new();
    let failing = Arc::new(MockBackend::failing_on(3));
    let (id, _, _) = convert(&fx, &failing, OutputLayout::Both).await;

    let moved_dir = fx.dir.path().join("moved");
    std::fs::create_dir(&moved_dir).unwrap();
    let moved = moved_dir.join("My Book.txt");
    std::fs::rename(&fx.book, &moved).unwrap();

    let backend = Arc::new(MockBackend::new());
    let err = fx
        .orchestrator(&backend)
        .resume(&id, u64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, VoxbookError::SourceMissing(_)));

    let session = fx.store.require(&id).await.unwrap();
    voxbook::core::resume::validate_relocation(&session, &moved)
        .await
        .unwrap();
    let relocated = fx.store.rekey(&id, &moved).await.unwrap();
    assert_ne!(relocated.id, id);
    assert_eq!(relocated.progress.completed_chunks, 2);
    assert_eq!(relocated.output_dir, session.output_dir);

    let outcome = fx
        .orchestrator(&backend)
        .resume(&relocated.id, u64::MAX)
        .await
        .unwrap();
    assert_eq!(outcome.synthesized, 1);
    assert_eq!(backend.calls(), 1);
    assert!(fx.store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_start_rejects_invalid_voice_before_creating_session() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    let mut orch = fx.orchestrator(&backend);
    let analysis = orch
        .analyze(&fx.book, 4000, QualityTier::Standard, u64::MAX)
        .await
        .unwrap();

    let mut options = fx.options(OutputLayout::Single);
    options.voice = "nobody".into();
    let err = orch.start(&analysis, options).await.unwrap_err();
    assert!(matches!(err, VoxbookError::UnknownVoice { .. }));
    assert!(fx.store.list(false, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_rejects_chunks_above_backend_cap() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend {
        max_input: Some(3000),
        ..MockBackend::new()
    });
    let mut orch = fx.orchestrator(&backend);
    let analysis = orch
        .analyze(&fx.book, 4000, QualityTier::Standard, u64::MAX)
        .await
        .unwrap();

    let err = orch
        .start(&analysis, fx.options(OutputLayout::Single))
        .await
        .unwrap_err();
    assert!(matches!(err, VoxbookError::ChunkSize { max: 3000, .. }));
    assert!(fx.store.list(false, None).await.unwrap().is_empty());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_analyze_reports_resumable_session() {
    let fx = Fixture::new();
    let failing = Arc::new(MockBackend::failing_on(2));
    let (id, _, _) = convert(&fx, &failing, OutputLayout::Single).await;

    let mut orch = fx.orchestrator(&Arc::new(MockBackend::new()));
    let analysis = orch
        .analyze(&fx.book, 4000, QualityTier::Standard, u64::MAX)
        .await
        .unwrap();
    assert_eq!(analysis.resumable().map(|s| s.id.clone()), Some(id));
    // A resumable session keeps the orchestrator out of settings
    assert_eq!(orch.phase(), ConversionPhase::Analyzing);
}

#[tokio::test]
async fn test_events_follow_progress() {
    let fx = Fixture::new();
    let backend = Arc::new(MockBackend::new());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut orch = fx.orchestrator(&backend).with_events(tx);

    let analysis = orch
        .analyze(&fx.book, 4000, QualityTier::Standard, u64::MAX)
        .await
        .unwrap();
    let session = orch
        .start(&analysis, fx.options(OutputLayout::Single))
        .await
        .unwrap();
    orch.process(&session, analysis.chunks.clone()).await.unwrap();
    drop(orch);

    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }

    let chunk_numbers: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ConversionEvent::ChunkCompleted { current, total, .. } => {
                assert_eq!(*total, 3);
                Some(*current)
            }
            _ => None,
        })
        .collect();
    assert_eq!(chunk_numbers, vec![1, 2, 3]);

    let phases: Vec<ConversionPhase> = events
        .iter()
        .filter_map(|e| match e {
            ConversionEvent::PhaseChanged(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            ConversionPhase::Analyzing,
            ConversionPhase::ConfiguringSettings,
            ConversionPhase::Processing,
            ConversionPhase::Assembling,
            ConversionPhase::Completed,
        ]
    );
    assert!(matches!(events.last(), Some(ConversionEvent::Completed { .. })));
}
