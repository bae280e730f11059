// src/cli/resume.rs — `voxbook resume` and `voxbook assemble`

use std::path::PathBuf;

use super::progress;
use super::sessions::resolve_session_id;
use crate::core::resume::validate_relocation;
use crate::core::{ConversionOrchestrator, ConversionOutcome};
use crate::infra::config::Config;
use crate::infra::errors::VoxbookError;
use crate::session::types::short_id;
use crate::session::SessionStore;
use crate::speech;

pub async fn run_resume(id: &str, quiet: bool, config: &Config) -> anyhow::Result<()> {
    let store = SessionStore::default_location();
    let id = resolve_session_id(&store, id).await?;
    if let Some(outcome) = resume_session(&store, &id, quiet, config).await? {
        print_outcome(&outcome);
    }
    Ok(())
}

enum Relocation {
    Moved(String),
    Deleted,
    Cancelled,
}

/// Resume `id`, walking the user through relocation if the source moved.
/// `None` means the user deleted the session instead.
pub(crate) async fn resume_session(
    store: &SessionStore,
    id: &str,
    quiet: bool,
    config: &Config,
) -> anyhow::Result<Option<ConversionOutcome>> {
    let session = store.require(id).await?;
    let backend = speech::resolve_backend(session.options.provider, config).await?;
    let max_bytes = config.limits.max_file_bytes();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let renderer = progress::spawn_renderer(rx, quiet);
    let mut orchestrator = ConversionOrchestrator::new(store.clone(), backend).with_events(tx);

    let mut current_id = id.to_string();
    let result = loop {
        match orchestrator.resume(&current_id, max_bytes).await {
            Err(VoxbookError::SourceMissing(path)) => {
                match relocate(store, &current_id, &path).await? {
                    Relocation::Moved(new_id) => current_id = new_id,
                    Relocation::Deleted => break Ok(None),
                    Relocation::Cancelled => break Err(VoxbookError::SourceMissing(path)),
                }
            }
            other => break other.map(Some),
        }
    };

    drop(orchestrator);
    let _ = renderer.await;
    Ok(result?)
}

/// Offer to point the session at a moved file, or delete it.
async fn relocate(
    store: &SessionStore,
    id: &str,
    missing: &std::path::Path,
) -> anyhow::Result<Relocation> {
    if !super::interactive() {
        eprintln!("Source file is gone: {}", missing.display());
        eprintln!(
            "Run `voxbook resume {}` in a terminal to locate it.",
            short_id(id)
        );
        return Ok(Relocation::Cancelled);
    }

    let session = store.require(id).await?;
    eprintln!("Source file is gone: {}", missing.display());
    let options = vec!["Locate the moved file", "Delete this session", "Cancel"];
    let choice = inquire::Select::new("What now?", options)
        .prompt()
        .map_err(|_| anyhow::anyhow!("Selection cancelled"))?;

    match choice {
        "Locate the moved file" => {
            let answer = inquire::Text::new(&format!("Path to '{}':", session.source_name))
                .with_help_message("Must have the same name and size as the original")
                .prompt()
                .map_err(|_| anyhow::anyhow!("Input cancelled"))?;
            let candidate = PathBuf::from(answer.trim());
            validate_relocation(&session, &candidate).await?;
            let moved = store.rekey(id, &candidate).await?;
            eprintln!("Session now points at {}", moved.source_path.display());
            Ok(Relocation::Moved(moved.id))
        }
        "Delete this session" => {
            store.delete(id).await?;
            eprintln!("Deleted session {}.", session.short_id());
            Ok(Relocation::Deleted)
        }
        _ => Ok(Relocation::Cancelled),
    }
}

pub async fn run_assemble(id: &str, config: &Config) -> anyhow::Result<()> {
    let store = SessionStore::default_location();
    let id = resolve_session_id(&store, id).await?;
    let session = store.require(&id).await?;
    let backend = speech::resolve_backend(session.options.provider, config).await?;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let renderer = progress::spawn_renderer(rx, false);
    let mut orchestrator = ConversionOrchestrator::new(store, backend).with_events(tx);
    let result = orchestrator.assemble(&id).await;
    drop(orchestrator);
    let _ = renderer.await;

    print_outcome(&result?);
    Ok(())
}

/// Result goes to stdout: the audiobook path, or the chunk folder.
pub(crate) fn print_outcome(outcome: &ConversionOutcome) {
    if let Some(ref path) = outcome.final_output {
        println!("{}", path.display());
    } else if let Some(ref dir) = outcome.session.output_dir {
        println!("{}", dir.display());
    }
}
