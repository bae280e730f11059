// src/cli/sessions.rs — `voxbook sessions` subcommands

use super::SessionsAction;
use crate::core::orchestrator::ASSEMBLY_ERROR_CHUNK;
use crate::session::{Session, SessionStatus, SessionStore};

pub async fn run_sessions(action: Option<SessionsAction>) -> anyhow::Result<()> {
    let store = SessionStore::default_location();
    match action.unwrap_or(SessionsAction::List { limit: None }) {
        SessionsAction::List { limit } => list(&store, limit).await,
        SessionsAction::Show { id } => show(&store, &id).await,
        SessionsAction::Delete { id, all, yes } => delete(&store, id, all, yes).await,
        SessionsAction::Stats => stats(&store).await,
    }
}

/// Expand a unique id prefix (as printed by `sessions list`) to the full id.
pub async fn resolve_session_id(store: &SessionStore, prefix: &str) -> anyhow::Result<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        anyhow::bail!("Empty session id");
    }
    let sessions = store.list(false, None).await?;
    if sessions.iter().any(|s| s.id == prefix) {
        return Ok(prefix.to_string());
    }
    let matches: Vec<&Session> = sessions.iter().filter(|s| s.id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => anyhow::bail!("No session matches '{prefix}'"),
        many => anyhow::bail!(
            "'{prefix}' is ambiguous ({} sessions); use more characters",
            many.len()
        ),
    }
}

async fn list(store: &SessionStore, limit: Option<usize>) -> anyhow::Result<()> {
    let sessions = store.list(true, limit).await?;
    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    println!(
        "{:<10} {:<10} {:>9} {:>5}  {:<16} FILE",
        "ID", "STATUS", "CHUNKS", "%", "UPDATED"
    );
    for s in &sessions {
        println!(
            "{:<10} {:<10} {:>9} {:>4}%  {:<16} {}",
            s.short_id(),
            s.status,
            format!("{}/{}", s.progress.completed_chunks, s.progress.total_chunks),
            s.progress.percentage,
            s.updated_at.format("%Y-%m-%d %H:%M"),
            crate::util::truncate_str(&s.source_name, 48),
        );
    }
    Ok(())
}

async fn show(store: &SessionStore, id: &str) -> anyhow::Result<()> {
    let id = resolve_session_id(store, id).await?;
    let s = store.require(&id).await?;
    println!("Session {}", s.id);
    println!("  Source:     {}", s.source_path.display());
    println!("  Size:       {} bytes", s.source_size);
    println!("  Status:     {}", s.status);
    println!(
        "  Progress:   {}/{} chunks ({}%)",
        s.progress.completed_chunks, s.progress.total_chunks, s.progress.percentage
    );
    println!(
        "  Voice:      {} / {} (speed {}, {})",
        s.options.provider, s.options.voice, s.options.speed, s.options.tier
    );
    println!(
        "  Layout:     {}, chunks of {} chars",
        s.options.layout, s.options.chunk_size
    );
    if let Some(ref dir) = s.output_dir {
        println!("  Output dir: {}", dir.display());
    }
    if let Some(ref out) = s.final_output_path {
        println!("  Audiobook:  {}", out.display());
    }
    println!("  Created:    {}", s.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:    {}", s.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(err) = s.last_error() {
        let at = if err.chunk_number == ASSEMBLY_ERROR_CHUNK {
            "assembly".to_string()
        } else {
            format!("chunk {}", err.chunk_number)
        };
        println!("  Last error: {at}: {}", err.error);
    }
    if matches!(s.status, SessionStatus::Failed | SessionStatus::Processing) {
        println!();
        println!("Resume with: voxbook resume {}", s.short_id());
    }
    Ok(())
}

async fn delete(
    store: &SessionStore,
    id: Option<String>,
    all: bool,
    yes: bool,
) -> anyhow::Result<()> {
    if all {
        if !yes && !confirm("Delete ALL sessions and their output folders?")? {
            eprintln!("Cancelled.");
            return Ok(());
        }
        let n = store.delete_all().await?;
        println!("Deleted {n} session(s).");
        return Ok(());
    }

    let Some(id) = id else {
        anyhow::bail!("Give a session id, or --all");
    };
    let id = resolve_session_id(store, &id).await?;
    let session = store.require(&id).await?;
    if !yes
        && !confirm(&format!(
            "Delete session {} ({}) and its output folder?",
            session.short_id(),
            session.source_name
        ))?
    {
        eprintln!("Cancelled.");
        return Ok(());
    }
    store.delete(&id).await?;
    println!("Deleted session {}.", session.short_id());
    Ok(())
}

async fn stats(store: &SessionStore) -> anyhow::Result<()> {
    let st = store.stats().await?;
    println!("Sessions:          {}", st.total);
    println!("  completed:       {}", st.completed);
    println!("  in progress:     {}", st.in_progress);
    println!("  failed:          {}", st.failed);
    println!("Chunks processed:  {}", st.total_processed_chunks);
    Ok(())
}

fn confirm(message: &str) -> anyhow::Result<bool> {
    if !super::interactive() {
        anyhow::bail!("Refusing to delete without confirmation; pass --yes");
    }
    Ok(inquire::Confirm::new(message)
        .with_default(false)
        .prompt()
        .unwrap_or(false))
}
