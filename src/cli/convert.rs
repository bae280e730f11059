// src/cli/convert.rs — `voxbook convert` and `voxbook analyze`

use std::path::Path;
use std::sync::Arc;

use super::progress;
use super::resume::{print_outcome, resume_session};
use super::ConvertArgs;
use crate::core::{Analysis, ConversionOrchestrator};
use crate::infra::config::Config;
use crate::session::{ConversionOptions, SessionStore};
use crate::speech::{self, ProviderKind, QualityTier, SpeechBackend};

pub async fn run_convert(args: ConvertArgs, config: &Config) -> anyhow::Result<()> {
    let store = SessionStore::default_location();
    let interactive = super::interactive() && !args.yes;

    // Earlier progress on this exact file takes precedence over new settings.
    if !args.fresh {
        if let Some(existing) = store.find_by_path(&args.file).await? {
            if existing.is_complete() {
                eprintln!(
                    "Already converted (session {}). Use --fresh to convert again.",
                    existing.short_id()
                );
                print_outcome(&crate::core::ConversionOutcome {
                    final_output: existing.final_output_path.clone(),
                    session: existing,
                    synthesized: 0,
                });
                return Ok(());
            }
            if existing.has_resumable_progress() && offer_resume(&existing, interactive)? {
                if let Some(outcome) =
                    resume_session(&store, &existing.id, args.quiet, config).await?
                {
                    print_outcome(&outcome);
                }
                return Ok(());
            }
        }
    }

    let provider = args.provider.unwrap_or(config.conversion.provider);
    let tier = args.tier.unwrap_or(config.conversion.tier);
    let chunk_size = args.chunk_size.unwrap_or(config.conversion.chunk_size);
    let backend = speech::resolve_backend(provider, config).await?;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let renderer = progress::spawn_renderer(rx, args.quiet);
    let mut orchestrator =
        ConversionOrchestrator::new(store, Arc::clone(&backend)).with_events(tx);

    let analysis = orchestrator
        .analyze(&args.file, chunk_size, tier, config.limits.max_file_bytes())
        .await?;
    if !args.quiet {
        progress::print_analysis(&analysis);
    }

    let options = configure(&args, config, &analysis, backend.as_ref(), interactive).await?;
    if interactive && analysis.estimated_cost > 0.0 {
        let go = inquire::Confirm::new(&format!(
            "Convert for an estimated ${:.2}?",
            analysis.estimated_cost
        ))
        .with_default(true)
        .prompt()
        .unwrap_or(false);
        if !go {
            eprintln!("Cancelled.");
            return Ok(());
        }
    }

    let session = orchestrator.start(&analysis, options).await?;
    let result = orchestrator.process(&session, analysis.chunks).await;
    drop(orchestrator);
    let _ = renderer.await;

    print_outcome(&result?);
    Ok(())
}

fn offer_resume(existing: &crate::session::Session, interactive: bool) -> anyhow::Result<bool> {
    let prompt = format!(
        "Found {}/{} chunks done from {} (session {}). Resume?",
        existing.progress.completed_chunks,
        existing.progress.total_chunks,
        existing.updated_at.format("%Y-%m-%d %H:%M"),
        existing.short_id()
    );
    if !interactive {
        eprintln!("{prompt} yes");
        return Ok(true);
    }
    Ok(inquire::Confirm::new(&prompt)
        .with_default(true)
        .with_help_message("No starts over from the first chunk")
        .prompt()
        .unwrap_or(true))
}

/// Settings from flags, then config, then (interactively) a voice picker.
async fn configure(
    args: &ConvertArgs,
    config: &Config,
    analysis: &Analysis,
    backend: &dyn SpeechBackend,
    interactive: bool,
) -> anyhow::Result<ConversionOptions> {
    let conv = &config.conversion;
    let voice = match args.voice.clone().or_else(|| {
        // A configured voice only applies to the configured provider.
        (backend.kind() == conv.provider)
            .then(|| conv.voice.clone())
            .flatten()
    }) {
        Some(v) => v,
        None => pick_voice(backend, interactive).await?,
    };

    Ok(ConversionOptions {
        provider: backend.kind(),
        voice,
        speed: args.speed.unwrap_or(conv.speed),
        tier: analysis.tier,
        layout: args.layout.unwrap_or(conv.layout),
        output_dir: args.output_dir.clone().unwrap_or_else(|| conv.output_root()),
        chunk_size: analysis.chunk_size,
    })
}

async fn pick_voice(backend: &dyn SpeechBackend, interactive: bool) -> anyhow::Result<String> {
    let voices = backend.list_voices().await?;
    if voices.is_empty() {
        anyhow::bail!(
            "No voices available for '{}'. Run `voxbook doctor`.",
            backend.kind()
        );
    }
    if !interactive {
        return Ok(voices[0].id.clone());
    }
    let labels: Vec<String> = voices
        .iter()
        .map(|v| format!("{:<28} {}", v.id, v.label))
        .collect();
    let choice = inquire::Select::new("Voice:", labels.clone())
        .with_help_message("Preview voices with `voxbook voices --preview <id>`")
        .prompt()
        .map_err(|_| anyhow::anyhow!("Selection cancelled"))?;
    let idx = labels.iter().position(|l| *l == choice).unwrap_or(0);
    Ok(voices[idx].id.clone())
}

pub async fn run_analyze(
    file: &Path,
    chunk_size: Option<usize>,
    provider: Option<ProviderKind>,
    tier: Option<QualityTier>,
    config: &Config,
) -> anyhow::Result<()> {
    let provider = provider.unwrap_or(config.conversion.provider);
    let tier = tier.unwrap_or(config.conversion.tier);
    let chunk_size = chunk_size.unwrap_or(config.conversion.chunk_size);

    let mut analysis = crate::core::analyze(
        file,
        chunk_size,
        provider,
        tier,
        config.limits.max_file_bytes(),
    )
    .await?;
    analysis.existing = SessionStore::default_location()
        .get(&analysis.session_id())
        .await?;

    progress::print_analysis(&analysis);
    for other in ProviderKind::ALL.iter().filter(|p| **p != provider) {
        eprintln!(
            "  {:<10}  ${:.2} with {}",
            "",
            analysis.estimate_for(*other, QualityTier::Standard),
            other
        );
    }
    if let Some(existing) = analysis.existing.as_ref() {
        eprintln!(
            "  Session:    {} ({}, {}/{} chunks)",
            existing.short_id(),
            existing.status,
            existing.progress.completed_chunks,
            existing.progress.total_chunks
        );
    }
    Ok(())
}
