// src/cli/progress.rs — Terminal progress renderer for conversions
//
// All progress output goes to stderr so stdout only carries results.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::core::{Analysis, ConversionEvent, ConversionPhase};

/// One line of output for `event`, or nothing for events not worth showing.
pub fn render(event: &ConversionEvent) -> Option<String> {
    match event {
        ConversionEvent::PhaseChanged(phase) => match phase {
            ConversionPhase::Analyzing => Some("[analyze] reading document...".into()),
            ConversionPhase::Processing => Some("[convert] synthesizing...".into()),
            ConversionPhase::Assembling => Some("[combine] joining chunks...".into()),
            _ => None,
        },
        ConversionEvent::ChunkCompleted { current, total, .. } => Some(format!(
            "[chunk {current}/{total}] {} {}%",
            render_progress_bar(*current, *total, 30),
            percent(*current, *total)
        )),
        ConversionEvent::ChunkFailed {
            session_id,
            chunk,
            error,
            resumable,
        } => {
            let mut line = format!("[chunk {chunk}] failed: {error}");
            if *resumable {
                line.push_str(&format!(
                    "\n  resume with: voxbook resume {}",
                    crate::session::types::short_id(session_id)
                ));
            }
            Some(line)
        }
        ConversionEvent::Assembled { path, chunks, .. } => {
            Some(format!("[combine] {chunks} chunk(s) -> {}", path.display()))
        }
        ConversionEvent::Completed { session_id, .. } => Some(format!(
            "[done] session {}",
            crate::session::types::short_id(session_id)
        )),
    }
}

/// Drain `rx` on a background task until every sender is dropped.
pub fn spawn_renderer(mut rx: UnboundedReceiver<ConversionEvent>, quiet: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if quiet {
                continue;
            }
            if let Some(line) = render(&event) {
                eprintln!("{line}");
            }
        }
    })
}

pub fn print_analysis(analysis: &Analysis) {
    let doc = &analysis.document;
    eprintln!("  File:       {}", analysis.source.name);
    eprintln!(
        "  Type:       {} ({})",
        doc.kind,
        crate::util::format_bytes(analysis.source.size)
    );
    if let Some(pages) = doc.page_count {
        eprintln!("  Pages:      {pages}");
    }
    eprintln!(
        "  Text:       {} characters, {} words",
        doc.character_count, doc.word_count
    );
    eprintln!(
        "  Chunks:     {} (max {} chars)",
        analysis.total_chunks(),
        analysis.chunk_size
    );
    eprintln!(
        "  Est. cost:  ${:.2} ({}, {})",
        analysis.estimated_cost, analysis.provider, analysis.tier
    );
}

/// Render a simple ASCII progress bar: [=====     ]
fn render_progress_bar(current: usize, max: usize, width: usize) -> String {
    if max == 0 {
        return format!("[{}]", " ".repeat(width));
    }
    let clamped = current.min(max);
    let filled = (clamped * width) / max;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "=".repeat(filled), " ".repeat(empty))
}

fn percent(current: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        (current * 100) / total
    }
}
