// src/cli/voices.rs — `voxbook voices`

use crate::infra::config::Config;
use crate::infra::paths;
use crate::speech::{self, preview, ProviderKind, Voice};

pub async fn run_voices(
    provider: Option<ProviderKind>,
    previews: &[String],
    config: &Config,
) -> anyhow::Result<()> {
    let providers: Vec<ProviderKind> = match provider {
        Some(p) => vec![p],
        None if !previews.is_empty() => vec![config.conversion.provider],
        None => ProviderKind::ALL.to_vec(),
    };

    for kind in providers {
        let voices = speech::list_voices(kind, config).await?;
        if previews.is_empty() {
            println!("{}", kind.label());
            if voices.is_empty() {
                println!("  (no voices installed)");
            }
            for v in &voices {
                println!(
                    "  {:<28} {:<8} {}",
                    v.id,
                    v.language.as_deref().unwrap_or("-"),
                    v.label
                );
            }
            println!();
            continue;
        }

        // Previews synthesize audio, so they need a real credential.
        let backend = speech::resolve_backend(kind, config).await?;
        let selected = select(&voices, previews)?;
        let cache = paths::previews_dir();
        let results = preview::preview_many(
            backend.as_ref(),
            &selected,
            &cache,
            config.preview.concurrency,
        )
        .await;
        for (id, result) in results {
            match result {
                Ok(path) => println!("{id}\t{}", path.display()),
                Err(e) => eprintln!("{id}: preview failed: {e}"),
            }
        }
    }
    Ok(())
}

fn select(voices: &[Voice], ids: &[String]) -> anyhow::Result<Vec<Voice>> {
    ids.iter()
        .map(|id| {
            voices
                .iter()
                .find(|v| v.id == *id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Unknown voice '{id}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: &str) -> Voice {
        Voice {
            id: id.into(),
            label: id.into(),
            language: None,
        }
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let voices = vec![v("alloy"), v("echo"), v("nova")];
        let picked = select(&voices, &["nova".into(), "alloy".into()]).unwrap();
        let ids: Vec<&str> = picked.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["nova", "alloy"]);
        assert!(select(&voices, &["bob".into()]).is_err());
    }
}
