// src/cli/doctor.rs — Environment diagnostics

use crate::audio::AudioAssembler;
use crate::infra::config::Config;
use crate::infra::{credentials, paths};
use crate::session::SessionStore;
use crate::speech::{self, ProviderKind};
use crate::util::format_bytes;

pub async fn run_doctor(config: &Config) -> anyhow::Result<()> {
    println!("voxbook v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let config_path = paths::config_file_path();
    if config_path.exists() {
        println!("  Config:     {} (loaded)", config_path.display());
    } else {
        println!("  Config:     (using defaults)");
    }

    let store = SessionStore::default_location();
    match tokio::fs::metadata(store.path()).await {
        Ok(meta) => {
            let stats = store.stats().await?;
            println!(
                "  Sessions:   {} ({}, {} session(s))",
                store.path().display(),
                format_bytes(meta.len()),
                stats.total
            );
        }
        Err(_) => println!("  Sessions:   (none yet)"),
    }
    println!("  Output:     {}", config.conversion.output_root().display());
    println!();

    let assembler = AudioAssembler::new(&config.audio.ffmpeg);
    check("ffmpeg", assembler.is_available(), "needed to combine chunks");
    check(
        "pdftotext",
        which::which("pdftotext").is_ok(),
        "needed for .pdf input (poppler-utils)",
    );

    for kind in ProviderKind::ALL {
        let credential = credentials::resolve_non_interactive(kind.id()).await;
        if kind.requires_credential() && credential.is_none() {
            let var = credentials::env_var_for(kind.id()).unwrap_or("an API key");
            check(kind.label(), false, &format!("set {var}"));
            continue;
        }
        let ok = match speech::build_backend(kind, config, credential) {
            Ok(backend) => backend.is_available().await,
            Err(_) => false,
        };
        let hint = match kind {
            ProviderKind::OpenAi => "key looks malformed".to_string(),
            ProviderKind::Piper => format!(
                "install `{}` and put .onnx voices in {}",
                config.piper.binary,
                config.piper.models_dir().display()
            ),
        };
        check(kind.label(), ok, &hint);
    }
    Ok(())
}

fn check(name: &str, ok: bool, hint: &str) {
    if ok {
        println!("  [ok]   {name}");
    } else {
        println!("  [--]   {name}: {hint}");
    }
}
