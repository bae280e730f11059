// src/main.rs — voxbook entry point

use clap::Parser;

use voxbook::cli::{self, Cli, Commands};
use voxbook::infra::config::Config;
use voxbook::infra::errors::VoxbookError;
use voxbook::infra::{logger, paths};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG overrides either level
    logger::init_logging(if cli.verbose { "info" } else { "warn" });

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        let code = e
            .downcast_ref::<VoxbookError>()
            .map(VoxbookError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    paths::ensure_dirs().await?;

    match cli.command {
        Commands::Convert(args) => cli::convert::run_convert(args, &config).await,
        Commands::Resume { id, quiet } => cli::resume::run_resume(&id, quiet, &config).await,
        Commands::Assemble { id } => cli::resume::run_assemble(&id, &config).await,
        Commands::Analyze {
            file,
            chunk_size,
            provider,
            tier,
        } => cli::convert::run_analyze(&file, chunk_size, provider, tier, &config).await,
        Commands::Sessions { action } => cli::sessions::run_sessions(action).await,
        Commands::Voices { provider, preview } => {
            cli::voices::run_voices(provider, &preview, &config).await
        }
        Commands::Doctor => cli::doctor::run_doctor(&config).await,
    }
}
