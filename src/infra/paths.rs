// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the VOXBOOK_HOME environment variable for isolation.
// When VOXBOOK_HOME is set, config, data and cache live under that directory.
// When unset, config uses ~/.voxbook/ and data uses XDG_DATA_HOME/voxbook.

use directories::{BaseDirs, ProjectDirs, UserDirs};
use std::path::PathBuf;

/// Returns the VOXBOOK_HOME override, if set.
fn voxbook_home() -> Option<PathBuf> {
    std::env::var_os("VOXBOOK_HOME").map(PathBuf::from)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "voxbook")
}

/// Home directory (falls back to the current directory on exotic systems).
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $VOXBOOK_HOME/ or ~/.voxbook/
pub fn config_dir() -> PathBuf {
    if let Some(home) = voxbook_home() {
        return home;
    }
    dirs_home().join(".voxbook")
}

/// Data directory: $VOXBOOK_HOME/data/ or ~/.local/share/voxbook/
pub fn data_dir() -> PathBuf {
    if let Some(home) = voxbook_home() {
        return home.join("data");
    }
    project_dirs()
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

/// Cache directory: ~/.voxbook/cache/
pub fn cache_dir() -> PathBuf {
    config_dir().join("cache")
}

/// Voice preview cache
pub fn previews_dir() -> PathBuf {
    cache_dir().join("previews")
}

/// Credentials directory
pub fn credentials_dir() -> PathBuf {
    config_dir().join("credentials")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// The session store document
pub fn sessions_file() -> PathBuf {
    data_dir().join("sessions.json")
}

/// Default Piper voice models location
pub fn piper_models_dir() -> PathBuf {
    data_dir().join("piper")
}

/// Default root for conversion output: ~/Music/voxbook, or data_dir/output
pub fn default_output_root() -> PathBuf {
    if let Some(home) = voxbook_home() {
        return home.join("output");
    }
    UserDirs::new()
        .and_then(|u| u.audio_dir().map(|d| d.join("voxbook")))
        .unwrap_or_else(|| data_dir().join("output"))
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    let dirs = [
        config_dir(),
        credentials_dir(),
        cache_dir(),
        previews_dir(),
        data_dir(),
    ];

    for dir in &dirs {
        tokio::fs::create_dir_all(dir).await?;
    }

    Ok(())
}
