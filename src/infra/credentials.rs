// src/infra/credentials.rs — Credential resolution for hosted backends
//
// Resolution order: environment variable > saved key file > interactive prompt.
// Saved keys live in ~/.voxbook/credentials/{provider}.key (chmod 600).

use std::io::IsTerminal;
use std::path::Path;

use crate::infra::errors::VoxbookError;
use crate::infra::paths;

/// Environment variable consulted first for a provider's API key.
pub fn env_var_for(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

/// Resolve a usable credential for `provider`, prompting when interactive.
pub async fn ensure_credential(provider: &str) -> Result<String, VoxbookError> {
    if let Some(key) = resolve_non_interactive(provider).await {
        return Ok(key);
    }

    if !std::io::stdin().is_terminal() {
        return Err(VoxbookError::MissingCredential(provider.into()));
    }

    let key = inquire::Password::new(&format!("API key for {provider}:"))
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .map_err(|_| VoxbookError::MissingCredential(provider.into()))?;
    let key = key.trim().to_string();

    if !is_well_formed(provider, &key) {
        return Err(VoxbookError::Validation(format!(
            "'{provider}' key does not look like a valid API key"
        )));
    }

    save_credential(&paths::credentials_dir(), provider, &key).await?;
    tracing::info!("Saved credential for {provider}");
    Ok(key)
}

/// Environment first, then the saved key file. Never prompts.
pub async fn resolve_non_interactive(provider: &str) -> Option<String> {
    if let Some(var) = env_var_for(provider) {
        if let Ok(key) = std::env::var(var) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Some(key);
            }
        }
    }
    load_credential(&paths::credentials_dir(), provider).await
}

/// Shape check only; says nothing about whether the remote side accepts it.
pub fn is_well_formed(provider: &str, key: &str) -> bool {
    match provider {
        "openai" => key.starts_with("sk-") && key.len() >= 20 && !key.contains(char::is_whitespace),
        _ => !key.is_empty(),
    }
}

/// Save an API key for a provider. File is chmod 600, directory is chmod 700.
pub async fn save_credential(dir: &Path, provider: &str, key: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, Permissions::from_mode(0o700)).await?;
    }

    let key_path = dir.join(format!("{provider}.key"));
    tokio::fs::write(&key_path, key).await?;

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&key_path, Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

/// Load a saved credential for a provider.
pub async fn load_credential(dir: &Path, provider: &str) -> Option<String> {
    let key_path = dir.join(format!("{provider}.key"));
    tokio::fs::read_to_string(&key_path)
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
