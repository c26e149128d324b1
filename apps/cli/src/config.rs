//! CLI configuration management.
//!
//! The file holds a [`ClientConfig`] as TOML:
//! - Linux: `~/.config/sevenbridges/config.toml`
//! - Windows: `%APPDATA%/sevenbridges/config.toml`
//!
//! `SBG_AUTH_TOKEN` overrides the token stored in the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use sbg_client::ClientConfig;

pub const TOKEN_ENV: &str = "SBG_AUTH_TOKEN";

/// Loads the configuration at `explicit`, or at the platform default.
///
/// A missing default file is created with default values; a missing
/// explicit file is an error.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let mut config = match explicit {
        Some(path) => read(path)?,
        None => {
            let path = config_path()?;
            if path.exists() {
                read(&path)?
            } else {
                let config = ClientConfig::default();
                save(&config, &path)?;
                config
            }
        }
    };
    apply_token_override(&mut config, std::env::var(TOKEN_ENV).ok());
    Ok(config)
}

fn read(path: &Path) -> anyhow::Result<ClientConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: ClientConfig =
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Writes `config` to `path` with owner-only permissions.
pub fn save(config: &ClientConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;

    // The file may hold the auth token.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::debug!(path = %path.display(), "configuration saved");
    Ok(())
}

fn apply_token_override(config: &mut ClientConfig, token: Option<String>) {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        config.token = token;
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("sevenbridges").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("sevenbridges")
            .join("config.toml"))
    }
}
