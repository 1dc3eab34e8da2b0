//! Configuration file management for the CLI.

use anyhow::{Context, Result};
use mxsync_client::ClientConfig;
use std::path::{Path, PathBuf};

/// File name of the client configuration inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Get the default configuration file path.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "mxsync", "mxsync")
        .context("Could not determine home directory")?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}

/// Load and validate the client configuration.
pub fn load(path: &Path) -> Result<ClientConfig> {
    let config = ClientConfig::from_file(path)
        .with_context(|| format!("Run 'mxsync init' to create {}", path.display()))?;
    if config.user_id.is_none() || config.access_token.is_none() {
        anyhow::bail!(
            "{} must set both user_id and access_token",
            path.display()
        );
    }
    Ok(config)
}

/// Render a starter configuration file with every section at its default.
pub fn template(homeserver_url: &str, user_id: &str, access_token: &str) -> Result<String> {
    let config = ClientConfig::new(homeserver_url).with_credentials(user_id, access_token);
    config.to_toml().context("Failed to render configuration")
}

/// Write `contents` to `path`, creating parent directories.
pub async fn write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create config directory")?;
    }
    tokio::fs::write(path, contents)
        .await
        .context("Failed to write configuration")?;
    set_file_permissions_0600(path).await
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// The file holds an access token.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
