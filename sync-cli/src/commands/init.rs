//! Write a starter configuration file.

use anyhow::Result;
use std::path::Path;

use crate::config;

/// Run the init command.
pub async fn run(
    path: &Path,
    homeserver_url: &str,
    user_id: &str,
    access_token: &str,
    force: bool,
) -> Result<()> {
    // Check if already initialized
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {}. Pass --force to overwrite.",
            path.display()
        );
    }

    let contents = config::template(homeserver_url, user_id, access_token)?;
    config::write(path, &contents).await?;

    println!("Configuration written to {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Review the [sync] section");
    println!("  2. Start following events: mxsync sync");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_creates_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        run(&path, "https://hs.example", "@me:hs", "tok", false).await.unwrap();

        let loaded = config::load(&path).unwrap();
        assert_eq!(loaded.homeserver_url, "https://hs.example");
    }

    #[tokio::test]
    async fn init_fails_if_already_initialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        // First init should succeed
        run(&path, "https://a.example", "@me:a", "t1", false).await.unwrap();

        // Second init should fail
        let result = run(&path, "https://b.example", "@me:b", "t2", false).await;
        assert!(result.is_err());
        assert_eq!(config::load(&path).unwrap().homeserver_url, "https://a.example");

        // Unless forced
        run(&path, "https://b.example", "@me:b", "t2", true).await.unwrap();
        assert_eq!(config::load(&path).unwrap().homeserver_url, "https://b.example");
    }
}
