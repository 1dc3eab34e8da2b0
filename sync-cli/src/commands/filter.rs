//! Create or inspect server-side filters.

use anyhow::{Context, Result};
use mxsync_client::{ClientConfig, DefaultSyncer, SyncClient, Syncer};
use mxsync_types::FilterId;

/// Create the default filter and print its id.
pub async fn create(config: ClientConfig) -> Result<()> {
    let user_id = config.user_id.clone().context("Configuration has no user_id")?;
    let syncer = DefaultSyncer::from_config(user_id.clone(), &config.sync);
    let client = SyncClient::from_config(config)?;

    let filter = syncer.filter_json(&user_id)?;
    let created = client.create_filter(&filter).await?;

    println!("{}", created.filter_id);
    Ok(())
}

/// Print a saved filter as JSON.
pub async fn show(config: ClientConfig, filter_id: &str) -> Result<()> {
    let client = SyncClient::from_config(config)?;
    let filter = client.get_filter(&FilterId::from(filter_id)).await?;

    println!("{}", serde_json::to_string_pretty(&filter)?);
    Ok(())
}
