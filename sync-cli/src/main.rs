//! # mxsync
//!
//! CLI tool that follows an account's event stream.
//!
//! ## Commands
//!
//! - `init`: Write a starter configuration file
//! - `sync`: Run the long-poll loop and print events
//! - `filter`: Create the default filter or show a saved one
//!
//! ## Example
//!
//! ```bash
//! # Create a configuration
//! mxsync init --homeserver https://matrix.example.org --user @bot:example.org --token syt_...
//!
//! # Print every message as it arrives
//! mxsync sync --type m.room.message
//!
//! # Verbose request logging
//! RUST_LOG=mxsync_client=debug mxsync sync
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::sync::SyncOptions;
use commands::{filter, init, sync};

/// CLI tool that follows an account's event stream.
#[derive(Parser, Debug)]
#[command(name = "mxsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Server base URL
        #[arg(long)]
        homeserver: String,

        /// Account to sync for
        #[arg(long)]
        user: String,

        /// Access token for the account
        #[arg(long)]
        token: String,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Run the sync loop and print events
    Sync {
        /// Only print events of this type (repeatable)
        #[arg(long = "type", short = 't')]
        event_types: Vec<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Do not print the initial snapshot
        #[arg(long)]
        skip_initial: bool,
    },

    /// Create the default filter, or show a saved one
    Filter {
        /// Filter id to show instead of creating one
        #[arg(long)]
        show: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Determine config path
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };

    match cli.command {
        Commands::Init {
            homeserver,
            user,
            token,
            force,
        } => {
            init::run(&config_path, &homeserver, &user, &token, force).await?;
        }
        Commands::Sync {
            event_types,
            json,
            skip_initial,
        } => {
            let config = config::load(&config_path)?;
            let options = SyncOptions {
                event_types,
                json,
                skip_initial,
            };
            sync::run(config, options).await?;
        }
        Commands::Filter { show } => {
            let config = config::load(&config_path)?;
            match show {
                Some(filter_id) => filter::show(config, &filter_id).await?,
                None => filter::create(config).await?,
            }
        }
    }

    Ok(())
}
