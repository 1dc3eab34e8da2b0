//! # sync-client
//!
//! Client library for long-poll event synchronization.
//!
//! This is the main library that applications use to follow an account's
//! event stream.
//!
//! ## Features
//!
//! - **Single active loop**: starting or stopping sync supersedes any loop
//!   still running, without blocking on its in-flight poll
//! - **At-most-once delivery**: cursors are persisted before dispatch
//! - **Bounded rate-limit handling**: `Retry-After` is honoured with a retry cap
//! - **Transport Abstraction**: Pluggable transport layer (reqwest, mock)
//! - **Pluggable persistence and consumers** via [`Store`] and [`Syncer`]
//!
//! ## Example
//!
//! ```ignore
//! use mxsync_client::{ClientConfig, SyncClient};
//!
//! let config = ClientConfig::new("https://matrix.example.org")
//!     .with_credentials("@bot:example.org", token);
//! let client = SyncClient::from_config(config)?;
//!
//! // Runs until stop_sync() is called or a fatal error occurs
//! client.sync().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod store;
pub mod syncer;
pub mod transport;

pub use client::SyncClient;
pub use config::{ClientConfig, ConfigError, HttpConfig, RateLimitConfig, SyncConfig};
pub use error::{ClientError, HttpError};
pub use store::{MemoryStore, Store, StoreError};
pub use syncer::{DefaultSyncer, Syncer, SyncerError, DEFAULT_TIMELINE_LIMIT};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, MockGate, MockTransport, Transport,
    TransportError,
};
