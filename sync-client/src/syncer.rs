//! Snapshot consumers and recovery policy.
//!
//! A [`Syncer`] is handed every snapshot the session controller receives,
//! decides how long to wait after a failed poll, and supplies the filter
//! document negotiated at start-up. [`DefaultSyncer`] routes snapshots
//! through an [`EventRouter`] to registered listeners.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mxsync_core::{
    calculate_backoff, EventRouter, ListenerRegistry, RoomStateCache, RouterError, RouterOptions,
};
use mxsync_types::{FilterDefinition, NextBatch, SyncResponse, UserId};
use serde_json::Value;
use thiserror::Error;

use crate::config::SyncConfig;
use crate::error::ClientError;

/// Timeline length requested by the default filter.
pub const DEFAULT_TIMELINE_LIMIT: u32 = 50;

/// Errors that stop the sync loop.
#[derive(Debug, Error)]
pub enum SyncerError {
    /// The snapshot was malformed.
    #[error("routing failed: {0}")]
    Router(#[from] RouterError),

    /// The access token was rejected; retrying cannot help.
    #[error("access token rejected ({errcode})")]
    InvalidToken {
        /// Error code sent by the server.
        errcode: String,
    },

    /// Too many polls failed in a row.
    #[error("{failures} consecutive sync failures, last: {last_error}")]
    TooManyFailures {
        /// Number of consecutive failures.
        failures: u32,
        /// Rendered last error.
        last_error: String,
    },

    /// The filter document could not be encoded.
    #[error("filter encoding failed: {0}")]
    Filter(#[source] serde_json::Error),

    /// Custom syncer failure.
    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Consumer of snapshots and owner of the failure policy.
#[async_trait]
pub trait Syncer: Send + Sync {
    /// Handle one snapshot. `since` is the cursor it was requested with.
    ///
    /// An error is fatal to the loop. The snapshot's cursor has already been
    /// persisted when this is called.
    async fn process_response(
        &self,
        response: &SyncResponse,
        since: Option<&NextBatch>,
    ) -> Result<(), SyncerError>;

    /// Decide what to do after a failed poll: wait and retry, or stop.
    ///
    /// The raw body of a partial response, if any, is available through
    /// [`ClientError::response_body`].
    fn on_failed_sync(&self, error: &ClientError) -> Result<Duration, SyncerError>;

    /// The filter document to create for `user_id`.
    fn filter_json(&self, user_id: &UserId) -> Result<Value, SyncerError>;
}

/// Error codes that mean the credentials are no longer valid.
const FATAL_ERRCODES: &[&str] = &["M_UNKNOWN_TOKEN", "M_MISSING_TOKEN"];

/// Routes snapshots to listeners and backs off exponentially on failure.
#[derive(Debug)]
pub struct DefaultSyncer {
    router: EventRouter,
    filter: FilterDefinition,
    failures: AtomicU32,
    retry_backoff: Duration,
    max_backoff: Duration,
    max_consecutive_failures: Option<u32>,
}

impl DefaultSyncer {
    /// Syncer for `user_id` with default options.
    pub fn new(user_id: UserId) -> Self {
        Self::from_config(user_id, &SyncConfig::default())
    }

    /// Syncer configured from the `[sync]` section.
    pub fn from_config(user_id: UserId, config: &SyncConfig) -> Self {
        let options = RouterOptions {
            skip_initial_sync: config.skip_initial_sync,
            skip_rejoined_rooms: config.skip_rejoined_rooms,
        };
        Self {
            router: EventRouter::with_options(user_id, options),
            filter: FilterDefinition::with_timeline_limit(DEFAULT_TIMELINE_LIMIT),
            failures: AtomicU32::new(0),
            retry_backoff: config.retry_backoff(),
            max_backoff: config.max_backoff(),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }

    /// Set the failure delay base and cap.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.retry_backoff = base;
        self.max_backoff = max;
        self
    }

    /// Give up after `max` consecutive failures.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = Some(max);
        self
    }

    /// Replace the filter document.
    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filter = filter;
        self
    }

    /// The listener registry snapshots are dispatched to.
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        self.router.listeners()
    }

    /// Handle to the per-room state cache.
    pub fn rooms(&self) -> RoomStateCache {
        self.router.rooms()
    }

    /// The underlying router.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Consecutive failed polls since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Syncer for DefaultSyncer {
    async fn process_response(
        &self,
        response: &SyncResponse,
        since: Option<&NextBatch>,
    ) -> Result<(), SyncerError> {
        self.failures.store(0, Ordering::SeqCst);

        let report = self.router.route(response, since)?;
        if report.skipped_initial {
            tracing::debug!(next_batch = %response.next_batch, "skipped initial sync");
        } else {
            tracing::debug!(
                next_batch = %response.next_batch,
                events = report.dispatched,
                listener_failures = report.failures.len(),
                "dispatched snapshot"
            );
        }
        Ok(())
    }

    fn on_failed_sync(&self, error: &ClientError) -> Result<Duration, SyncerError> {
        if let Some(errcode) = error.errcode().filter(|code| FATAL_ERRCODES.contains(code)) {
            return Err(SyncerError::InvalidToken {
                errcode: errcode.to_string(),
            });
        }

        let failures = self.failures.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if let Some(max) = self.max_consecutive_failures {
            if failures >= max {
                return Err(SyncerError::TooManyFailures {
                    failures,
                    last_error: error.to_string(),
                });
            }
        }

        Ok(calculate_backoff(failures, self.retry_backoff, self.max_backoff))
    }

    fn filter_json(&self, _user_id: &UserId) -> Result<Value, SyncerError> {
        serde_json::to_value(&self.filter).map_err(SyncerError::Filter)
    }
}
