//! Cursor and filter persistence.
//!
//! The session controller reads and writes the per-account cursor and
//! filter id only through [`Store`]. A missing value is `Ok(None)`; an
//! `Err` means the backend itself failed, which stops the sync loop.

use async_trait::async_trait;
use mxsync_types::{FilterId, NextBatch, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Store backend errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error in a file-backed store.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("store error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Persistence contract for sync progress, keyed by account.
///
/// Implementations must be safe to call from two loops at once (an old
/// generation's last iteration may overlap a new generation's first).
/// Last write wins.
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the last persisted cursor for `user_id`.
    async fn load_next_batch(&self, user_id: &UserId) -> Result<Option<NextBatch>, StoreError>;

    /// Persist the cursor for `user_id`.
    async fn save_next_batch(
        &self,
        user_id: &UserId,
        next_batch: &NextBatch,
    ) -> Result<(), StoreError>;

    /// Load the negotiated filter id for `user_id`.
    async fn load_filter_id(&self, user_id: &UserId) -> Result<Option<FilterId>, StoreError>;

    /// Persist the negotiated filter id for `user_id`.
    async fn save_filter_id(&self, user_id: &UserId, filter_id: &FilterId)
        -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
struct Entry {
    next_batch: Option<NextBatch>,
    filter_id: Option<FilterId>,
}

/// Volatile in-memory [`Store`]. Progress is lost when the process exits.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<UserId, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry<R>(&self, user_id: &UserId, f: impl FnOnce(&mut Entry) -> R) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(entries.entry(user_id.clone()).or_default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_next_batch(&self, user_id: &UserId) -> Result<Option<NextBatch>, StoreError> {
        Ok(self.with_entry(user_id, |entry| entry.next_batch.clone()))
    }

    async fn save_next_batch(
        &self,
        user_id: &UserId,
        next_batch: &NextBatch,
    ) -> Result<(), StoreError> {
        self.with_entry(user_id, |entry| entry.next_batch = Some(next_batch.clone()));
        Ok(())
    }

    async fn load_filter_id(&self, user_id: &UserId) -> Result<Option<FilterId>, StoreError> {
        Ok(self.with_entry(user_id, |entry| entry.filter_id.clone()))
    }

    async fn save_filter_id(
        &self,
        user_id: &UserId,
        filter_id: &FilterId,
    ) -> Result<(), StoreError> {
        self.with_entry(user_id, |entry| entry.filter_id = Some(filter_id.clone()));
        Ok(())
    }
}
