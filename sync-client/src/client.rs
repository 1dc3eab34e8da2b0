//! SyncClient - the main interface for mxsync.
//!
//! This module provides [`SyncClient`], which executes requests against the
//! server and runs the long-poll sync loop.
//!
//! # Architecture
//!
//! ```text
//! Application → SyncClient → Transport → Network
//!                   ↓   ↓
//!               Store   Syncer → EventRouter → listeners
//! ```
//!
//! Exactly one sync loop is authoritative at a time. [`SyncClient::sync`]
//! claims a new generation; [`SyncClient::stop_sync`] or a later `sync` call
//! invalidates it, and the old loop notices once its in-flight poll returns.
//! The new cursor is persisted before the snapshot is dispatched, so each
//! event is delivered at most once.
//!
//! # Example
//!
//! ```ignore
//! use mxsync_client::{ClientConfig, DefaultSyncer, SyncClient};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::from_file(path)?;
//! let syncer = Arc::new(DefaultSyncer::from_config(user_id, &config.sync));
//! syncer.listeners().on_event_type("m.room.message", |room, event| {
//!     println!("{:?}: {:?}", room, event.content);
//!     Ok(())
//! });
//!
//! let client = SyncClient::from_config(config)?.with_syncer(syncer);
//! client.sync().await?;
//! ```

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mxsync_core::SyncGeneration;
use mxsync_types::{
    CreateFilterResponse, FilterDefinition, FilterId, NextBatch, SyncResponse, UserId,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, HttpError};
use crate::store::{MemoryStore, Store};
use crate::syncer::{DefaultSyncer, Syncer};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};

/// Status code of a rate-limited response.
const TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Clone, Default)]
struct Credentials {
    user_id: Option<UserId>,
    access_token: Option<String>,
}

/// The main sync client.
///
/// Manages credentials, request execution and the sync loop.
pub struct SyncClient<T: Transport> {
    homeserver: Url,
    config: ClientConfig,
    transport: T,
    credentials: RwLock<Credentials>,
    store: Arc<dyn Store>,
    syncer: Arc<dyn Syncer>,
    generation: SyncGeneration,
}

impl<T: Transport> std::fmt::Debug for SyncClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("homeserver", &self.homeserver.as_str())
            .field("user_id", &self.user_id())
            .finish_non_exhaustive()
    }
}

impl SyncClient<HttpTransport> {
    /// Create a client that talks HTTP, configured from `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config.http)?;
        Self::new(config, transport)
    }
}

impl<T: Transport> SyncClient<T> {
    /// Create a new SyncClient with an in-memory store and a
    /// [`DefaultSyncer`].
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, ClientError> {
        let homeserver = Url::parse(&config.homeserver_url)?;
        if homeserver.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.homeserver_url.clone()));
        }

        let credentials = Credentials {
            user_id: config.user_id.clone(),
            access_token: config.access_token.clone(),
        };
        let syncer_user = config.user_id.clone().unwrap_or_else(|| UserId::new(""));
        let syncer = Arc::new(DefaultSyncer::from_config(syncer_user, &config.sync));

        Ok(Self {
            homeserver,
            config,
            transport,
            credentials: RwLock::new(credentials),
            store: Arc::new(MemoryStore::new()),
            syncer,
            generation: SyncGeneration::new(),
        })
    }

    /// Use `store` for cursor and filter persistence.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    /// Use `syncer` to consume snapshots.
    pub fn with_syncer(mut self, syncer: Arc<dyn Syncer>) -> Self {
        self.syncer = syncer;
        self
    }

    // ===========================================
    // Credentials
    // ===========================================

    /// Set the account and access token used for subsequent requests.
    pub fn set_credentials(&self, user_id: UserId, access_token: impl Into<String>) {
        let mut credentials = self.credentials.write().unwrap_or_else(PoisonError::into_inner);
        credentials.user_id = Some(user_id);
        credentials.access_token = Some(access_token.into());
    }

    /// Forget the account and access token.
    pub fn clear_credentials(&self) {
        let mut credentials = self.credentials.write().unwrap_or_else(PoisonError::into_inner);
        *credentials = Credentials::default();
    }

    /// The account this client acts for.
    pub fn user_id(&self) -> Option<UserId> {
        let credentials = self.credentials.read().unwrap_or_else(PoisonError::into_inner);
        credentials.user_id.clone()
    }

    fn access_token(&self) -> Option<String> {
        let credentials = self.credentials.read().unwrap_or_else(PoisonError::into_inner);
        credentials.access_token.clone()
    }

    // ===========================================
    // Request execution
    // ===========================================

    /// Build an API URL from path segments. Segments are percent-encoded.
    pub fn build_url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        self.build_url_with_query(segments, &[])
    }

    /// Build an API URL with query parameters.
    ///
    /// Application-service clients also get the masqueraded `user_id`.
    pub fn build_url_with_query(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url, ClientError> {
        let mut url = self.homeserver.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.homeserver.to_string()))?
            .pop_if_empty()
            .extend(self.config.prefix.split('/').filter(|s| !s.is_empty()))
            .extend(segments);

        let as_user = self.config.app_service_user_id.as_ref();
        if !query.is_empty() || as_user.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if let Some(user_id) = as_user {
                pairs.append_pair("user_id", user_id.as_str());
            }
        }
        Ok(url)
    }

    /// Execute one JSON request and decode the response body.
    ///
    /// Rate-limited responses are retried after the server's `Retry-After`
    /// delay, up to the configured retry budget. Other non-2xx responses
    /// become [`ClientError::Http`].
    pub async fn make_request<R: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<R, ClientError> {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(ClientError::Serialization)?;

        let limits = &self.config.rate_limit;
        let mut retries = 0;
        loop {
            let request = HttpRequest {
                method,
                url: url.clone(),
                access_token: self.access_token(),
                body: body.clone(),
            };
            tracing::debug!(%method, path = url.path(), "sending request");
            let response = self.transport.send(request).await?;

            if response.status == TOO_MANY_REQUESTS {
                if retries >= limits.max_retries {
                    tracing::warn!(
                        %method,
                        path = url.path(),
                        retries,
                        "giving up on rate-limited request"
                    );
                    return Err(ClientError::RateLimited { retries });
                }
                let wait = parse_retry_after(
                    response.retry_after.as_deref(),
                    limits.default_retry_after(),
                )?;
                retries += 1;
                tracing::warn!(
                    %method,
                    path = url.path(),
                    ?wait,
                    attempt = retries,
                    "rate limited, retrying"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !response.is_success() {
                return Err(http_error(method, &url, response).into());
            }

            return match serde_json::from_slice(&response.body) {
                Ok(decoded) => Ok(decoded),
                Err(source) => Err(ClientError::Decode {
                    source,
                    body: response.body,
                }),
            };
        }
    }

    // ===========================================
    // Endpoints
    // ===========================================

    /// Save `filter` on the server for the current user.
    pub async fn create_filter(&self, filter: &Value) -> Result<CreateFilterResponse, ClientError> {
        let user_id = self.user_id().ok_or(ClientError::MissingUserId)?;
        let url = self.build_url(&["user", user_id.as_str(), "filter"])?;
        self.make_request(Method::Post, url, Some(filter)).await
    }

    /// Fetch a previously saved filter.
    pub async fn get_filter(&self, filter_id: &FilterId) -> Result<FilterDefinition, ClientError> {
        let user_id = self.user_id().ok_or(ClientError::MissingUserId)?;
        let url = self.build_url(&["user", user_id.as_str(), "filter", filter_id.as_str()])?;
        self.make_request(Method::Get, url, None).await
    }

    /// Perform one long-poll.
    ///
    /// `since` is omitted on the first call; `full_state` is only sent when true.
    pub async fn sync_request(
        &self,
        timeout_ms: u64,
        since: Option<&NextBatch>,
        filter_id: Option<&FilterId>,
        full_state: bool,
        set_presence: Option<&str>,
    ) -> Result<SyncResponse, ClientError> {
        let timeout = timeout_ms.to_string();
        let mut query = vec![("timeout", timeout.as_str())];
        if let Some(since) = since {
            query.push(("since", since.as_str()));
        }
        if let Some(filter_id) = filter_id {
            query.push(("filter", filter_id.as_str()));
        }
        if full_state {
            query.push(("full_state", "true"));
        }
        if let Some(presence) = set_presence {
            query.push(("set_presence", presence));
        }

        let url = self.build_url_with_query(&["sync"], &query)?;
        self.make_request(Method::Get, url, None).await
    }

    // ===========================================
    // Sync loop
    // ===========================================

    /// Run the sync loop until it is stopped, superseded or fails.
    ///
    /// Returns `Ok(())` after [`stop_sync`](Self::stop_sync) or a newer
    /// `sync` call took over. Returns an error when filter negotiation fails,
    /// the store fails, or the syncer gives up; call `sync` again to resume
    /// from the last persisted cursor.
    pub async fn sync(&self) -> Result<(), ClientError> {
        let generation = self.generation.begin();
        let user_id = self.user_id().ok_or(ClientError::MissingUserId)?;

        let mut next_batch = self.store.load_next_batch(&user_id).await?;
        let filter_id = match self.store.load_filter_id(&user_id).await? {
            Some(filter_id) => filter_id,
            None => self.negotiate_filter(&user_id).await?,
        };

        tracing::info!(
            user_id = %user_id,
            generation,
            since = next_batch.as_ref().map(NextBatch::as_str),
            "sync loop started"
        );

        let params = &self.config.sync;
        loop {
            tracing::debug!(
                generation,
                since = next_batch.as_ref().map(NextBatch::as_str),
                "polling"
            );
            let result = self
                .sync_request(
                    params.timeout_ms,
                    next_batch.as_ref(),
                    Some(&filter_id),
                    params.full_state,
                    params.set_presence.as_deref(),
                )
                .await;

            let response = match result {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(generation, "sync failed: {}", error);
                    let wait = self.syncer.on_failed_sync(&error).map_err(|e| {
                        tracing::error!(generation, "sync loop stopped: {}", e);
                        e
                    })?;
                    tokio::time::sleep(wait).await;
                    if !self.generation.is_current(generation) {
                        tracing::info!(generation, "sync loop superseded");
                        return Ok(());
                    }
                    continue;
                }
            };

            if !self.generation.is_current(generation) {
                tracing::info!(generation, "sync loop superseded, discarding snapshot");
                return Ok(());
            }

            self.store.save_next_batch(&user_id, &response.next_batch).await?;

            if let Err(e) = self.syncer.process_response(&response, next_batch.as_ref()).await {
                tracing::error!(
                    generation,
                    next_batch = %response.next_batch,
                    "sync loop stopped: {}",
                    e
                );
                return Err(e.into());
            }

            next_batch = Some(response.next_batch);
        }
    }

    /// Stop the current sync loop.
    ///
    /// Does not wait: the loop exits when its in-flight poll returns, and
    /// that poll's snapshot is discarded.
    pub fn stop_sync(&self) {
        self.generation.stop();
        tracing::info!("sync stop requested");
    }

    async fn negotiate_filter(&self, user_id: &UserId) -> Result<FilterId, ClientError> {
        let filter = self.syncer.filter_json(user_id)?;
        let created = self
            .create_filter(&filter)
            .await
            .map_err(|e| ClientError::FilterNegotiation(e.to_string()))?;
        if created.filter_id.is_empty() {
            return Err(ClientError::FilterNegotiation("server returned an empty filter id".into()));
        }

        self.store.save_filter_id(user_id, &created.filter_id).await?;
        tracing::info!(user_id = %user_id, filter_id = %created.filter_id, "created filter");
        Ok(created.filter_id)
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The store in use.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The syncer in use.
    pub fn syncer(&self) -> &Arc<dyn Syncer> {
        &self.syncer
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Classify a non-2xx, non-429 response.
fn http_error(method: Method, url: &Url, response: HttpResponse) -> HttpError {
    let api = mxsync_types::ApiErrorBody::parse(&response.body);
    let mut message = format!("failed to {} {}", method, url.path());
    match &api {
        Some(api) => {
            message.push_str(": ");
            message.push_str(&api.to_string());
        }
        None if !response.body.is_empty() => {
            message.push_str(": ");
            message.push_str(&String::from_utf8_lossy(&response.body));
        }
        None => {}
    }

    HttpError {
        status: response.status,
        contents: response.body,
        message,
        api,
    }
}

/// Parse a `Retry-After` value: an HTTP date, else whole seconds.
///
/// A missing header yields `default`. A date in the past yields zero.
fn parse_retry_after(value: Option<&str>, default: Duration) -> Result<Duration, ClientError> {
    let Some(value) = value.map(str::trim) else {
        return Ok(default);
    };

    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        let remaining = date.with_timezone(&Utc) - Utc::now();
        return Ok(remaining.to_std().unwrap_or(Duration::ZERO));
    }

    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ClientError::InvalidRetryAfter(value.to_string()))
}
