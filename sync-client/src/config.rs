//! Configuration loading for the sync client.
//!
//! Configuration is loaded from a TOML file. Only `homeserver_url` is
//! required; every section falls back to its defaults when absent.
//!
//! ```toml
//! homeserver_url = "https://matrix.example.org"
//! user_id = "@bot:example.org"
//! access_token = "syt_..."
//!
//! [sync]
//! timeout_ms = 30000
//! set_presence = "offline"
//!
//! [rate_limit]
//! max_retries = 5
//! ```

use mxsync_types::UserId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for a [`crate::SyncClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the server, e.g. `https://matrix.example.org`.
    pub homeserver_url: String,
    /// Account to sync for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Access token sent as a bearer credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// API path prefix (default: `/_matrix/client/v3`).
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// User to masquerade as when authenticating as an application service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_service_user_id: Option<UserId>,
    /// Long-poll loop configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Rate limit handling.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// HTTP client configuration.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Long-poll loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Server-side wait for each long-poll, in milliseconds (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Request the full room state on every poll (default: false).
    #[serde(default)]
    pub full_state: bool,
    /// Presence to set while polling (`online`, `offline`, `unavailable`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_presence: Option<String>,
    /// Do not dispatch the initial snapshot (default: false).
    #[serde(default)]
    pub skip_initial_sync: bool,
    /// Do not dispatch rooms the user has just (re)joined (default: false).
    #[serde(default)]
    pub skip_rejoined_rooms: bool,
    /// Delay after the first failed poll, in seconds (default: 10).
    /// Doubles with each consecutive failure.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// Upper bound on the failure delay, in seconds (default: 300).
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Give up after this many consecutive failed polls (default: never).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<u32>,
}

/// Rate limit handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// How many times a rate-limited request is retried (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wait used when the server sends no `Retry-After`, in seconds (default: 5).
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// TCP/TLS connect timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Overall request timeout in seconds (default: none).
    /// Must exceed the long-poll timeout if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

// Default value functions
fn default_prefix() -> String {
    "/_matrix/client/v3".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_backoff_secs() -> u64 {
    10
}

fn default_max_backoff_secs() -> u64 {
    300 // 5 minutes
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_after_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            full_state: false,
            set_presence: None,
            skip_initial_sync: false,
            skip_rejoined_rooms: false,
            retry_backoff_secs: default_retry_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            max_consecutive_failures: None,
        }
    }
}

impl SyncConfig {
    /// Failure delay base as a [`Duration`].
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    /// Failure delay cap as a [`Duration`].
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            default_retry_after_secs: default_retry_after_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Fallback wait as a [`Duration`].
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Configuration for `homeserver_url` with every other value defaulted.
    pub fn new(homeserver_url: impl Into<String>) -> Self {
        Self {
            homeserver_url: homeserver_url.into(),
            user_id: None,
            access_token: None,
            prefix: default_prefix(),
            app_service_user_id: None,
            sync: SyncConfig::default(),
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
        }
    }

    /// Set the account and its access token.
    pub fn with_credentials(
        mut self,
        user_id: impl Into<UserId>,
        access_token: impl Into<String>,
    ) -> Self {
        self.user_id = Some(user_id.into());
        self.access_token = Some(access_token.into());
        self
    }

    /// Set the API path prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Masquerade as `user_id` (application services only).
    pub fn with_app_service_user_id(mut self, user_id: impl Into<UserId>) -> Self {
        self.app_service_user_id = Some(user_id.into());
        self
    }

    /// Replace the `[sync]` section.
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Set the 429 retry budget.
    pub fn with_max_rate_limit_retries(mut self, max_retries: u32) -> Self {
        self.rate_limit.max_retries = max_retries;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Render the configuration as TOML that [`from_file`](Self::from_file) reads back.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to render configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::new("https://hs.example");
        assert_eq!(config.prefix, "/_matrix/client/v3");
        assert_eq!(config.sync.timeout_ms, 30_000);
        assert!(!config.sync.full_state);
        assert_eq!(config.rate_limit.max_retries, 5);
        assert_eq!(config.rate_limit.default_retry_after(), Duration::from_secs(5));
        assert_eq!(config.http.request_timeout_secs, None);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
homeserver_url = "https://matrix.example.org"
user_id = "@bot:example.org"
access_token = "secret"

[sync]
timeout_ms = 10000
set_presence = "offline"
skip_initial_sync = true
max_consecutive_failures = 3

[rate_limit]
max_retries = 2

[http]
request_timeout_secs = 60
"#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.homeserver_url, "https://matrix.example.org");
        assert_eq!(config.user_id, Some(UserId::from("@bot:example.org")));
        assert_eq!(config.access_token.as_deref(), Some("secret"));
        assert_eq!(config.sync.timeout_ms, 10_000);
        assert_eq!(config.sync.set_presence.as_deref(), Some("offline"));
        assert!(config.sync.skip_initial_sync);
        assert_eq!(config.sync.max_consecutive_failures, Some(3));
        assert_eq!(config.rate_limit.max_retries, 2);
        assert_eq!(config.http.request_timeout_secs, Some(60));
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: ClientConfig =
            toml::from_str(r#"homeserver_url = "http://localhost""#).unwrap();
        assert_eq!(config.sync.retry_backoff(), Duration::from_secs(10));
        assert_eq!(config.sync.max_backoff(), Duration::from_secs(300));
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert!(config.user_id.is_none());
    }

    #[test]
    fn config_requires_homeserver() {
        let result = toml::from_str::<ClientConfig>("[sync]\ntimeout_ms = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn builder_methods() {
        let config = ClientConfig::new("https://hs.example")
            .with_credentials("@me:hs", "tok")
            .with_prefix("/_matrix/client/r0")
            .with_app_service_user_id("@puppet:hs")
            .with_max_rate_limit_retries(0);

        assert_eq!(config.user_id, Some(UserId::from("@me:hs")));
        assert_eq!(config.prefix, "/_matrix/client/r0");
        assert_eq!(config.app_service_user_id, Some(UserId::from("@puppet:hs")));
        assert_eq!(config.rate_limit.max_retries, 0);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"homeserver_url = "https://hs.example""#).unwrap();
        writeln!(file, "[sync]\nfull_state = true").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.homeserver_url, "https://hs.example");
        assert!(config.sync.full_state);
    }

    #[test]
    fn to_toml_round_trips_awkward_strings() {
        let config = ClientConfig::new("https://hs.example/\"path\"")
            .with_credentials("@me:hs", r#"syt_a"b\c"#);

        let rendered = config.to_toml().unwrap();
        let back: ClientConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(back.homeserver_url, config.homeserver_url);
        assert_eq!(back.access_token.as_deref(), Some(r#"syt_a"b\c"#));
        assert!(back.app_service_user_id.is_none());
        assert_eq!(back.sync.max_backoff_secs, 300);
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn from_file_invalid_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "homeserver_url = ").unwrap();

        let result = ClientConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
