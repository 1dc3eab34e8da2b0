//! Client error taxonomy.

use crate::store::StoreError;
use crate::syncer::SyncerError;
use crate::transport::TransportError;
use mxsync_types::ApiErrorBody;
use thiserror::Error;

/// A non-2xx response other than 429.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("HTTP {status}: {message}")]
pub struct HttpError {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub contents: Vec<u8>,
    /// Human-readable summary. Carries the raw body text when it was not a
    /// structured error.
    pub message: String,
    /// The structured error body, when the server sent one.
    #[source]
    pub api: Option<ApiErrorBody>,
}

impl HttpError {
    /// The structured error code, e.g. `M_FORBIDDEN`.
    pub fn errcode(&self) -> Option<&str> {
        self.api.as_ref().map(|api| api.errcode.as_str())
    }
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with an error status.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Still rate limited after the configured number of retries.
    #[error("rate limited after {retries} retries")]
    RateLimited {
        /// Retries performed before giving up.
        retries: u32,
    },

    /// A `Retry-After` header was neither an HTTP date nor a number of seconds.
    #[error("invalid retry-after data: {0:?}")]
    InvalidRetryAfter(String),

    /// A 2xx body did not decode into the expected type.
    #[error("failed to decode response: {source}")]
    Decode {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// Raw response body.
        body: Vec<u8>,
    },

    /// A request body could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// No user id is set, so there is nothing to sync for.
    #[error("no user id set")]
    MissingUserId,

    /// Creating the server-side filter failed; the loop never started.
    #[error("filter negotiation failed: {0}")]
    FilterNegotiation(String),

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The syncer gave up (fatal recovery decision or dispatch failure).
    #[error("syncer error: {0}")]
    Syncer(#[from] SyncerError),
}

impl ClientError {
    /// Raw body of the response that caused this error, if there was one.
    ///
    /// This is the partial response handed to the recovery hook.
    pub fn response_body(&self) -> Option<&[u8]> {
        match self {
            ClientError::Http(http) => Some(&http.contents),
            ClientError::Decode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Structured error code of an API error.
    pub fn errcode(&self) -> Option<&str> {
        match self {
            ClientError::Http(http) => http.errcode(),
            _ => None,
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http(http) => Some(http.status),
            _ => None,
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(error: url::ParseError) -> Self {
        ClientError::InvalidUrl(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(api: Option<ApiErrorBody>) -> ClientError {
        ClientError::Http(HttpError {
            status: 403,
            contents: b"{}".to_vec(),
            message: "failed to GET /x".into(),
            api,
        })
    }

    #[test]
    fn http_error_exposes_body_and_code() {
        let err = http(Some(ApiErrorBody {
            errcode: "M_FORBIDDEN".into(),
            error: "no".into(),
        }));

        assert_eq!(err.response_body(), Some(&b"{}"[..]));
        assert_eq!(err.errcode(), Some("M_FORBIDDEN"));
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "HTTP 403: failed to GET /x");
    }

    #[test]
    fn api_body_is_the_error_source() {
        use std::error::Error;

        let err = http(Some(ApiErrorBody {
            errcode: "M_FORBIDDEN".into(),
            error: "no".into(),
        }));
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("M_FORBIDDEN: no"));
        assert!(http(None).source().is_none());
    }

    #[test]
    fn transport_error_has_no_body() {
        let err = ClientError::from(TransportError::Timeout);
        assert_eq!(err.response_body(), None);
        assert_eq!(err.errcode(), None);
    }

    #[test]
    fn decode_error_keeps_body() {
        let source = serde_json::from_slice::<u8>(b"nope").unwrap_err();
        let err = ClientError::Decode {
            source,
            body: b"nope".to_vec(),
        };
        assert_eq!(err.response_body(), Some(&b"nope"[..]));
    }
}
