//! Error types for mxsync wire data.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum TypesError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

/// The standard JSON error body returned by the server on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error code, e.g. `M_FORBIDDEN`.
    #[serde(default)]
    pub errcode: String,
    /// Human-readable message.
    #[serde(default)]
    pub error: String,
}

impl ApiErrorBody {
    /// Parse a response body as a structured error.
    ///
    /// Returns `None` unless the body is JSON with a non-empty `errcode`;
    /// proxies frequently answer with HTML or empty bodies.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .filter(|parsed| !parsed.errcode.is_empty())
    }
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.errcode, self.error)
    }
}

impl std::error::Error for ApiErrorBody {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = ApiErrorBody {
            errcode: "M_FORBIDDEN".into(),
            error: "You are not invited to this room.".into(),
        };
        assert_eq!(
            err.to_string(),
            "M_FORBIDDEN: You are not invited to this room."
        );
    }

    #[test]
    fn parse_requires_errcode() {
        assert!(ApiErrorBody::parse(br#"{"errcode":"M_LIMIT_EXCEEDED","error":"slow"}"#).is_some());
        assert!(ApiErrorBody::parse(br#"{"error":"no code"}"#).is_none());
        assert!(ApiErrorBody::parse(b"<html>502 Bad Gateway</html>").is_none());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
