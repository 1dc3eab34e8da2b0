//! Transport abstraction for mxsync.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying HTTP stack (reqwest, mock for testing).
//!
//! # Design
//!
//! A transport performs exactly one raw request/response exchange. It does
//! not interpret status codes: rate limiting, error bodies and JSON decoding
//! are the request executor's job (see [`crate::SyncClient::make_request`]).
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.queue_json(200, &serde_json::json!({"next_batch": "s1"}));
//! let response = transport.send(request).await?;
//! assert_eq!(response.status, 200);
//! ```

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockGate, MockTransport};

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed before a response arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,
}

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Fully built URL, including query parameters.
    pub url: Url,
    /// Bearer token, if the client is authenticated.
    pub access_token: Option<String>,
    /// JSON body. `None` sends no body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Value of the first query parameter named `key`.
    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "REDACTED"))
            .field(
                "body",
                &self.body.as_ref().map(|b| format!("[{} bytes]", b.len())),
            )
            .finish()
    }
}

/// One raw response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Retry-After` header value, if present.
    pub retry_after: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Response with the given status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Response with a JSON body.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// Attach a `Retry-After` header value.
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait for executing one HTTP exchange.
///
/// Implementations handle the underlying connection mechanism
/// (reqwest, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the complete response.
    ///
    /// Any status code, including 4xx and 5xx, is a successful exchange.
    /// Errors are reserved for failures to obtain a response at all.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
