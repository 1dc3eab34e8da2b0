//! reqwest-backed transport.

use super::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use std::time::Duration;

/// Transport that talks to a real server over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from the `[http]` configuration section.
    ///
    /// The long-poll itself is bounded by the server-side timeout, so an
    /// overall request timeout is only applied when configured explicitly.
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::ConnectionFailed(error.to_string())
    } else {
        TransportError::SendFailed(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &request.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::ReceiveFailed(e.to_string())
            }
        })?;

        Ok(HttpResponse {
            status,
            retry_after,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(&HttpConfig::default()).unwrap()
    }

    fn request(method: Method, url: String) -> HttpRequest {
        HttpRequest {
            method,
            url: url.parse().unwrap(),
            access_token: None,
            body: None,
        }
    }

    #[tokio::test]
    async fn sends_bearer_token_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/sync"))
            .and(query_param("since", "s1"))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"next_batch": "s2"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(
            Method::Get,
            format!("{}/_matrix/client/v3/sync?since=s1", server.uri()),
        );
        req.access_token = Some("tok".into());

        let response = transport().send(req).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&response.body).unwrap(),
            json!({"next_batch": "s2"})
        );
    }

    #[tokio::test]
    async fn posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/filter"))
            .and(body_json(json!({"room": {"timeline": {"limit": 50}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"filter_id": "f1"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(Method::Post, format!("{}/filter", server.uri()));
        req.body = Some(br#"{"room":{"timeline":{"limit":50}}}"#.to_vec());

        let response = transport().send(req).await.unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn error_status_is_not_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "7")
                    .set_body_json(json!({"errcode": "M_LIMIT_EXCEEDED", "error": "slow down"})),
            )
            .mount(&server)
            .await;

        let response = transport()
            .send(request(Method::Get, format!("{}/x", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status, 429);
        assert_eq!(response.retry_after.as_deref(), Some("7"));
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_failure() {
        // Bind then drop a listener so the port is (very likely) closed.
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };

        let result = transport()
            .send(request(Method::Get, format!("{}/x", uri)))
            .await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
