//! Mock transport for testing.
//!
//! Allows queueing responses and capturing sent requests for verification.
//! Gated responses stay "in flight" until the test releases them, which is
//! how stop/supersede races are reproduced deterministically.

use super::{HttpRequest, HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Mock transport for testing.
///
/// Allows queueing responses and capturing sent requests for verification.
/// An exhausted queue answers with [`TransportError::ConnectionClosed`].
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    sent_requests: Vec<HttpRequest>,
    reply_queue: VecDeque<Reply>,
    fail_next_send: Option<String>,
}

#[derive(Debug)]
enum Reply {
    Ready(Result<HttpResponse, TransportError>),
    Gated(MockGate, HttpResponse),
}

/// Holds back a queued response until [`MockGate::release`] is called.
#[derive(Debug, Clone, Default)]
pub struct MockGate {
    notify: Arc<Notify>,
}

impl MockGate {
    /// Let the held response through. Releasing before the request arrives
    /// is fine; the response is then returned immediately.
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to be returned by the next `send()` call.
    pub fn queue_response(&self, response: HttpResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.reply_queue.push_back(Reply::Ready(Ok(response)));
    }

    /// Queue a JSON response.
    pub fn queue_json(&self, status: u16, body: &serde_json::Value) {
        self.queue_response(HttpResponse::json(status, body));
    }

    /// Queue a transport error.
    pub fn queue_error(&self, error: TransportError) {
        let mut inner = self.inner.lock().unwrap();
        inner.reply_queue.push_back(Reply::Ready(Err(error)));
    }

    /// Queue a response that is held until the returned gate is released.
    pub fn queue_gated(&self, response: HttpResponse) -> MockGate {
        let gate = MockGate::default();
        let mut inner = self.inner.lock().unwrap();
        inner
            .reply_queue
            .push_back(Reply::Gated(gate.clone(), response));
        gate
    }

    /// Get all requests that were sent.
    pub fn sent_requests(&self) -> Vec<HttpRequest> {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.clone()
    }

    /// Get the last request that was sent.
    pub fn last_sent(&self) -> Option<HttpRequest> {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.last().cloned()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.len()
    }

    /// Wait until at least `count` requests have been sent.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Cause the next send() to fail with the given error.
    ///
    /// The failed request is still recorded.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Clear all state (requests, queue, forced failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            inner.sent_requests.push(request);

            // Check for forced failure
            if let Some(error) = inner.fail_next_send.take() {
                return Err(TransportError::SendFailed(error));
            }

            inner.reply_queue.pop_front()
        };

        match reply {
            None => Err(TransportError::ConnectionClosed),
            Some(Reply::Ready(result)) => result,
            Some(Reply::Gated(gate, response)) => {
                gate.notify.notified().await;
                Ok(response)
            }
        }
    }
}
