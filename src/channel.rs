//! In-process end of the host link
//!
//! A [`ChannelBridge`] turns each `invoke()` into a [`HostRequest`] sent over
//! a bounded channel. Whatever owns the [`HostEndpoint`] (the task that talks
//! to the host process) answers each request through its reply handle.
//!
//! ```text
//! ChannelBridge::invoke ──HostRequest──▶ HostEndpoint::next_request
//!          ▲                                      │
//!          └──────────── oneshot reply ◀──────────┘
//! ```
//!
//! If the endpoint is dropped, or a request is dropped without an answer,
//! the caller sees `BridgeError::Disconnected`.

use async_trait::async_trait;
use designer_bridge_interface::{Bridge, BridgeError, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Default number of requests that may wait for the endpoint
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Create a connected bridge/endpoint pair
pub fn channel(capacity: usize) -> (ChannelBridge, HostEndpoint) {
    let (request_tx, request_rx) = mpsc::channel(capacity.max(1));
    (
        ChannelBridge {
            request_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        },
        HostEndpoint { request_rx },
    )
}

/// One call waiting for the host
#[derive(Debug)]
pub struct HostRequest {
    pub id: u64,
    pub method: String,
    pub payload: Value,
    reply: oneshot::Sender<Result<Value>>,
}

impl HostRequest {
    /// Answer with a value. Returns false if the caller stopped waiting.
    pub fn respond(self, value: Value) -> bool {
        self.reply.send(Ok(value)).is_ok()
    }

    /// Answer with a host-side error code and message
    pub fn fail(self, code: impl Into<String>, message: impl Into<String>) -> bool {
        let err = BridgeError::Host {
            method: self.method,
            code: code.into(),
            message: message.into(),
        };
        self.reply.send(Err(err)).is_ok()
    }
}

/// Receiving side owned by the host link
#[derive(Debug)]
pub struct HostEndpoint {
    request_rx: mpsc::Receiver<HostRequest>,
}

impl HostEndpoint {
    /// Wait for the next request. `None` once every bridge handle is gone.
    pub async fn next_request(&mut self) -> Option<HostRequest> {
        self.request_rx.recv().await
    }

    /// Stop accepting requests; queued requests can still be drained
    pub fn close(&mut self) {
        self.request_rx.close();
    }
}

/// Bridge that forwards calls to a [`HostEndpoint`]
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    request_tx: mpsc::Sender<HostRequest>,
    next_id: Arc<AtomicU64>,
}

impl ChannelBridge {
    /// Check if the endpoint side has gone away
    pub fn is_closed(&self) -> bool {
        self.request_tx.is_closed()
    }
}

#[async_trait]
impl Bridge for ChannelBridge {
    async fn invoke(&self, method: &str, payload: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();

        let request = HostRequest {
            id,
            method: method.to_string(),
            payload,
            reply,
        };

        trace!(id, method, "Sending host request");
        if self.request_tx.send(request).await.is_err() {
            debug!(id, method, "Host endpoint closed");
            return Err(BridgeError::Disconnected);
        }

        match response.await {
            Ok(result) => result,
            Err(_) => {
                debug!(id, method, "Host request dropped without reply");
                Err(BridgeError::Disconnected)
            }
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}
