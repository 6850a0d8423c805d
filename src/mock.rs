//! Mock bridge implementation for testing
//!
//! Replies are scripted: queued replies are consumed first, then the default
//! reply is used for every further call. Every invocation is recorded.

use async_trait::async_trait;
use designer_bridge_interface::{Bridge, BridgeError, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Scripted reply for one call
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Succeed with this value
    Value(Value),
    /// Fail as if the host reported an error
    Host { code: String, message: String },
    /// Fail as if the host went away
    Disconnected,
    /// Never settle
    Hang,
}

impl MockReply {
    pub fn host(code: &str, message: &str) -> Self {
        MockReply::Host {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug)]
struct Script {
    queued: VecDeque<MockReply>,
    default: MockReply,
    recorded: Vec<(String, Value)>,
}

/// In-memory bridge with scripted replies
///
/// # Example
///
/// ```rust
/// use designer_bridge::mock::{MockBridge, MockReply};
/// use designer_bridge_interface::Bridge;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let bridge = MockBridge::new();
/// bridge.push_reply(MockReply::host("SAVE_FAILED", "disk full"));
///
/// assert!(bridge.invoke("save_template", json!({})).await.is_err());
/// assert!(bridge.invoke("save_template", json!({})).await.is_ok());
/// assert_eq!(bridge.calls(), 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockBridge {
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MockBridge {
    /// Mock that answers every call with `null`
    pub fn new() -> Self {
        Self::with_default(MockReply::Value(Value::Null))
    }

    /// Mock that answers every unscripted call with `reply`
    pub fn with_default(reply: MockReply) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                queued: VecDeque::new(),
                default: reply,
                recorded: Vec::new(),
            })),
            calls: Arc::new(AtomicUsize::new(0)),
            latency: None,
        }
    }

    /// Delay every reply by `latency` (uses the tokio clock)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a reply for the next unanswered call
    pub fn push_reply(&self, reply: MockReply) {
        self.script().queued.push_back(reply);
    }

    /// Change the reply used once the queue is empty
    pub fn set_default(&self, reply: MockReply) {
        self.script().default = reply;
    }

    /// Number of times `invoke` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Method names and payloads in call order
    pub fn recorded(&self) -> Vec<(String, Value)> {
        self.script().recorded.clone()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bridge for MockBridge {
    async fn invoke(&self, method: &str, payload: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut script = self.script();
            script.recorded.push((method.to_string(), payload));
            script
                .queued
                .pop_front()
                .unwrap_or_else(|| script.default.clone())
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match reply {
            MockReply::Value(value) => Ok(value),
            MockReply::Host { code, message } => Err(BridgeError::Host {
                method: method.to_string(),
                code,
                message,
            }),
            MockReply::Disconnected => Err(BridgeError::Disconnected),
            MockReply::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
