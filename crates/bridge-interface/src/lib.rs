//! Designer Bridge Interface: the call boundary to the host process
//!
//! This crate defines the `Bridge` trait, the single capability the Template
//! Designer needs from its host (the Anki add-on process): invoke a named
//! method with a JSON payload and get a JSON result back, or an error.
//!
//! How a request physically reaches the host is up to the implementation:
//!
//! - **ChannelBridge**: in-process channel pumped by the embedding view
//! - **MockBridge**: scripted outcomes for tests
//! - **DetachedBridge**: fails every call until a host is attached
//!
//! # Example
//!
//! ```rust,no_run
//! use designer_bridge_interface::{Bridge, BridgeExt, BridgeError};
//! use serde_json::json;
//!
//! async fn note_types<B: Bridge>(bridge: &B) -> Result<Vec<String>, BridgeError> {
//!     bridge.call_typed("list_note_types", &json!({})).await
//! }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host ran the method and reported a failure
    #[error("Host rejected '{method}' [{code}]: {message}")]
    Host {
        method: String,
        code: String,
        message: String,
    },

    /// No host is attached to this bridge
    #[error("Bridge is not attached to a host")]
    Detached,

    /// The host went away while a call was pending
    #[error("Host disconnected")]
    Disconnected,

    /// The payload was rejected before or after crossing the bridge
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Raw error code reported by the host, if the host produced this error
    pub fn host_code(&self) -> Option<&str> {
        match self {
            BridgeError::Host { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if the host is unreachable (as opposed to reachable but failing)
    pub fn is_unreachable(&self) -> bool {
        matches!(self, BridgeError::Detached | BridgeError::Disconnected)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// The channel from the designer into its host process
///
/// Implementations must be `Send + Sync + 'static` so a single instance can
/// be shared behind an `Arc` by every caller.
#[async_trait]
pub trait Bridge: Send + Sync + 'static {
    /// Invoke a host method
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Host` when the host reports a failure and
    /// `BridgeError::Detached` / `BridgeError::Disconnected` when it cannot
    /// be reached.
    async fn invoke(&self, method: &str, payload: Value) -> Result<Value>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "bridge"
    }
}

/// Convenience methods derived from [`Bridge::invoke`]
#[async_trait]
pub trait BridgeExt: Bridge {
    /// Serialize a request, invoke, and deserialize the response
    async fn call_typed<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request)?;
        let response = self.invoke(method, payload).await?;
        Ok(serde_json::from_value(response)?)
    }
}

// Blanket implementation for all Bridge implementations
impl<T: Bridge + ?Sized> BridgeExt for T {}

/// Bridge with no host behind it. Every call fails with `BridgeError::Detached`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedBridge;

#[async_trait]
impl Bridge for DetachedBridge {
    async fn invoke(&self, _method: &str, _payload: Value) -> Result<Value> {
        Err(BridgeError::Detached)
    }

    fn name(&self) -> &str {
        "detached"
    }
}
