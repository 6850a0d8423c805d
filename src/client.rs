//! Bridge client with circuit breaking
//!
//! Every designer action that needs the host goes through [`BridgeClient`]:
//!
//! ```text
//! call(method, payload)
//!   └─ CircuitBreaker::execute ── rejected ──▶ DesignerError::CircuitOpen
//!        └─ Bridge::invoke (raced against call_timeout, if set)
//!             ├─ Ok(value)      → success recorded
//!             ├─ Err(bridge)    → failure recorded
//!             └─ timed out      → failure recorded, DesignerError::Timeout
//! ```
//!
//! Retrying is opt-in through [`BridgeClient::call_with_retry`]. Only
//! transient errors are retried; an open circuit ends the retry loop at once.

use designer_bridge_interface::{Bridge, BridgeError};
use designer_core_resilience::{
    retry_with_backoff, BreakerMetrics, CircuitBreaker, RetryPolicy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DesignerConfig;
use crate::error::{DesignerError, Result};
use crate::provider::BridgeProvider;

/// Name given to breakers built from configuration
pub const DEFAULT_BREAKER_NAME: &str = "anki-bridge";

/// Host bridge guarded by a circuit breaker
#[derive(Clone)]
pub struct BridgeClient {
    bridge: Arc<dyn Bridge>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Option<Duration>,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("bridge", &self.bridge.name())
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl BridgeClient {
    /// Client with the default retry policy and no call timeout
    pub fn new(bridge: Arc<dyn Bridge>, breaker: CircuitBreaker) -> Self {
        Self {
            bridge,
            breaker,
            retry: RetryPolicy::default(),
            call_timeout: None,
        }
    }

    /// Client whose breaker, retry policy and timeout come from `config`
    pub fn from_config(bridge: Arc<dyn Bridge>, config: &DesignerConfig) -> Self {
        let breaker = CircuitBreaker::named(DEFAULT_BREAKER_NAME, config.breaker_config());
        Self::new(bridge, breaker)
            .with_retry_policy(config.retry_policy())
            .with_call_timeout(config.call_timeout())
    }

    /// Client over whatever bridge `provider` currently hands out
    pub fn from_provider(provider: &BridgeProvider, config: &DesignerConfig) -> Result<Self> {
        let bridge = provider.get_instance()?;
        Ok(Self::from_config(bridge, config))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn bridge(&self) -> &Arc<dyn Bridge> {
        &self.bridge
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Snapshot of the breaker guarding this client
    pub async fn metrics(&self) -> BreakerMetrics {
        self.breaker.metrics().await
    }

    /// Invoke `method` once, subject to the circuit breaker
    pub async fn call(&self, method: &str, payload: Value) -> Result<Value> {
        let result = self
            .breaker
            .execute(|| self.invoke_once(method, payload))
            .await
            .map_err(DesignerError::from);

        if let Err(ref e) = result {
            if e.is_temporarily_unavailable() {
                debug!(method, "Call short-circuited");
            } else {
                warn!(method, error = %e, "Bridge call failed");
            }
        }
        result
    }

    /// Serialize `request`, call `method`, and deserialize the reply
    pub async fn call_typed<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request).map_err(BridgeError::from)?;
        let value = self.call(method, payload).await?;
        let response = serde_json::from_value(value).map_err(BridgeError::from)?;
        Ok(response)
    }

    /// Like [`call`](Self::call), retrying transient failures with backoff
    pub async fn call_with_retry(&self, method: &str, payload: Value) -> Result<Value> {
        retry_with_backoff(&self.retry, DesignerError::is_transient, || {
            self.call(method, payload.clone())
        })
        .await
    }

    async fn invoke_once(&self, method: &str, payload: Value) -> Result<Value> {
        let pending = self.bridge.invoke(method, payload);
        match self.call_timeout {
            Some(after) => match tokio::time::timeout(after, pending).await {
                Ok(outcome) => outcome.map_err(DesignerError::from),
                Err(_) => Err(DesignerError::Timeout {
                    method: method.to_string(),
                    after,
                }),
            },
            None => pending.await.map_err(DesignerError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBridge, MockReply};
    use crate::suggestions::ErrorCode;
    use designer_core_resilience::{CircuitBreakerConfig, CircuitState};
    use serde::Deserialize;
    use serde_json::json;

    fn breaker(failure_threshold: usize) -> CircuitBreaker {
        CircuitBreaker::named(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                success_threshold: 2,
                open_timeout: Duration::from_millis(1000),
                ..Default::default()
            },
        )
    }

    fn client(mock: &MockBridge, failure_threshold: usize) -> BridgeClient {
        BridgeClient::new(Arc::new(mock.clone()), breaker(failure_threshold))
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let mock = MockBridge::with_default(MockReply::Value(json!({"ok": true})));
        let client = client(&mock, 3);

        let value = client.call("save_template", json!({})).await.unwrap();
        assert_eq!(value, json!({"ok": true}));

        let metrics = client.metrics().await;
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.sample_count, 1);
    }

    #[tokio::test]
    async fn test_open_circuit_does_not_reach_bridge() {
        let mock = MockBridge::with_default(MockReply::host("SAVE_FAILED", "locked"));
        let client = client(&mock, 3);

        for _ in 0..3 {
            let err = client.call("save_template", json!({})).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::SaveFailed);
        }
        assert_eq!(client.breaker().state().await, CircuitState::Open);

        let err = client.call("save_template", json!({})).await.unwrap_err();
        assert!(err.is_temporarily_unavailable());
        assert_eq!(err.code(), ErrorCode::CircuitOpen);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let mock = MockBridge::with_default(MockReply::Hang);
        let client = client(&mock, 1).with_call_timeout(Some(Duration::from_millis(250)));

        let err = client.call("export_deck", json!({})).await.unwrap_err();
        assert!(matches!(err, DesignerError::Timeout { .. }));
        assert_eq!(err.code(), ErrorCode::BridgeTimeout);
        assert_eq!(client.breaker().state().await, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reply_within_timeout_succeeds() {
        let mock = MockBridge::new().with_latency(Duration::from_millis(100));
        let client = client(&mock, 1).with_call_timeout(Some(Duration::from_millis(250)));

        assert!(client.call("load_template", json!({})).await.is_ok());
        assert_eq!(client.breaker().state().await, CircuitState::Closed);
    }

    #[derive(Serialize)]
    struct LoadRequest<'a> {
        name: &'a str,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Template {
        name: String,
        fields: Vec<String>,
    }

    #[tokio::test]
    async fn test_call_typed() {
        let mock = MockBridge::with_default(MockReply::Value(json!({
            "name": "Basic",
            "fields": ["Front", "Back"]
        })));
        let client = client(&mock, 3);

        let template: Template = client
            .call_typed("load_template", &LoadRequest { name: "Basic" })
            .await
            .unwrap();

        assert_eq!(template.fields, vec!["Front", "Back"]);
        assert_eq!(mock.recorded()[0].1, json!({"name": "Basic"}));
    }

    #[tokio::test]
    async fn test_call_typed_bad_reply_is_invalid_payload() {
        let mock = MockBridge::with_default(MockReply::Value(json!("not a template")));
        let client = client(&mock, 3);

        let err = client
            .call_typed::<_, Template>("load_template", &LoadRequest { name: "Basic" })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPayload);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let mock = MockBridge::with_default(MockReply::Value(json!("saved")));
        mock.push_reply(MockReply::Disconnected);
        mock.push_reply(MockReply::Disconnected);
        let client = client(&mock, 5);

        let value = client.call_with_retry("save_template", json!({})).await.unwrap();
        assert_eq!(value, json!("saved"));
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_at_open_circuit() {
        let mock = MockBridge::with_default(MockReply::Disconnected);
        let client = client(&mock, 1);

        let err = client.call_with_retry("save_template", json!({})).await.unwrap_err();
        assert!(err.is_temporarily_unavailable());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let mock = MockBridge::with_default(MockReply::host("INVALID_TEMPLATE", "bad mustache"));
        let client = client(&mock, 5);

        let err = client.call_with_retry("save_template", json!({})).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTemplate);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_from_provider_uses_current_bridge() {
        let provider = BridgeProvider::detached();
        let mock = MockBridge::new();
        let handed_out: Arc<dyn Bridge> = Arc::new(mock.clone());
        provider.set_factory(Arc::new(move || handed_out.clone()));

        let client = BridgeClient::from_provider(&provider, &DesignerConfig::default()).unwrap();
        assert_eq!(client.bridge().name(), "mock");
        assert_eq!(client.breaker().name(), DEFAULT_BREAKER_NAME);

        client.call("ping", Value::Null).await.unwrap();
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_detached_bridge_is_unavailable() {
        let client = BridgeClient::from_provider(
            &BridgeProvider::detached(),
            &DesignerConfig::default(),
        )
        .unwrap();

        let err = client.call("ping", Value::Null).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BridgeUnavailable);
    }
}
