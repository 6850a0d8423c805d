/*!
 * Template Designer Bridge
 *
 * Resilient call boundary between the Template Designer and its host
 * process (the Anki add-on):
 * - Circuit breaking per bridge, with response-time and per-state metrics
 * - Swappable bridge provider for injection in tests
 * - Error-code catalog with user-facing suggestions
 * - TOML configuration and structured logging
 *
 * The breaker itself lives in `designer-core-resilience`, the `Bridge` trait
 * in `designer-bridge-interface`.
 */

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod provider;
pub mod suggestions;

// Re-export commonly used types
pub use channel::{ChannelBridge, HostEndpoint, HostRequest};
pub use client::BridgeClient;
pub use config::{DesignerConfig, LogLevel, LoggingConfig};
pub use error::{DesignerError, Result};
pub use provider::{BridgeFactory, BridgeProvider, ProviderError};
pub use suggestions::{format_suggestion, ErrorCode, ErrorSuggestion, SuggestionCatalog};

pub use designer_bridge_interface::{Bridge, BridgeError, BridgeExt, DetachedBridge};
pub use designer_core_resilience::{
    BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
