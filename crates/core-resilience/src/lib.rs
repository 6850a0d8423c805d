//! Designer Core Resilience: Pure-logic admission control primitives
//!
//! # Overview
//!
//! This crate provides the building blocks the Template Designer uses to stay
//! responsive when the host process behind the bridge degrades:
//!
//! - **Circuit Breaker**: Rejects calls fast while the host is failing, then
//!   admits trial calls once a cooldown has passed
//! - **Metrics**: Bounded sample windows and nearest-rank percentiles for
//!   reporting breaker health
//! - **Retry**: Exponential backoff layered on top of the breaker by callers
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - The bridge or the host process
//! - Error shapes of the wrapped calls
//! - Application-specific concerns
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Caller (UI action)              │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Retry (optional)                  │  ← Caller-owned policy
//! │  (Exponential backoff, predicate)       │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Admission control
//! │  (Closed / Open / HalfOpen)             │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!         Wrapped call
//!      (bridge into the host)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use designer_core_resilience::{CircuitBreaker, CircuitBreakerConfig, ExecuteError};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 3,
//!     success_threshold: 2,
//!     open_timeout: Duration::from_secs(30),
//!     ..Default::default()
//! };
//!
//! let breaker = CircuitBreaker::named("save_template", config);
//!
//! let result: Result<&str, ExecuteError<String>> = breaker
//!     .execute(|| async { Ok("saved") })
//!     .await;
//! # let _ = result;
//! # }
//! ```

pub mod circuit_breaker;
pub mod error;
pub mod metrics;
pub mod retry;

// Re-export main types for convenience
pub use circuit_breaker::{
    BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitState, ListenerResult, PerState,
    StateListener,
};
pub use error::ExecuteError;
pub use metrics::{Percentiles, SampleWindow};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use designer_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use super::error::ExecuteError;
    pub use super::retry::{retry_with_backoff, RetryPolicy};
}
