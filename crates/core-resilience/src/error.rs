//! Error types for admission-controlled calls

use std::time::Duration;
use thiserror::Error;

/// Outcome of a call that went through a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// The breaker never rewrites the wrapped call's error: it is handed back
/// untouched inside [`ExecuteError::Call`]. The only error the breaker
/// synthesizes itself is [`ExecuteError::CircuitOpen`].
#[derive(Error, Debug)]
pub enum ExecuteError<E> {
    /// Rejected by admission control; the wrapped call was not attempted
    #[error("circuit '{breaker}' is open, retry in {retry_after:?}")]
    CircuitOpen {
        /// Name of the breaker that rejected the call
        breaker: String,
        /// Remaining time before a trial call will be admitted
        retry_after: Duration,
    },

    /// The wrapped call ran and failed
    #[error("{0}")]
    Call(E),
}

impl<E> ExecuteError<E> {
    /// Check if this is an admission rejection rather than a call failure
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ExecuteError::CircuitOpen { .. })
    }

    /// Get the wrapped call's error, if the call actually ran
    pub fn into_call_error(self) -> Option<E> {
        match self {
            ExecuteError::Call(e) => Some(e),
            ExecuteError::CircuitOpen { .. } => None,
        }
    }

    /// Borrow the wrapped call's error, if the call actually ran
    pub fn call_error(&self) -> Option<&E> {
        match self {
            ExecuteError::Call(e) => Some(e),
            ExecuteError::CircuitOpen { .. } => None,
        }
    }
}
