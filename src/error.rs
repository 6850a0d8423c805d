/*!
 * Error types for the designer bridge
 */

use std::fmt;
use std::io;
use std::time::Duration;

use designer_bridge_interface::BridgeError;
use designer_core_resilience::ExecuteError;

use crate::provider::ProviderError;
use crate::suggestions::ErrorCode;

pub type Result<T> = std::result::Result<T, DesignerError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_UNAVAILABLE: i32 = 3;

#[derive(Debug)]
pub enum DesignerError {
    /// Call rejected because the circuit for it is open
    CircuitOpen { breaker: String, retry_after: Duration },

    /// Error reported by the bridge or the host behind it
    Bridge(BridgeError),

    /// Call did not settle within the configured call timeout
    Timeout { method: String, after: Duration },

    /// Bridge provider misuse
    Provider(ProviderError),

    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),
}

impl DesignerError {
    /// Error code used to look up user-facing guidance
    pub fn code(&self) -> ErrorCode {
        match self {
            DesignerError::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            DesignerError::Timeout { .. } => ErrorCode::BridgeTimeout,
            DesignerError::Bridge(err) => match err {
                BridgeError::Host { code, .. } => ErrorCode::parse(code),
                BridgeError::Detached | BridgeError::Disconnected => ErrorCode::BridgeUnavailable,
                BridgeError::InvalidPayload(_) | BridgeError::Serialization(_) => {
                    ErrorCode::InvalidPayload
                }
            },
            DesignerError::Provider(_) => ErrorCode::BridgeUnavailable,
            DesignerError::Config(_) => ErrorCode::Unknown("CONFIG_ERROR".to_string()),
            DesignerError::Io(_) => ErrorCode::Unknown("IO_ERROR".to_string()),
        }
    }

    /// Check if this is the known, time-bounded "come back later" condition
    pub fn is_temporarily_unavailable(&self) -> bool {
        matches!(self, DesignerError::CircuitOpen { .. })
    }

    /// Check if this error is transient (temporary, worth retrying)
    ///
    /// An open circuit is not transient in this sense: retrying before the
    /// breaker's cooldown only produces more rejections.
    pub fn is_transient(&self) -> bool {
        match self {
            DesignerError::Timeout { .. } => true,
            DesignerError::Bridge(BridgeError::Disconnected) => true,
            DesignerError::Bridge(BridgeError::Host { code, .. }) => matches!(
                ErrorCode::parse(code),
                ErrorCode::BridgeTimeout | ErrorCode::BridgeUnavailable
            ),
            _ => false,
        }
    }

    /// Short message suitable for a status bar or toast
    pub fn user_message(&self) -> String {
        match self {
            DesignerError::CircuitOpen { retry_after, .. } => format!(
                "Anki is temporarily unavailable, retry in {}s",
                retry_after.as_secs().max(1)
            ),
            DesignerError::Timeout { .. } => "Anki took too long to respond".to_string(),
            DesignerError::Bridge(BridgeError::Host { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DesignerError::Config(_) => EXIT_CONFIG,
            DesignerError::CircuitOpen { .. }
            | DesignerError::Timeout { .. }
            | DesignerError::Bridge(BridgeError::Detached)
            | DesignerError::Bridge(BridgeError::Disconnected) => EXIT_UNAVAILABLE,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for DesignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesignerError::CircuitOpen {
                breaker,
                retry_after,
            } => {
                write!(
                    f,
                    "Circuit '{}' is open, retry in {} ms",
                    breaker,
                    retry_after.as_millis()
                )
            }
            DesignerError::Bridge(err) => {
                write!(f, "Bridge error: {}", err)
            }
            DesignerError::Timeout { method, after } => {
                write!(f, "Call '{}' timed out after {} ms", method, after.as_millis())
            }
            DesignerError::Provider(err) => {
                write!(f, "Provider error: {}", err)
            }
            DesignerError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            DesignerError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
        }
    }
}

impl std::error::Error for DesignerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DesignerError::Bridge(err) => Some(err),
            DesignerError::Provider(err) => Some(err),
            DesignerError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BridgeError> for DesignerError {
    fn from(err: BridgeError) -> Self {
        DesignerError::Bridge(err)
    }
}

impl From<ProviderError> for DesignerError {
    fn from(err: ProviderError) -> Self {
        DesignerError::Provider(err)
    }
}

impl From<io::Error> for DesignerError {
    fn from(err: io::Error) -> Self {
        DesignerError::Io(err)
    }
}

impl From<toml::de::Error> for DesignerError {
    fn from(err: toml::de::Error) -> Self {
        DesignerError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for DesignerError {
    fn from(err: toml::ser::Error) -> Self {
        DesignerError::Config(format!("TOML write error: {}", err))
    }
}

impl From<ExecuteError<DesignerError>> for DesignerError {
    fn from(err: ExecuteError<DesignerError>) -> Self {
        match err {
            ExecuteError::CircuitOpen {
                breaker,
                retry_after,
            } => DesignerError::CircuitOpen {
                breaker,
                retry_after,
            },
            ExecuteError::Call(inner) => inner,
        }
    }
}
