/*!
 * Configuration types for the designer bridge
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use designer_core_resilience::{CircuitBreakerConfig, RetryPolicy};

use crate::error::{DesignerError, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DesignerConfig {
    /// Circuit breaker thresholds and sample windows
    #[serde(default)]
    pub breaker: BreakerSection,

    /// Retry schedule for `call_with_retry`
    #[serde(default)]
    pub retry: RetrySection,

    /// Diagnostic output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-call timeout in milliseconds (unset means calls may take as long
    /// as the host needs)
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

/// `[breaker]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: usize,

    /// Time the circuit stays open before a trial call, in milliseconds
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    #[serde(default = "default_response_sample_capacity")]
    pub response_sample_capacity: usize,

    #[serde(default = "default_state_sample_capacity")]
    pub state_sample_capacity: usize,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_timeout_ms: default_open_timeout_ms(),
            response_sample_capacity: default_response_sample_capacity(),
            state_sample_capacity: default_state_sample_capacity(),
        }
    }
}

/// `[retry]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Write JSON logs to this file instead of stdout
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Shorthand for `level = "debug"`
    #[serde(default)]
    pub verbose: bool,
}

impl LoggingConfig {
    /// Copy of this configuration with a command-line `--verbose` applied
    pub fn with_verbose(&self, verbose: bool) -> LoggingConfig {
        let mut effective = self.clone();
        if verbose {
            effective.verbose = true;
            effective.level = LogLevel::Debug;
        }
        effective
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_failure_threshold() -> usize {
    5
}

fn default_success_threshold() -> usize {
    2
}

fn default_open_timeout_ms() -> u64 {
    30_000
}

fn default_response_sample_capacity() -> usize {
    1000
}

fn default_state_sample_capacity() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl DesignerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: DesignerConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the breaker or retry layer cannot work with
    pub fn validate(&self) -> Result<()> {
        let breaker = &self.breaker;
        if breaker.failure_threshold == 0 {
            return Err(invalid("breaker.failure_threshold must be at least 1"));
        }
        if breaker.success_threshold == 0 {
            return Err(invalid("breaker.success_threshold must be at least 1"));
        }
        if breaker.open_timeout_ms == 0 {
            return Err(invalid("breaker.open_timeout_ms must be positive"));
        }
        if breaker.response_sample_capacity == 0 || breaker.state_sample_capacity == 0 {
            return Err(invalid("breaker sample capacities must be non-zero"));
        }

        let retry = &self.retry;
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(invalid("retry.multiplier must be a finite number >= 1.0"));
        }
        if retry.initial_backoff_ms > retry.max_backoff_ms {
            return Err(invalid(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms",
            ));
        }

        if self.call_timeout_ms == Some(0) {
            return Err(invalid("call_timeout_ms must be positive when set"));
        }

        Ok(())
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::from(&self.breaker)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

fn invalid(msg: &str) -> DesignerError {
    DesignerError::Config(msg.to_string())
}

impl From<&BreakerSection> for CircuitBreakerConfig {
    fn from(section: &BreakerSection) -> Self {
        CircuitBreakerConfig {
            failure_threshold: section.failure_threshold,
            success_threshold: section.success_threshold,
            open_timeout: Duration::from_millis(section.open_timeout_ms),
            response_sample_capacity: section.response_sample_capacity,
            state_sample_capacity: section.state_sample_capacity,
        }
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        RetryPolicy {
            max_retries: section.max_retries,
            initial_backoff: Duration::from_millis(section.initial_backoff_ms),
            max_backoff: Duration::from_millis(section.max_backoff_ms),
            multiplier: section.multiplier,
        }
    }
}
