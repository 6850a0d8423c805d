//! Circuit Breaker implementation for admission control
//!
//! The circuit breaker decides whether a call into a possibly degraded
//! dependency is attempted at all. It has three states:
//! - Closed: Normal operation, calls pass through
//! - Open: Dependency is unhealthy, calls are rejected without being attempted
//! - HalfOpen: Trial calls are admitted to test whether the dependency recovered
//!
//! ```text
//! Closed   → Open:     failure_count >= failure_threshold
//! Open     → HalfOpen: next execute() after open_timeout has elapsed (lazy, no timer)
//! HalfOpen → Closed:   success_count >= success_threshold
//! HalfOpen → Open:     any single failure
//! ```
//!
//! The breaker never retries and never times out the wrapped call. Both are
//! composed by the caller (see [`crate::retry`] and `tokio::time::timeout`).
//!
//! Overlapping `execute()` calls on one breaker are not serialized. Each call
//! reads the state on admission and records its outcome when it completes,
//! so counting under overlap is best effort. The bookkeeping lock is never
//! held across the wrapped call.

use crate::error::ExecuteError;
use crate::metrics::{mean, Percentiles, SampleWindow};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally
    Closed,
    /// Circuit is open, calls fail immediately
    Open,
    /// Circuit is half-open, trial calls test recovery
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: usize,
    /// Number of consecutive successes in half-open to close circuit
    pub success_threshold: usize,
    /// Minimum time spent open before a trial call is admitted
    pub open_timeout: Duration,
    /// Number of response-time samples retained for percentiles
    pub response_sample_capacity: usize,
    /// Number of duration samples retained per state
    pub state_sample_capacity: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            response_sample_capacity: 1000,
            state_sample_capacity: 100,
        }
    }
}

/// One value per circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerState<T> {
    pub closed: T,
    pub open: T,
    pub half_open: T,
}

impl<T> PerState<T> {
    pub fn get(&self, state: CircuitState) -> &T {
        match state {
            CircuitState::Closed => &self.closed,
            CircuitState::Open => &self.open,
            CircuitState::HalfOpen => &self.half_open,
        }
    }

    fn get_mut(&mut self, state: CircuitState) -> &mut T {
        match state {
            CircuitState::Closed => &mut self.closed,
            CircuitState::Open => &mut self.open,
            CircuitState::HalfOpen => &mut self.half_open,
        }
    }
}

/// Read-only snapshot of a breaker
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerMetrics {
    /// Breaker name, used in logs
    pub name: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    /// Number of response-time samples currently retained
    pub sample_count: usize,
    /// Successes over retained samples; 1.0 when nothing has been sampled
    pub success_rate: f64,
    /// Nearest-rank percentiles over retained response times
    pub response_times: Percentiles,
    /// Mean duration of successful calls completed in each state
    pub average_state_duration: PerState<Option<Duration>>,
    /// Time since the current state was entered
    pub time_in_state: Duration,
}

/// Result returned by a state-change listener
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback invoked synchronously on every state transition
pub type StateListener = Arc<dyn Fn(CircuitState, &BreakerMetrics) -> ListenerResult + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct ResponseSample {
    duration: Duration,
    success: bool,
}

/// A state change captured under the lock, reported after it is released
struct Transition {
    from: CircuitState,
    to: CircuitState,
    metrics: BreakerMetrics,
}

/// Internal state of the circuit breaker
#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    state_entered_at: Instant,
    response_times: SampleWindow<ResponseSample>,
    state_durations: PerState<SampleWindow<Duration>>,
}

impl CircuitBreakerState {
    fn new(config: &CircuitBreakerConfig) -> Self {
        let window = || SampleWindow::new(config.state_sample_capacity);
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            state_entered_at: Instant::now(),
            response_times: SampleWindow::new(config.response_sample_capacity),
            state_durations: PerState {
                closed: window(),
                open: window(),
                half_open: window(),
            },
        }
    }

    fn enter(&mut self, to: CircuitState, name: &str) -> Transition {
        let from = self.state;
        self.state = to;
        self.state_entered_at = Instant::now();
        Transition {
            from,
            to,
            metrics: self.snapshot(name),
        }
    }

    fn snapshot(&self, name: &str) -> BreakerMetrics {
        let sample_count = self.response_times.len();
        let successes = self.response_times.iter().filter(|s| s.success).count();
        let success_rate = if sample_count == 0 {
            1.0
        } else {
            successes as f64 / sample_count as f64
        };

        BreakerMetrics {
            name: name.to_string(),
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            sample_count,
            success_rate,
            response_times: Percentiles::from_samples(
                self.response_times.iter().map(|s| &s.duration),
            ),
            average_state_duration: PerState {
                closed: mean(self.state_durations.closed.iter()),
                open: mean(self.state_durations.open.iter()),
                half_open: mean(self.state_durations.half_open.iter()),
            },
            time_in_state: self.state_entered_at.elapsed(),
        }
    }
}

/// Circuit breaker guarding calls into a dependency that may degrade
///
/// Clones share state, so one breaker can be handed to every caller of the
/// same protected operation.
///
/// # Example
/// ```no_run
/// use designer_core_resilience::{CircuitBreaker, CircuitBreakerConfig, ExecuteError};
///
/// #[tokio::main]
/// async fn main() {
///     let breaker = CircuitBreaker::named("load_template", CircuitBreakerConfig::default());
///
///     let result: Result<u32, ExecuteError<String>> = breaker
///         .execute(|| async { Ok(42) })
///         .await;
///
///     match result {
///         Ok(value) => println!("Result: {}", value),
///         Err(e) if e.is_circuit_open() => println!("Temporarily unavailable: {}", e),
///         Err(e) => println!("Call failed: {}", e),
///     }
/// }
/// ```
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
    listener: Option<StateListener>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::named("default", config)
    }

    /// Create a named circuit breaker; the name appears in logs and metrics
    pub fn named(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let state = CircuitBreakerState::new(&config);
        Self {
            name: Arc::from(name.into()),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(state)),
            listener: None,
        }
    }

    /// Create a new circuit breaker with default configuration
    pub fn new_default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Attach a listener invoked on every state transition.
    ///
    /// Listener errors and panics are logged and never reach the caller of
    /// [`execute`](Self::execute).
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(CircuitState, &BreakerMetrics) -> ListenerResult + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state of the circuit breaker
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Get current failure count
    pub async fn failure_count(&self) -> usize {
        self.state.lock().await.failure_count
    }

    /// Get current success count
    pub async fn success_count(&self) -> usize {
        self.state.lock().await.success_count
    }

    /// Take a metrics snapshot
    pub async fn metrics(&self) -> BreakerMetrics {
        self.state.lock().await.snapshot(&self.name)
    }

    /// Force the breaker back to closed and drop all samples.
    ///
    /// Meant for test teardown and explicit user-triggered recovery.
    pub async fn reset(&self) {
        let transition = {
            let mut state = self.state.lock().await;
            state.failure_count = 0;
            state.success_count = 0;
            state.response_times.clear();
            state.state_durations.closed.clear();
            state.state_durations.open.clear();
            state.state_durations.half_open.clear();
            let from = state.state;
            let transition = state.enter(CircuitState::Closed, &self.name);
            (from != CircuitState::Closed).then_some(transition)
        };

        info!(breaker = %self.name, "Circuit breaker reset");
        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// If the circuit is open and the open timeout has not elapsed, the
    /// operation is not invoked and [`ExecuteError::CircuitOpen`] is returned.
    /// Otherwise the operation runs once and its error, if any, is returned
    /// unchanged inside [`ExecuteError::Call`].
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(retry_after) = self.admit().await {
            return Err(ExecuteError::CircuitOpen {
                breaker: self.name.to_string(),
                retry_after,
            });
        }

        let started = Instant::now();
        let outcome = op().await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(value) => {
                self.on_success(elapsed).await;
                Ok(value)
            }
            Err(e) => {
                self.on_failure(elapsed).await;
                Err(ExecuteError::Call(e))
            }
        }
    }

    /// Check circuit state and move open → half-open once the timeout elapsed.
    ///
    /// Returns the remaining open time when the call must be rejected.
    async fn admit(&self) -> Result<(), Duration> {
        let transition = {
            let mut state = self.state.lock().await;

            match state.state {
                CircuitState::Closed | CircuitState::HalfOpen => return Ok(()),
                CircuitState::Open => {
                    let elapsed = state.state_entered_at.elapsed();
                    if elapsed < self.config.open_timeout {
                        let retry_after = self.config.open_timeout - elapsed;
                        debug!(
                            breaker = %self.name,
                            retry_after_ms = retry_after.as_millis() as u64,
                            "Call rejected, circuit open"
                        );
                        return Err(retry_after);
                    }

                    state.success_count = 0;
                    state.enter(CircuitState::HalfOpen, &self.name)
                }
            }
        };

        self.notify(transition);
        Ok(())
    }

    /// Handle successful operation
    async fn on_success(&self, elapsed: Duration) {
        let transition = {
            let mut state = self.state.lock().await;
            let current = state.state;

            state.response_times.push(ResponseSample {
                duration: elapsed,
                success: true,
            });
            state.state_durations.get_mut(current).push(elapsed);

            match current {
                CircuitState::Closed => {
                    // A success ends the failure streak
                    state.failure_count = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    state.success_count += 1;
                    if state.success_count >= self.config.success_threshold {
                        state.failure_count = 0;
                        state.success_count = 0;
                        Some(state.enter(CircuitState::Closed, &self.name))
                    } else {
                        None
                    }
                }
                // Late completion of a call admitted before the circuit opened
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Handle failed operation
    async fn on_failure(&self, elapsed: Duration) {
        let transition = {
            let mut state = self.state.lock().await;

            state.response_times.push(ResponseSample {
                duration: elapsed,
                success: false,
            });
            state.failure_count += 1;

            match state.state {
                CircuitState::Closed => {
                    if state.failure_count >= self.config.failure_threshold {
                        Some(state.enter(CircuitState::Open, &self.name))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    // Any failure during the trial re-opens the circuit
                    state.success_count = 0;
                    Some(state.enter(CircuitState::Open, &self.name))
                }
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    fn notify(&self, transition: Transition) {
        info!(
            breaker = %self.name,
            from = %transition.from,
            to = %transition.to,
            failures = transition.metrics.failure_count,
            "Circuit state changed"
        );

        let Some(listener) = &self.listener else {
            return;
        };

        let to = transition.to;
        let metrics = &transition.metrics;
        match panic::catch_unwind(AssertUnwindSafe(|| listener(to, metrics))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(breaker = %self.name, error = %e, "State change listener failed");
            }
            Err(_) => {
                warn!(breaker = %self.name, "State change listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Outcome = Result<(), ExecuteError<&'static str>>;

    fn config(failures: usize, successes: usize, open_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: failures,
            success_threshold: successes,
            open_timeout: Duration::from_millis(open_ms),
            ..Default::default()
        }
    }

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Outcome {
        breaker
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Outcome {
        breaker
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_closed_to_open() {
        for threshold in 1..=6 {
            let breaker = CircuitBreaker::new(config(threshold, 2, 1000));
            let calls = AtomicUsize::new(0);

            for _ in 0..threshold {
                assert_eq!(breaker.state().await, CircuitState::Closed);
                assert!(fail(&breaker, &calls).await.is_err());
            }

            assert_eq!(breaker.state().await, CircuitState::Open);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_calling() {
        let breaker = CircuitBreaker::new(config(1, 1, 1000));
        let tripped = AtomicUsize::new(0);
        let _ = fail(&breaker, &tripped).await;

        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let err = succeed(&breaker, &calls).await.unwrap_err();
            assert!(err.is_circuit_open());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_counts_down() {
        let breaker = CircuitBreaker::new(config(1, 1, 1000));
        let calls = AtomicUsize::new(0);
        let _ = fail(&breaker, &calls).await;

        tokio::time::advance(Duration::from_millis(400)).await;

        match succeed(&breaker, &calls).await {
            Err(ExecuteError::CircuitOpen { retry_after, .. }) => {
                assert_eq!(retry_after, Duration::from_millis(600));
            }
            other => panic!("Expected CircuitOpen, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_after_timeout_is_trial() {
        let breaker = CircuitBreaker::new(config(1, 3, 1000));
        let tripped = AtomicUsize::new(0);
        let _ = fail(&breaker, &tripped).await;

        tokio::time::advance(Duration::from_millis(1000)).await;

        let calls = AtomicUsize::new(0);
        assert!(succeed(&breaker, &calls).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        assert_eq!(breaker.success_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        // A large success threshold must not delay re-opening
        let breaker = CircuitBreaker::new(config(1, 10, 500));
        let calls = AtomicUsize::new(0);
        let _ = fail(&breaker, &calls).await;

        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(succeed(&breaker, &calls).await.is_ok());
        assert!(succeed(&breaker, &calls).await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        assert!(fail(&breaker, &calls).await.is_err());
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert_eq!(breaker.success_count().await, 0);

        // Re-opened with a fresh timeout
        let err = succeed(&breaker, &calls).await.unwrap_err();
        assert!(err.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_half_open_to_closed() {
        let breaker = CircuitBreaker::new(config(2, 2, 50));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _ = fail(&breaker, &calls).await;
        }

        tokio::time::advance(Duration::from_millis(60)).await;

        for _ in 0..2 {
            assert!(succeed(&breaker, &calls).await.is_ok());
        }

        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
        assert_eq!(breaker.success_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_and_recover_scenario() {
        let breaker = CircuitBreaker::new(config(3, 2, 1000));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let err = fail(&breaker, &calls).await.unwrap_err();
            assert_eq!(err.call_error(), Some(&"boom"));
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        let err = fail(&breaker, &calls).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_millis(1001)).await;

        assert!(succeed(&breaker, &calls).await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        assert!(succeed(&breaker, &calls).await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
        assert_eq!(breaker.success_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_failure_streak() {
        let breaker = CircuitBreaker::new(config(3, 1, 1000));
        let calls = AtomicUsize::new(0);

        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.failure_count().await, 2);

        let _ = succeed(&breaker, &calls).await;
        assert_eq!(breaker.failure_count().await, 0);

        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let breaker = CircuitBreaker::new(config(1, 1, 60_000));
        let calls = AtomicUsize::new(0);
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;

        let metrics = breaker.metrics().await;
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.success_count, 0);
        assert_eq!(metrics.sample_count, 0);
        assert!(succeed(&breaker, &calls).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_snapshot() {
        let breaker = CircuitBreaker::new(config(10, 1, 1000));

        for ms in [10u64, 20, 30] {
            let _: Outcome = breaker
                .execute(|| async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(())
                })
                .await;
        }
        let _: Outcome = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Err("slow failure")
            })
            .await;

        let metrics = breaker.metrics().await;
        assert_eq!(metrics.sample_count, 4);
        assert!((metrics.success_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(metrics.response_times.p50, Some(Duration::from_millis(20)));
        assert_eq!(metrics.response_times.p99, Some(Duration::from_millis(40)));
        assert_eq!(
            metrics.average_state_duration.closed,
            Some(Duration::from_millis(20))
        );
        assert_eq!(metrics.average_state_duration.half_open, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_metrics() {
        let breaker = CircuitBreaker::new_default();
        let metrics = breaker.metrics().await;

        assert_eq!(metrics.name, "default");
        assert_eq!(metrics.sample_count, 0);
        assert_eq!(metrics.success_rate, 1.0);
        assert_eq!(metrics.response_times, Percentiles::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_window_is_bounded() {
        let config = CircuitBreakerConfig {
            response_sample_capacity: 3,
            ..Default::default()
        };
        let breaker = CircuitBreaker::new(config);
        let calls = AtomicUsize::new(0);

        for _ in 0..10 {
            let _ = succeed(&breaker, &calls).await;
        }

        assert_eq!(breaker.metrics().await.sample_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_sees_every_transition() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let breaker = CircuitBreaker::named("export", config(1, 1, 100)).with_listener(
            move |state, metrics| {
                assert_eq!(metrics.state, state);
                sink.lock().unwrap().push(state);
                Ok(())
            },
        );
        let calls = AtomicUsize::new(0);

        let _ = fail(&breaker, &calls).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        let _ = succeed(&breaker, &calls).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                CircuitState::Open,
                CircuitState::HalfOpen,
                CircuitState::Closed
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_errors_are_contained() {
        let breaker = CircuitBreaker::new(config(1, 1, 100))
            .with_listener(|_, _| Err("listener is broken".into()));
        let calls = AtomicUsize::new(0);

        let err = fail(&breaker, &calls).await.unwrap_err();
        assert_eq!(err.call_error(), Some(&"boom"));
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_panics_are_contained() {
        let breaker = CircuitBreaker::new(config(1, 1, 100))
            .with_listener(|_, _| panic!("listener exploded"));
        let calls = AtomicUsize::new(0);

        let err = fail(&breaker, &calls).await.unwrap_err();
        assert!(!err.is_circuit_open());
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_calls_late_success_while_open() {
        let breaker = CircuitBreaker::new(config(1, 1, 1000));

        let slow = breaker.execute(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, &str>("slow")
        });
        let fast = breaker.execute(|| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<&str, _>("fast failure")
        });
        let (slow, fast) = tokio::join!(slow, fast);

        // Both were admitted while closed; the fast failure tripped the circuit
        assert_eq!(slow.unwrap(), "slow");
        assert_eq!(fast.unwrap_err().call_error(), Some(&"fast failure"));

        let metrics = breaker.metrics().await;
        assert_eq!(metrics.state, CircuitState::Open);
        assert_eq!(metrics.failure_count, 1);
        assert_eq!(metrics.sample_count, 2);
        assert!((metrics.success_rate - 0.5).abs() < f64::EPSILON);

        // The late success is sampled under the state it completed in
        let averages = metrics.average_state_duration;
        assert_eq!(
            *averages.get(CircuitState::Open),
            Some(Duration::from_millis(50))
        );
        assert_eq!(*averages.get(CircuitState::Closed), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let breaker = CircuitBreaker::new(config(2, 1, 1000));
        let other = breaker.clone();
        let calls = AtomicUsize::new(0);

        let _ = fail(&breaker, &calls).await;
        let _ = fail(&other, &calls).await;

        assert_eq!(breaker.state().await, CircuitState::Open);
    }
}
