//! Circuit breaker guarding calls to a single platform
//!
//! The breaker counts consecutive failures while closed. Once the count
//! reaches `failure_threshold` it opens and rejects every call until
//! `cooldown` has elapsed. The first admission check after that moves it to
//! half-open and hands out exactly one probe; the probe's result either closes
//! the circuit or reopens it with a fresh cooldown.
//!
//! The half-open transition is evaluated lazily inside [`CircuitBreaker::acquire`]:
//! no background timer runs.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CommonError, CommonResult};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Breakers use real monotonic time in production and a [`MockClock`] in
/// tests, so cooldown behavior can be exercised without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset, so a test can keep one handle and
/// advance the time seen by a breaker holding another.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

//==============================================================================
// State and Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls are admitted; consecutive failures are counted
    Closed,
    /// Calls are rejected until the cooldown elapses
    Open,
    /// A single probe call decides whether the platform recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a probe is allowed
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> CommonResult<()> {
        if self.failure_threshold == 0 {
            return Err(CommonError::config_field(
                "failure_threshold",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown = cooldown;
        self
    }

    pub fn build(self) -> CommonResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Admission
//==============================================================================

/// Identifies the single in-flight half-open probe
///
/// A ticket from an earlier half-open period never matches the current one,
/// so releasing a stale ticket is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTicket(u64);

/// Result of asking the breaker for permission to call the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed, proceed normally
    Admitted,
    /// This call is the half-open probe; its outcome decides the circuit
    Probe(ProbeTicket),
    /// Circuit open (or probe already in flight)
    Rejected {
        /// Time left before a probe may be admitted; `None` while a probe is
        /// in flight and the wait depends on its outcome
        retry_after: Option<Duration>,
    },
}

impl Admission {
    /// Whether the call may proceed
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    pub times_opened: u64,
    pub opened_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    probe_in_flight: Option<u64>,
    next_probe_id: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
    times_opened: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            probe_in_flight: None,
            next_probe_id: 0,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
            times_opened: 0,
        }
    }

    fn grant_probe(&mut self) -> ProbeTicket {
        self.next_probe_id = self.next_probe_id.wrapping_add(1);
        self.probe_in_flight = Some(self.next_probe_id);
        ProbeTicket(self.next_probe_id)
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_in_flight = None;
        self.times_opened += 1;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
        self.probe_in_flight = None;
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Per-platform circuit breaker
///
/// Every state transition happens under one mutex, so concurrent callers
/// observe a consistent circuit and at most one probe is ever admitted per
/// half-open period. Clones share the same state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a circuit breaker using the system clock
    pub fn new(config: CircuitBreakerConfig) -> CommonResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> CommonResult<Self> {
        config.validate()?;

        Ok(Self { config, inner: Arc::new(Mutex::new(BreakerState::new())), clock: Arc::new(clock) })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask for permission to make one call
    ///
    /// While open, the first call after the cooldown flips the circuit to
    /// half-open and receives the probe ticket; every other caller is rejected
    /// until the probe's outcome is recorded or released.
    pub fn acquire(&self) -> Admission {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Admission::Admitted,
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);

                if elapsed >= self.config.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    let ticket = inner.grant_probe();
                    info!(cooldown_ms = self.config.cooldown.as_millis() as u64, "circuit half-open, admitting probe");
                    Admission::Probe(ticket)
                } else {
                    inner.total_rejections += 1;
                    Admission::Rejected { retry_after: Some(self.config.cooldown - elapsed) }
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight.is_some() {
                    inner.total_rejections += 1;
                    Admission::Rejected { retry_after: None }
                } else {
                    debug!("probe slot free, admitting new probe");
                    Admission::Probe(inner.grant_probe())
                }
            }
        }
    }

    /// Boolean form of [`acquire`](Self::acquire)
    ///
    /// A `true` answer in half-open means the caller holds the probe slot and
    /// must report the outcome with `record_success` or `record_failure`.
    pub fn allow(&self) -> bool {
        self.acquire().is_allowed()
    }

    /// Report a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;

        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.close();
                info!("circuit closed after successful probe");
            }
            CircuitState::Open => {
                debug!("success reported while circuit open, ignoring");
            }
        }
    }

    /// Report a failed call
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.total_failures += 1;

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                if inner.failure_count >= self.config.failure_threshold {
                    inner.trip(now);
                    warn!(
                        failure_count = inner.failure_count,
                        cooldown_ms = self.config.cooldown.as_millis() as u64,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.trip(now);
                warn!("probe failed, circuit reopened");
            }
            CircuitState::Open => {
                // Late result from a call admitted before the circuit opened
                debug!("failure reported while circuit open, ignoring");
            }
        }
    }

    /// Give the probe slot back without a health verdict
    ///
    /// Used when the probe ended in a way that says nothing about the
    /// platform (resource not found, caller cancelled). The circuit stays
    /// half-open and the next call becomes the probe.
    pub fn release_probe(&self, ticket: ProbeTicket) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight == Some(ticket.0) {
            inner.probe_in_flight = None;
            debug!("probe released without verdict");
        }
    }

    /// Current state, without evaluating the cooldown
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Time left before an open circuit admits a probe, `None` unless open
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return None;
        }
        let opened_at = inner.opened_at?;
        let elapsed = self.clock.now().saturating_duration_since(opened_at);
        Some(self.config.cooldown.saturating_sub(elapsed))
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
            times_opened: inner.times_opened,
            opened_at: inner.opened_at,
        }
    }

    /// Force the circuit closed and clear the failure count
    pub fn reset(&self) {
        self.inner.lock().close();
        info!("circuit manually reset");
    }
}
