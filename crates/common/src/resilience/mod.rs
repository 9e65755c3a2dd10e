//! Resilience patterns for calls to third-party platforms
//!
//! This module provides the **generic, platform-agnostic** resilience layer
//! that every integration client routes its outbound calls through:
//! - **Error classification**: decides whether a failure is an authentication
//!   problem, a missing resource, a throttling response, or a transient fault
//! - **Circuit breaker**: stops calling a platform after repeated failures and
//!   lets a single probe through once the cooldown has elapsed
//! - **Retry executor**: bounded retries with exponential backoff, consulting
//!   the breaker before every attempt and reporting every outcome to it
//!
//! ## Control Flow
//!
//! ```text
//! RetryExecutor::execute(op)
//!   └─ loop per attempt n
//!        ├─ CircuitBreaker::acquire()      rejected → ResilienceError::CircuitOpen
//!        ├─ op().await                     ok       → record_success, return
//!        └─ ErrorClassifier::classify(err)
//!             ├─ NonRetryableAuth          record_failure, return Authentication
//!             ├─ NonRetryableNotFound      (no breaker report), return NotFound
//!             └─ RateLimit / Transient     record_failure; give up when exhausted or
//!                                          the circuit opened, else sleep(backoff)
//! ```
//!
//! ## Ownership
//!
//! One [`CircuitBreaker`] and one [`RetryExecutor`] are built per platform
//! client at startup. Cloning a breaker shares its state, so every concurrent
//! call through the same client observes the same circuit.

pub mod circuit_breaker;
pub mod classifier;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitState, Clock, MockClock, ProbeTicket, SystemClock,
};
// Re-export classification types
pub use classifier::{ErrorClassification, ErrorClassifier, FailureSignal, StatusClassifier};
// Re-export retry types
pub use retry::{
    Jitter, ResilienceError, ResilienceResult, RetryExecutor, RetryOutcome, RetryPolicy,
    RetryPolicyBuilder,
};
