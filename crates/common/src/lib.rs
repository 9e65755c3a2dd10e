//! Modular common utilities shared across custops crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: shared error taxonomy and severity levels
//! - `runtime`: async resilience primitives (circuit breaker, retry executor,
//!   error classification, clock abstraction)
//! - `observability`: tracing instrumentation (implied by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorDisposition, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitState, Clock, ErrorClassification, ErrorClassifier,
    FailureSignal, Jitter, MockClock, ProbeTicket, ResilienceError, ResilienceResult,
    RetryExecutor, RetryOutcome, RetryPolicy, RetryPolicyBuilder, StatusClassifier, SystemClock,
};
