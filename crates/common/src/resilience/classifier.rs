//! Failure classification
//!
//! Turns a failed operation's error into an [`ErrorClassification`], the
//! single input the retry executor uses to decide between surfacing the error,
//! retrying it, and reporting it to the circuit breaker.
//!
//! | Signal | Classification |
//! |--------|----------------|
//! | 401 | `NonRetryableAuth` |
//! | 403 without throttle signal | `NonRetryableAuth` |
//! | 403 with throttle signal | `RetryableRateLimit` |
//! | 404 | `NonRetryableNotFound` |
//! | 429 | `RetryableRateLimit` |
//! | any status with throttle signal (e.g. 422) | `RetryableRateLimit` |
//! | everything else (timeouts, resets, 5xx, no status) | `RetryableTransient` |

use std::fmt;
use std::time::Duration;

/// Outcome of classifying one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Credentials were rejected; never retried
    NonRetryableAuth,
    /// The requested resource does not exist; never retried, not a health signal
    NonRetryableNotFound,
    /// The platform is throttling; retried, honoring `retry_after` when given
    RetryableRateLimit { retry_after: Option<Duration> },
    /// Timeouts, connection resets, server errors
    RetryableTransient,
}

impl ErrorClassification {
    /// Whether the executor may attempt the call again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableRateLimit { .. } | Self::RetryableTransient)
    }

    /// Whether the failure is reported to the circuit breaker
    ///
    /// A missing resource describes the request, not the platform's health.
    pub fn counts_toward_circuit(&self) -> bool {
        !matches!(self, Self::NonRetryableNotFound)
    }

    /// Platform-supplied delay hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RetryableRateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonRetryableAuth => write!(f, "non_retryable_auth"),
            Self::NonRetryableNotFound => write!(f, "non_retryable_not_found"),
            Self::RetryableRateLimit { .. } => write!(f, "retryable_rate_limit"),
            Self::RetryableTransient => write!(f, "retryable_transient"),
        }
    }
}

/// What an operation error exposes to the default classifier
///
/// Platform clients translate their transport or SDK failures into a type
/// implementing this trait (typically carrying the HTTP status code).
pub trait FailureSignal {
    /// HTTP status of the failed response, `None` for network-level failures
    fn status_code(&self) -> Option<u16>;

    /// Delay requested by the platform (e.g. a `Retry-After` header)
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Whether the platform signalled throttling outside of a 429
    fn is_throttled(&self) -> bool {
        false
    }
}

/// Classifies operation errors
pub trait ErrorClassifier<E: ?Sized>: Send + Sync {
    /// Classify a failure. Must be pure: no I/O, no side effects.
    fn classify(&self, error: &E) -> ErrorClassification;
}

impl<E, F> ErrorClassifier<E> for F
where
    E: ?Sized,
    F: Fn(&E) -> ErrorClassification + Send + Sync,
{
    fn classify(&self, error: &E) -> ErrorClassification {
        self(error)
    }
}

/// Default classifier driven by HTTP status and throttle signals
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusClassifier;

impl<E> ErrorClassifier<E> for StatusClassifier
where
    E: FailureSignal + ?Sized,
{
    fn classify(&self, error: &E) -> ErrorClassification {
        let throttled = error.is_throttled();
        let rate_limited = ErrorClassification::RetryableRateLimit { retry_after: error.retry_after() };

        match error.status_code() {
            Some(401) => ErrorClassification::NonRetryableAuth,
            Some(403) if throttled => rate_limited,
            Some(403) => ErrorClassification::NonRetryableAuth,
            Some(404) => ErrorClassification::NonRetryableNotFound,
            Some(429) => rate_limited,
            _ if throttled => rate_limited,
            _ => ErrorClassification::RetryableTransient,
        }
    }
}
