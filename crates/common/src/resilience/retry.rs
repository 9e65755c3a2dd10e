//! Bounded retry with exponential backoff, gated by a circuit breaker
//!
//! [`RetryExecutor`] drives an async operation through at most
//! `max_retries + 1` attempts. Before every attempt it asks the platform's
//! [`CircuitBreaker`] for admission; after every attempt it classifies the
//! failure and reports the outcome to the breaker. Backoff delays are
//! suspended with `tokio::time::sleep`, so no thread is blocked while waiting.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{Admission, CircuitBreaker, Clock, ProbeTicket, SystemClock};
use super::classifier::{ErrorClassification, ErrorClassifier, StatusClassifier};
use crate::error::{CommonError, CommonResult, ErrorDisposition, ErrorSeverity};

//==============================================================================
// Errors and Outcomes
//==============================================================================

/// Terminal failure of a resilient call
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The breaker rejected the call before (another) attempt was made
    #[error(
        "circuit breaker is open, call rejected{}",
        .retry_after.map_or_else(|| " (probe in flight)".to_string(), |d| format!(" (retry in {d:?})"))
    )]
    CircuitOpen { retry_after: Option<Duration> },

    /// Credentials were rejected; not retried
    #[error("authentication rejected: {source}")]
    Authentication {
        #[source]
        source: E,
    },

    /// The requested resource does not exist; not retried
    #[error("resource not found: {source}")]
    NotFound {
        #[source]
        source: E,
    },

    /// Still throttled when the attempt budget ran out
    #[error("rate limited after {attempts} attempt(s): {source}")]
    RateLimited {
        attempts: u32,
        retry_after: Option<Duration>,
        #[source]
        source: E,
    },

    /// Transient failures persisted through every attempt
    #[error("retries exhausted after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The caller cancelled the call
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The last operation error, when one caused this failure
    pub fn source_error(&self) -> Option<&E> {
        match self {
            Self::Authentication { source }
            | Self::NotFound { source }
            | Self::RateLimited { source, .. }
            | Self::RetriesExhausted { source, .. } => Some(source),
            Self::CircuitOpen { .. } | Self::Cancelled => None,
        }
    }

    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Authentication { source }
            | Self::NotFound { source }
            | Self::RateLimited { source, .. }
            | Self::RetriesExhausted { source, .. } => Some(source),
            Self::CircuitOpen { .. } | Self::Cancelled => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    fn exhausted(classification: ErrorClassification, attempts: u32, source: E) -> Self {
        match classification {
            ErrorClassification::RetryableRateLimit { retry_after } => {
                Self::RateLimited { attempts, retry_after, source }
            }
            _ => Self::RetriesExhausted { attempts, source },
        }
    }
}

impl<E> ErrorDisposition for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. } | Self::RateLimited { .. } | Self::RetriesExhausted { .. }
        )
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Authentication { .. } => ErrorSeverity::Critical,
            Self::CircuitOpen { .. } | Self::RateLimited { .. } | Self::RetriesExhausted { .. } => {
                ErrorSeverity::Warning
            }
            Self::NotFound { .. } | Self::Cancelled => ErrorSeverity::Info,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after } => *retry_after,
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for resilient calls
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Result of an execution plus attempt statistics
#[derive(Debug)]
pub struct RetryOutcome<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub result: ResilienceResult<T, E>,
    /// Operation invocations actually made
    pub attempts: u32,
    /// Sum of backoff delays slept
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn into_result(self) -> ResilienceResult<T, E> {
        self.result
    }

    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

//==============================================================================
// Policy
//==============================================================================

/// Randomization applied to each computed backoff delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Use the computed delay as-is
    #[default]
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// Uniform in `[delay / 2, delay]`
    Equal,
}

impl Jitter {
    /// Apply jitter. The result never exceeds `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        match self {
            Jitter::None => delay,
            Jitter::Full if millis == 0 => delay,
            Jitter::Full => Duration::from_millis(rand::thread_rng().gen_range(0..=millis)),
            Jitter::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rand::thread_rng().gen_range(0..=(millis - half)))
            }
        }
    }
}

/// Retry schedule for one platform
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    /// Cap on the computed delay (not on platform-supplied `retry_after`)
    pub max_delay: Duration,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: Jitter::None,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self) -> CommonResult<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(CommonError::config_field(
                "backoff_multiplier",
                "must be a finite number >= 1.0",
            ));
        }

        if self.base_delay > self.max_delay {
            return Err(CommonError::config_field(
                "base_delay",
                format!("{:?} exceeds max_delay {:?}", self.base_delay, self.max_delay),
            ));
        }

        Ok(())
    }

    /// Un-jittered delay after the failed attempt with zero-based index `attempt`
    ///
    /// `min(base_delay * multiplier^attempt, max_delay)`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powf(f64::from(attempt));
        let secs = self.base_delay.as_secs_f64() * factor;

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay actually slept before the next attempt
    ///
    /// A platform-supplied `retry_after` longer than the jittered backoff
    /// wins.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.jitter.apply(self.backoff_for(attempt));
        match retry_after {
            Some(requested) if requested > delay => requested,
            _ => delay,
        }
    }

    /// Upper bound of the summed backoff across every retry, excluding
    /// platform-supplied `retry_after` hints
    pub fn max_total_backoff(&self) -> Duration {
        (0..self.max_retries)
            .map(|attempt| self.backoff_for(attempt))
            .fold(Duration::ZERO, |total, delay| total.saturating_add(delay))
    }
}

/// Builder for RetryPolicy
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.policy.backoff_multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.policy.jitter = jitter;
        self
    }

    pub fn build(self) -> CommonResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

//==============================================================================
// Executor
//==============================================================================

/// Holds the probe slot until the attempt reaches a health verdict
///
/// Dropping the guard without calling `resolve` (not-found, cancellation, the
/// caller dropping the future) gives the slot back to the breaker.
struct ProbeGuard<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    ticket: Option<ProbeTicket>,
}

impl<'a, C: Clock> ProbeGuard<'a, C> {
    fn new(breaker: &'a CircuitBreaker<C>, ticket: Option<ProbeTicket>) -> Self {
        Self { breaker, ticket }
    }

    fn resolve(&mut self) {
        self.ticket = None;
    }
}

impl<C: Clock> Drop for ProbeGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.release_probe(ticket);
        }
    }
}

/// Runs operations under a retry policy and a shared circuit breaker
#[derive(Debug, Clone)]
pub struct RetryExecutor<K = StatusClassifier, C: Clock = SystemClock> {
    breaker: CircuitBreaker<C>,
    policy: RetryPolicy,
    classifier: K,
}

impl<K, C: Clock> RetryExecutor<K, C> {
    pub fn new(breaker: CircuitBreaker<C>, policy: RetryPolicy, classifier: K) -> CommonResult<Self> {
        policy.validate()?;
        Ok(Self { breaker, policy, classifier })
    }

    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation` with retries and breaker gating
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        K: ErrorClassifier<E>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute and report attempt statistics alongside the result
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts()))]
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        K: ErrorClassifier<E>,
    {
        self.run(None, operation).await
    }

    /// Execute, aborting in-flight attempts and backoff sleeps when `token`
    /// is cancelled
    pub async fn execute_with_cancellation<F, Fut, T, E>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        K: ErrorClassifier<E>,
    {
        self.execute_with_outcome_cancellable(token, operation).await.into_result()
    }

    /// Cancellable variant of [`execute_with_outcome`](Self::execute_with_outcome)
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts()))]
    pub async fn execute_with_outcome_cancellable<F, Fut, T, E>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        K: ErrorClassifier<E>,
    {
        self.run(Some(token), operation).await
    }

    async fn run<F, Fut, T, E>(
        &self,
        cancel: Option<&CancellationToken>,
        mut operation: F,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        K: ErrorClassifier<E>,
    {
        let mut attempt: u32 = 0;
        let mut total_delay = Duration::ZERO;
        let finish = |result, attempts, total_delay| RetryOutcome { result, attempts, total_delay };

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return finish(Err(ResilienceError::Cancelled), attempt, total_delay);
            }

            let mut guard = match self.breaker.acquire() {
                Admission::Admitted => ProbeGuard::new(&self.breaker, None),
                Admission::Probe(ticket) => ProbeGuard::new(&self.breaker, Some(ticket)),
                Admission::Rejected { retry_after } => {
                    debug!(attempts = attempt, ?retry_after, "circuit open, call rejected");
                    return finish(
                        Err(ResilienceError::CircuitOpen { retry_after }),
                        attempt,
                        total_delay,
                    );
                }
            };

            let attempts_made = attempt + 1;
            debug!(attempt = attempts_made, "invoking operation");

            let result = match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(attempt = attempts_made, "cancelled during attempt");
                            return finish(Err(ResilienceError::Cancelled), attempts_made, total_delay);
                        }
                        result = operation() => result,
                    }
                }
                None => operation().await,
            };

            let error = match result {
                Ok(value) => {
                    guard.resolve();
                    self.breaker.record_success();
                    if attempt > 0 {
                        debug!(attempts = attempts_made, "operation succeeded after retries");
                    }
                    return finish(Ok(value), attempts_made, total_delay);
                }
                Err(error) => error,
            };

            let classification = self.classifier.classify(&error);
            match classification {
                ErrorClassification::NonRetryableNotFound => {
                    // Dropping the guard releases a held probe slot
                    drop(guard);
                    debug!(error = %error, "resource not found");
                    return finish(
                        Err(ResilienceError::NotFound { source: error }),
                        attempts_made,
                        total_delay,
                    );
                }
                ErrorClassification::NonRetryableAuth => {
                    guard.resolve();
                    self.breaker.record_failure();
                    warn!(error = %error, "authentication rejected, not retrying");
                    return finish(
                        Err(ResilienceError::Authentication { source: error }),
                        attempts_made,
                        total_delay,
                    );
                }
                ErrorClassification::RetryableRateLimit { .. }
                | ErrorClassification::RetryableTransient => {
                    guard.resolve();
                    self.breaker.record_failure();
                }
            }

            if attempt >= self.policy.max_retries {
                warn!(
                    attempts = attempts_made,
                    classification = %classification,
                    error = %error,
                    "retry budget exhausted"
                );
                return finish(
                    Err(ResilienceError::exhausted(classification, attempts_made, error)),
                    attempts_made,
                    total_delay,
                );
            }

            if let Some(retry_after) = self.breaker.remaining_cooldown() {
                debug!(attempts = attempts_made, ?retry_after, "circuit opened, abandoning retries");
                return finish(
                    Err(ResilienceError::CircuitOpen { retry_after: Some(retry_after) }),
                    attempts_made,
                    total_delay,
                );
            }

            let delay = self.policy.delay_for(attempt, classification.retry_after());
            warn!(
                attempt = attempts_made,
                delay_ms = delay.as_millis() as u64,
                classification = %classification,
                error = %error,
                "attempt failed, retrying"
            );

            match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(attempts = attempts_made, "cancelled during backoff");
                            return finish(Err(ResilienceError::Cancelled), attempts_made, total_delay);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }

            total_delay += delay;
            attempt += 1;
        }
    }
}
