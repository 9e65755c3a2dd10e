use std::future::Future;

use custops_common::{
    CircuitBreaker, CircuitState, CommonResult, ErrorDisposition, ErrorSeverity, RetryExecutor,
    RetryOutcome, StatusClassifier,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::Platform;
use crate::config::ResilienceSettings;
use crate::errors::{IntegrationError, IntegrationResult};
use crate::http::{PlatformFailure, PlatformResponse};

/// One platform's breaker and retry executor
///
/// Clones share the breaker, so every clone of a client sees the same circuit.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    platform: Platform,
    executor: RetryExecutor<StatusClassifier>,
}

impl ResilientCaller {
    pub fn new(platform: Platform, settings: &ResilienceSettings) -> CommonResult<Self> {
        let breaker = CircuitBreaker::new(settings.breaker_config()?)?;
        let executor = RetryExecutor::new(breaker, settings.retry_policy(), StatusClassifier)?;
        Ok(Self { platform, executor })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        self.executor.breaker()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.executor.breaker().state()
    }

    /// Run `operation` under the platform's breaker and retry policy
    ///
    /// Intermediate failures are retried or absorbed; only the terminal
    /// outcome reaches the caller.
    #[instrument(skip_all, fields(platform = %self.platform, operation = operation_name))]
    pub async fn call<F, Fut, T>(&self, operation_name: &'static str, operation: F) -> IntegrationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformFailure>>,
    {
        let outcome = self.executor.execute_with_outcome(operation).await;
        self.settle(outcome)
    }

    /// Like [`call`](Self::call), abandoning the attempt or backoff sleep in
    /// progress when `token` is cancelled
    #[instrument(skip_all, fields(platform = %self.platform, operation = operation_name))]
    pub async fn call_with_cancellation<F, Fut, T>(
        &self,
        operation_name: &'static str,
        token: &CancellationToken,
        operation: F,
    ) -> IntegrationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformFailure>>,
    {
        let outcome = self.executor.execute_with_outcome_cancellable(token, operation).await;
        self.settle(outcome)
    }

    fn settle<T>(&self, outcome: RetryOutcome<T, PlatformFailure>) -> IntegrationResult<T> {
        let attempts = outcome.attempts;

        match outcome.result {
            Ok(value) => {
                if attempts > 1 {
                    info!(attempts, total_delay_ms = outcome.total_delay.as_millis() as u64, "call succeeded after retries");
                } else {
                    debug!("call succeeded");
                }
                Ok(value)
            }
            Err(err) => Err(self.report(IntegrationError::from_resilience(self.platform, err), attempts)),
        }
    }

    fn report(&self, err: IntegrationError, attempts: u32) -> IntegrationError {
        let error_type = err.error_type_name();
        let state = self.circuit_state();
        match err.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                error!(error_type, attempts, %state, error = %err, "call failed");
            }
            ErrorSeverity::Warning => {
                warn!(error_type, attempts, %state, error = %err, disposition = %err.disposition(), "call failed");
            }
            ErrorSeverity::Info => {
                info!(error_type, attempts, %state, error = %err, "call failed");
            }
        }
        err
    }
}

/// Decode a 2xx body; an undecodable body is never retried
pub(crate) fn decode<T: DeserializeOwned>(
    platform: Platform,
    response: &PlatformResponse,
) -> IntegrationResult<T> {
    response.json().map_err(|err| IntegrationError::invalid_response(platform, err))
}
