//! Integration tests for the resilience module
//!
//! Exercise the breaker and executor together through the public API, the
//! way a platform client composes them: one breaker shared by many concurrent
//! calls.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use custops_common::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitState, ErrorClassification,
    FailureSignal, MockClock, ResilienceError, RetryExecutor, RetryPolicy, StatusClassifier,
};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("upstream returned {status:?}")]
struct UpstreamError {
    status: Option<u16>,
}

impl UpstreamError {
    fn status(code: u16) -> Self {
        Self { status: Some(code) }
    }

    fn network() -> Self {
        Self { status: None }
    }
}

impl FailureSignal for UpstreamError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }
}

fn mock_breaker(threshold: u32, cooldown: Duration) -> (CircuitBreaker<MockClock>, MockClock) {
    let clock = MockClock::new();
    let config = CircuitBreakerConfig::builder()
        .failure_threshold(threshold)
        .cooldown(cooldown)
        .build()
        .expect("valid breaker config");
    let breaker = CircuitBreaker::with_clock(config, clock.clone()).expect("breaker builds");
    (breaker, clock)
}

fn no_delay(max_retries: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .base_delay(Duration::ZERO)
        .max_delay(Duration::ZERO)
        .build()
        .expect("valid retry policy")
}

/// Validates full outage and recovery through the executor.
///
/// # Test Steps
/// 1. Network failures open the circuit after the threshold
/// 2. Calls during cooldown are rejected without reaching the platform
/// 3. After the cooldown one probe succeeds and closes the circuit
#[tokio::test]
async fn test_outage_and_recovery() {
    let (breaker, clock) = mock_breaker(3, Duration::from_secs(60));
    let executor =
        RetryExecutor::new(breaker, no_delay(2), StatusClassifier).expect("executor builds");
    let calls = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&calls);
    let result = executor
        .execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(UpstreamError::network()) }
        })
        .await;
    assert!(matches!(result, Err(ResilienceError::RetriesExhausted { attempts: 3, .. })));
    assert_eq!(executor.breaker().state(), CircuitState::Open);

    clock.advance(Duration::from_secs(30));
    let counter = Arc::clone(&calls);
    let rejected = executor
        .execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, UpstreamError>(()) }
        })
        .await;
    match rejected {
        Err(ResilienceError::CircuitOpen { retry_after }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(30)));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    clock.advance(Duration::from_secs(30));
    let recovered = executor.execute(|| async { Ok::<_, UpstreamError>("ok") }).await;
    assert_eq!(recovered.expect("probe succeeds"), "ok");
    assert_eq!(executor.breaker().state(), CircuitState::Closed);
    assert_eq!(executor.breaker().metrics().times_opened, 1);
}

/// Validates that concurrent calls racing a half-open circuit produce one probe.
///
/// Ten tasks call through the same executor while the probe is held open by
/// a gate; exactly one reaches the platform, the rest are rejected.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_single_probe() {
    let (breaker, clock) = mock_breaker(5, Duration::from_secs(60));
    for _ in 0..5 {
        breaker.record_failure();
    }
    clock.advance(Duration::from_secs(60));

    let executor = Arc::new(
        RetryExecutor::new(breaker, no_delay(0), StatusClassifier).expect("executor builds"),
    );
    let invocations = Arc::new(AtomicU32::new(0));
    let (gate_tx, gate_rx) = tokio::sync::watch::channel(false);

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let executor = Arc::clone(&executor);
            let invocations = Arc::clone(&invocations);
            let gate_rx = gate_rx.clone();
            tokio::spawn(async move {
                executor
                    .execute(move || {
                        let invocations = Arc::clone(&invocations);
                        let mut gate = gate_rx.clone();
                        async move {
                            invocations.fetch_add(1, Ordering::SeqCst);
                            let _ = gate.wait_for(|open| *open).await;
                            Ok::<_, UpstreamError>(())
                        }
                    })
                    .await
            })
        })
        .collect();

    tokio::time::timeout(Duration::from_secs(5), async {
        while executor.breaker().metrics().total_rejections < 9 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("nine callers rejected while the probe is in flight");
    gate_tx.send(true).expect("probe still waiting on the gate");

    let results = futures::future::join_all(tasks).await;
    let successes = results.iter().filter(|r| matches!(r, Ok(Ok(())))).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(ResilienceError::CircuitOpen { .. }))))
        .count();

    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(successes, 1);
    assert_eq!(rejected, 9);
    assert_eq!(executor.breaker().state(), CircuitState::Closed);
}

/// Validates that a custom closure classifier drives the executor.
#[tokio::test]
async fn test_custom_classifier() {
    let (breaker, _clock) = mock_breaker(5, Duration::from_secs(60));
    let classifier = |error: &UpstreamError| match error.status {
        Some(418) => ErrorClassification::NonRetryableAuth,
        _ => ErrorClassification::RetryableTransient,
    };
    let executor = RetryExecutor::new(breaker, no_delay(3), classifier).expect("executor builds");

    let result = executor.execute(|| async { Err::<(), _>(UpstreamError::status(418)) }).await;
    assert!(matches!(result, Err(ResilienceError::Authentication { .. })));
    assert_eq!(executor.breaker().failure_count(), 1);
}

/// Validates that the breaker can be driven directly without the executor.
#[test]
fn test_manual_breaker_usage() {
    let (breaker, clock) = mock_breaker(2, Duration::from_secs(5));

    assert!(breaker.allow());
    breaker.record_failure();
    breaker.record_failure();
    assert!(!breaker.allow());

    clock.advance(Duration::from_secs(5));
    let Admission::Probe(ticket) = breaker.acquire() else {
        panic!("expected probe after cooldown");
    };
    breaker.release_probe(ticket);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    assert!(breaker.allow());
    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}
