// Unit Tests for the Retry Executor
//
// UNIT UNDER TEST: with_retry, calculate_exponential_delay, RetryOptions
//
// BUSINESS RESPONSIBILITY:
//   - Retries transient failures with exponential backoff and jitter
//   - Enforces the attempt ceiling unconditionally, whatever the predicate says
//   - Short-circuits on non-retryable errors without burning attempts
//   - Keeps attempts strictly sequential within one invocation
//   - Aborts promptly on cancellation with a distinct outcome
//
// TEST COVERAGE:
//   - Default option values and the documented backoff progression
//   - Attempt counting for success, exhaustion, and short-circuit paths
//   - Jitter-free delay exactness and jittered delay bounds
//   - on_retry observation and custom delay overrides
//   - Cancellation before an attempt and during the backoff sleep

use crate::error::{ApiError, ErrorCategory, ErrorCode};
use crate::retry::{
    calculate_exponential_delay, with_retry, CancelSignal, RetryOptions, RetryPolicy,
};
use crate::tests::helpers::fast_retry_policy;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn transient_error() -> ApiError {
    ApiError::new(ErrorCategory::Network, "connection reset").with_code(ErrorCode::NetworkTimeout)
}

fn client_input_error() -> ApiError {
    ApiError::validation("missing field", vec![])
}

#[test]
fn test_retry_policy_defaults_match_documented_values() {
    // Test verifies the default policy matches the documented contract
    // Ensures call sites merging over defaults get the expected schedule

    let policy = RetryPolicy::default();

    assert_eq!(policy.max_attempts, 3, "Should allow 3 attempts by default");
    assert_eq!(
        policy.initial_delay,
        Duration::from_millis(100),
        "First retry should wait 100ms"
    );
    assert_eq!(
        policy.max_delay,
        Duration::from_millis(5000),
        "Backoff should cap at 5 seconds"
    );
    assert_eq!(
        policy.backoff_factor, 2.0,
        "Delay should double each attempt"
    );
    assert_eq!(policy.jitter, 0.1, "Delays should spread by ±10%");
}

#[test]
fn test_jitter_free_delay_is_exact_and_non_decreasing() {
    // Test verifies the backoff formula with jitter disabled:
    // min(initial * factor^(attempt-1), max), exactly

    let policy = RetryPolicy {
        jitter: 0.0,
        ..RetryPolicy::default()
    };

    assert_eq!(calculate_exponential_delay(1, &policy).as_millis(), 100);
    assert_eq!(calculate_exponential_delay(2, &policy).as_millis(), 200);
    assert_eq!(calculate_exponential_delay(3, &policy).as_millis(), 400);
    assert_eq!(calculate_exponential_delay(4, &policy).as_millis(), 800);
    assert_eq!(calculate_exponential_delay(6, &policy).as_millis(), 3200);
    assert_eq!(
        calculate_exponential_delay(7, &policy).as_millis(),
        5000,
        "6400ms is clipped by the 5s cap"
    );
    assert_eq!(
        calculate_exponential_delay(20, &policy).as_millis(),
        5000,
        "The cap holds for arbitrarily late attempts"
    );

    let mut previous = Duration::ZERO;
    for attempt in 1..=10 {
        let delay = calculate_exponential_delay(attempt, &policy);
        assert!(
            delay >= previous,
            "delay must be non-decreasing in the attempt number"
        );
        previous = delay;
    }
}

#[test]
fn test_jittered_delay_stays_inside_the_documented_band() {
    // Test verifies jitter widens the delay into [base*(1-j), base*(1+j)]
    // Ensures concurrent callers spread out instead of retrying in lockstep

    let policy = RetryPolicy::default();
    let base = Duration::from_millis(200); // attempt 2

    for _ in 0..200 {
        let delay = calculate_exponential_delay(2, &policy);
        assert!(
            delay >= base.mul_f64(0.9) && delay <= base.mul_f64(1.1),
            "jittered delay {delay:?} escaped the ±10% band around {base:?}"
        );
    }
}

#[tokio::test]
async fn test_successful_operation_requires_no_retries() {
    // Test verifies a first-try success returns immediately
    // Ensures no delay or extra attempt is spent on the happy path

    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();
    let options = RetryOptions::from(fast_retry_policy());

    let result = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>("tailored")
        },
        &options,
    )
    .await;

    assert_eq!(result.expect("operation should succeed"), "tailored");
    assert_eq!(
        counter.load(Ordering::SeqCst),
        1,
        "Should only call the operation once when it succeeds"
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_until_success() {
    // Test verifies the documented scenario: fail twice, succeed on the third
    // attempt, with jitter-free delays of exactly 100ms then 200ms

    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();
    let timestamps: Arc<Mutex<Vec<tokio::time::Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let stamps = timestamps.clone();

    let options = RetryOptions {
        policy: RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        },
        ..RetryOptions::default()
    };

    let result = with_retry(
        || {
            let calls = calls.clone();
            let stamps = stamps.clone();
            async move {
                stamps.lock().expect("timestamps").push(tokio::time::Instant::now());
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(transient_error())
                } else {
                    Ok::<_, ApiError>("recovered")
                }
            }
        },
        &options,
    )
    .await;

    assert_eq!(result.expect("third attempt should succeed"), "recovered");
    assert_eq!(counter.load(Ordering::SeqCst), 3, "Exactly 3 calls expected");

    let stamps = timestamps.lock().expect("timestamps");
    assert_eq!(
        (stamps[1] - stamps[0]).as_millis(),
        100,
        "First backoff should be exactly 100ms with jitter disabled"
    );
    assert_eq!(
        (stamps[2] - stamps[1]).as_millis(),
        200,
        "Second backoff should be exactly 200ms with jitter disabled"
    );
}

#[tokio::test]
async fn test_attempt_ceiling_is_an_unconditional_backstop() {
    // Test verifies an always-true predicate still terminates at max_attempts
    // Ensures the ceiling cannot be bypassed by a permissive predicate

    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();
    let options = RetryOptions {
        policy: fast_retry_policy(),
        should_retry: Some(Box::new(|_, _| true)),
        ..RetryOptions::default()
    };

    let result: Result<(), ApiError> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        },
        &options,
    )
    .await;

    assert!(result.is_err(), "Exhausted retries propagate the last error");
    assert_eq!(
        counter.load(Ordering::SeqCst),
        3,
        "Should stop at exactly max_attempts calls"
    );
}

#[tokio::test]
async fn test_predicate_short_circuits_before_the_ceiling() {
    // Test verifies a declining predicate stops the sequence immediately
    // Ensures no further attempt is issued once retrying is pointless

    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();
    let options = RetryOptions {
        policy: fast_retry_policy(),
        should_retry: Some(Box::new(|_, attempt| attempt < 2)),
        ..RetryOptions::default()
    };

    let result: Result<(), ApiError> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        },
        &options,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(
        counter.load(Ordering::SeqCst),
        2,
        "The attempt after the predicate declines must never run"
    );
}

#[tokio::test]
async fn test_single_attempt_policy_never_retries() {
    // Test verifies max_attempts = 1 means the first failure is terminal

    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();
    let options = RetryOptions {
        policy: RetryPolicy {
            max_attempts: 1,
            ..fast_retry_policy()
        },
        ..RetryOptions::default()
    };

    let result: Result<(), ApiError> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        },
        &options,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(counter.load(Ordering::SeqCst), 1, "No retry is ever issued");
}

#[tokio::test]
async fn test_default_predicate_rejects_client_input_errors() {
    // Test verifies the taxonomy drives the default retry decision
    // Ensures validation failures fail fast instead of wasting attempts

    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();
    let options = RetryOptions::from(fast_retry_policy());

    let result: Result<(), ApiError> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(client_input_error())
        },
        &options,
    )
    .await;

    let error = result.expect_err("validation errors propagate");
    assert_eq!(error.category, ErrorCategory::Validation);
    assert_eq!(
        counter.load(Ordering::SeqCst),
        1,
        "Retrying a client-input error cannot change the outcome"
    );
}

#[tokio::test(start_paused = true)]
async fn test_on_retry_observes_every_backoff() {
    // Test verifies the callback runs once per retry with the attempt number
    // and the delay about to be slept

    let observed: Arc<Mutex<Vec<(u32, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();

    let options = RetryOptions {
        policy: RetryPolicy {
            jitter: 0.0,
            ..fast_retry_policy()
        },
        on_retry: Some(Box::new(move |_, attempt, delay| {
            sink.lock().expect("observed").push((attempt, delay));
        })),
        ..RetryOptions::default()
    };

    let result: Result<(), ApiError> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        },
        &options,
    )
    .await;

    assert!(result.is_err());
    let observed = observed.lock().expect("observed");
    assert_eq!(
        *observed,
        vec![
            (1, Duration::from_millis(10)),
            (2, Duration::from_millis(20))
        ],
        "Callback should see each retry with its computed delay"
    );
}

#[tokio::test]
async fn test_custom_delay_calculation_overrides_the_default() {
    // Test verifies the calculate_delay hook replaces the exponential schedule

    let observed: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();

    let options = RetryOptions {
        policy: fast_retry_policy(),
        calculate_delay: Some(Box::new(|_, _| Duration::from_millis(1))),
        on_retry: Some(Box::new(move |_, _, delay| {
            sink.lock().expect("observed").push(delay);
        })),
        ..RetryOptions::default()
    };

    let result: Result<(), ApiError> =
        with_retry(|| async { Err(transient_error()) }, &options).await;

    assert!(result.is_err());
    assert_eq!(
        *observed.lock().expect("observed"),
        vec![Duration::from_millis(1), Duration::from_millis(1)],
        "Every backoff should use the overridden delay"
    );
}

#[tokio::test]
async fn test_cancellation_before_the_first_attempt() {
    // Test verifies a pre-fired signal aborts without running the operation

    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();
    let cancel = CancelSignal::new();
    cancel.cancel();

    let options = RetryOptions {
        policy: fast_retry_policy(),
        cancel: Some(cancel),
        ..RetryOptions::default()
    };

    let result: Result<(), ApiError> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        },
        &options,
    )
    .await;

    let error = result.expect_err("cancelled sequences must error");
    assert_eq!(error.code, Some(ErrorCode::ServerCancelled));
    assert_eq!(
        counter.load(Ordering::SeqCst),
        0,
        "No attempt should run after cancellation"
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff_wins_over_the_sleep() {
    // Test verifies the distinct cancelled outcome when the signal fires
    // mid-backoff, instead of the last operational error

    let cancel = CancelSignal::new();
    let trigger = cancel.clone();
    let counter = Arc::new(AtomicU32::new(0));
    let calls = counter.clone();

    let options = RetryOptions {
        policy: RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        },
        // Fire the signal just before the executor starts sleeping; the
        // select between sleep and cancellation must pick cancellation.
        on_retry: Some(Box::new(move |_, _, _| trigger.cancel())),
        cancel: Some(cancel),
        ..RetryOptions::default()
    };

    let result: Result<(), ApiError> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        },
        &options,
    )
    .await;

    let error = result.expect_err("cancelled sequences must error");
    assert_eq!(
        error.code,
        Some(ErrorCode::ServerCancelled),
        "The cancelled outcome is distinct from the operational error"
    );
    assert_eq!(
        counter.load(Ordering::SeqCst),
        1,
        "The attempt after the cancelled backoff must never run"
    );
}
