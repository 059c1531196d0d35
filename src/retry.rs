//! Retry execution with exponential backoff and jitter.
//!
//! Every database and AI-service call in Victry flows through [`with_retry`]:
//! - Exponential backoff: 100ms, 200ms, 400ms, ... capped at 5s by default
//! - Jitter widens each delay into `[base*(1-j), base*(1+j)]` to avoid
//!   synchronized retry storms across concurrent callers
//! - Retryability is decided by the error taxonomy unless overridden per call
//! - An optional [`CancelSignal`] aborts the sleep-and-retry loop promptly
//!
//! Attempts within one invocation are strictly sequential: attempt N+1 never
//! starts before attempt N has settled and its delay has elapsed. The same
//! backoff primitive ([`calculate_exponential_delay`]) serves both this
//! executor and the client fetch wrapper.

use crate::error::{ApiError, ApiResult};
use crate::logging::log_warn;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Backoff shape for one retry sequence.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first. `1` means no retries.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the computed backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt for exponential growth.
    pub backoff_factor: f64,
    /// Jitter fraction in `[0, 1]`; `0.1` widens delays by ±10%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            backoff_factor: 2.0,
            jitter: 0.1,
        }
    }
}

/// Cooperative cancellation for a retry sequence.
///
/// Cloning shares the signal; firing it makes every waiting [`with_retry`]
/// return a `server_cancelled` error instead of the last operational one.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has been fired.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of the signal, so this only
        // returns Err after every handle is gone; treat that as cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call retry predicate: `(error, attempt) -> retry?`.
pub type ShouldRetryFn = Box<dyn Fn(&ApiError, u32) -> bool + Send + Sync>;
/// Per-call delay override: `(attempt, policy) -> delay`.
pub type CalculateDelayFn = Box<dyn Fn(u32, &RetryPolicy) -> Duration + Send + Sync>;
/// Observer invoked before each backoff sleep: `(error, attempt, delay)`.
pub type OnRetryFn = Box<dyn Fn(&ApiError, u32, Duration) + Send + Sync>;

/// Options for one [`with_retry`] invocation.
///
/// Merged over [`RetryPolicy::default`]; immutable for the duration of the
/// sequence. All hooks are optional: the taxonomy's retryability and the
/// exponential-with-jitter delay are the defaults.
pub struct RetryOptions {
    pub policy: RetryPolicy,
    pub should_retry: Option<ShouldRetryFn>,
    pub calculate_delay: Option<CalculateDelayFn>,
    pub on_retry: Option<OnRetryFn>,
    pub cancel: Option<CancelSignal>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            should_retry: None,
            calculate_delay: None,
            on_retry: None,
            cancel: None,
        }
    }
}

impl From<RetryPolicy> for RetryOptions {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("policy", &self.policy)
            .field("should_retry", &self.should_retry.is_some())
            .field("calculate_delay", &self.calculate_delay.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

/// Compute the backoff delay for `attempt` (1-based).
///
/// `base = min(initial_delay * backoff_factor^(attempt-1), max_delay)`; the
/// final delay lands in `[base*(1-jitter), base*(1+jitter)]`. With
/// `jitter = 0` the result equals `base` exactly and is non-decreasing in
/// `attempt` up to the cap.
pub fn calculate_exponential_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let base = (policy.initial_delay.as_secs_f64() * policy.backoff_factor.powi(exponent))
        .min(policy.max_delay.as_secs_f64());

    if policy.jitter <= 0.0 {
        return Duration::from_secs_f64(base);
    }

    let spread = 1.0 - policy.jitter + fastrand::f64() * policy.jitter * 2.0;
    Duration::from_secs_f64((base * spread).max(0.0))
}

/// Run `operation`, retrying transient failures per `options`.
///
/// State machine per invocation: execute; on success return immediately; on
/// failure stop if the attempt ceiling is reached or the predicate declines,
/// otherwise sleep the computed delay and go again. The attempt-count ceiling
/// is an unconditional backstop regardless of the predicate.
///
/// # Errors
///
/// Propagates the last operation error, or a `server_cancelled` [`ApiError`]
/// when the cancel signal fires before or between attempts.
pub async fn with_retry<T, F, Fut>(operation: F, options: &RetryOptions) -> ApiResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let policy = &options.policy;
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 1;

    loop {
        if let Some(cancel) = &options.cancel {
            if cancel.is_cancelled() {
                return Err(ApiError::cancelled("operation cancelled before attempt"));
            }
        }

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let retry_wanted = match &options.should_retry {
            Some(predicate) => predicate(&error, attempt),
            None => error.is_retryable(),
        };

        if attempt >= max_attempts || !retry_wanted {
            return Err(error);
        }

        let delay = match &options.calculate_delay {
            Some(calculate) => calculate(attempt, policy),
            None => calculate_exponential_delay(attempt, policy),
        };

        log_warn!(
            attempt = attempt,
            max_attempts = max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying after delay"
        );

        if let Some(on_retry) = &options.on_retry {
            on_retry(&error, attempt, delay);
        }

        match &options.cancel {
            Some(cancel) => {
                tokio::select! {
                    () = sleep(delay) => {}
                    () = cancel.cancelled() => {
                        return Err(ApiError::cancelled("operation cancelled during backoff"));
                    }
                }
            }
            None => sleep(delay).await,
        }

        attempt += 1;
    }
}
