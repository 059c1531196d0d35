//! In-memory fixed-window rate limiting for sensitive operations.
//!
//! Counting is fixed-window, not sliding-window or token-bucket: each
//! identifier holds `{count, reset_at}` and the counter resets at fixed
//! wall-clock intervals. A burst straddling a window boundary can therefore
//! admit up to `2 * limit` requests in a short span; that imprecision is the
//! accepted semantics of this limiter, not a defect.
//!
//! The limiter is a single-process, single-memory-space structure. It
//! provides no cross-process or cross-instance coordination; a horizontally
//! scaled deployment needs an external shared store to keep the same
//! semantics across instances.
//!
//! Lifecycle is explicit: [`RateLimiter::new`] spawns the periodic eviction
//! sweep, [`RateLimiter::destroy`] stops it. No module-level singleton.

use crate::logging::{log_debug, log_warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How often abandoned identifiers are swept out of the map.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Password-reset requests allowed per email address per window.
pub const PASSWORD_RESET_EMAIL_LIMIT: u32 = 5;
/// Password-reset requests allowed per source IP per window.
pub const PASSWORD_RESET_IP_LIMIT: u32 = 10;
/// Window applied to password-reset throttling.
pub const PASSWORD_RESET_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Outcome of one [`RateLimiter::is_allowed`] check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Time until the window resets; populated on denial.
    pub remaining_time: Option<Duration>,
    /// Requests counted in the current window, including this one.
    pub count: u32,
}

/// Snapshot of an identifier's current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub count: u32,
    pub remaining_time: Duration,
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by identifier strings (`email:<addr>`,
/// `ip:<addr>`).
#[derive(Debug)]
pub struct RateLimiter {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter with the default 5-minute eviction sweep.
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a limiter sweeping expired entries every `interval`.
    pub fn with_sweep_interval(interval: Duration) -> Self {
        let entries: Arc<Mutex<HashMap<String, RateLimitEntry>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let sweep_entries = Arc::clone(&entries);

        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so a fresh limiter does
            // not sweep an empty map.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut map = sweep_entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let before = map.len();
                map.retain(|_, entry| entry.reset_at > now);
                let evicted = before - map.len();
                if evicted > 0 {
                    log_debug!(evicted = evicted, "Swept expired rate limit entries");
                }
            }
        });

        Self {
            entries,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Count one request against `identifier` for a `limit`-per-`window`
    /// policy.
    ///
    /// A fresh or expired identifier starts a new window with `count = 1`;
    /// within a live window the request is denied once `count` reaches
    /// `limit`, with `remaining_time` reporting how long until the reset.
    pub fn is_allowed(&self, identifier: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let now = Instant::now();
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        match map.get_mut(identifier) {
            Some(entry) if entry.reset_at > now => {
                if entry.count >= limit {
                    let remaining = entry.reset_at - now;
                    log_warn!(
                        identifier = identifier,
                        count = entry.count,
                        limit = limit,
                        remaining_ms = remaining.as_millis() as u64,
                        "Rate limit exceeded"
                    );
                    return RateLimitDecision {
                        allowed: false,
                        remaining_time: Some(remaining),
                        count: entry.count,
                    };
                }
                entry.count += 1;
                RateLimitDecision {
                    allowed: true,
                    remaining_time: None,
                    count: entry.count,
                }
            }
            _ => {
                map.insert(
                    identifier.to_string(),
                    RateLimitEntry {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining_time: None,
                    count: 1,
                }
            }
        }
    }

    /// Peek at an identifier's window without counting a request.
    ///
    /// Opportunistically evicts the entry when its window has already passed.
    pub fn get_status(&self, identifier: &str) -> Option<RateLimitStatus> {
        let now = Instant::now();
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        match map.get(identifier) {
            Some(entry) if entry.reset_at > now => Some(RateLimitStatus {
                count: entry.count,
                remaining_time: entry.reset_at - now,
            }),
            Some(_) => {
                map.remove(identifier);
                None
            }
            None => None,
        }
    }

    /// Administratively clear an identifier; its next request starts a fresh
    /// window.
    pub fn reset(&self, identifier: &str) {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if map.remove(identifier).is_some() {
            log_debug!(identifier = identifier, "Rate limit entry reset");
        }
    }

    /// Throttle password-reset requests by email address (5 per hour).
    pub fn check_password_reset_email(&self, email: &str) -> RateLimitDecision {
        let key = format!("email:{}", email.to_ascii_lowercase());
        self.is_allowed(&key, PASSWORD_RESET_EMAIL_LIMIT, PASSWORD_RESET_WINDOW)
    }

    /// Throttle password-reset requests by source IP (10 per hour).
    pub fn check_password_reset_ip(&self, ip: &str) -> RateLimitDecision {
        let key = format!("ip:{ip}");
        self.is_allowed(&key, PASSWORD_RESET_IP_LIMIT, PASSWORD_RESET_WINDOW)
    }

    /// Stop the eviction sweep. Entries already in the map remain until
    /// opportunistic eviction or `reset`.
    pub fn destroy(&self) {
        if let Some(handle) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.destroy();
    }
}
