// Shared helpers for the unit test suite.

use crate::logger::{LogEntry, LogLevel, Transport};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Captured log entries, shared between a test and its transport.
pub type CapturedEntries = Arc<Mutex<Vec<LogEntry>>>;

/// Transport that records every delivered entry for inspection.
pub struct CaptureTransport {
    name: String,
    min_level: Option<LogLevel>,
    entries: CapturedEntries,
}

impl CaptureTransport {
    pub fn new(name: &str) -> (Self, CapturedEntries) {
        let entries: CapturedEntries = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name: name.to_string(),
                min_level: None,
                entries: Arc::clone(&entries),
            },
            entries,
        )
    }

    pub fn with_min_level(name: &str, min_level: LogLevel) -> (Self, CapturedEntries) {
        let (mut transport, entries) = Self::new(name);
        transport.min_level = Some(min_level);
        (transport, entries)
    }
}

#[async_trait]
impl Transport for CaptureTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_level(&self) -> Option<LogLevel> {
        self.min_level
    }

    async fn deliver(&self, entry: &LogEntry) -> anyhow::Result<()> {
        self.entries
            .lock()
            .expect("capture transport poisoned")
            .push(entry.clone());
        Ok(())
    }
}

/// Transport that fails every delivery, for isolation tests.
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    fn name(&self) -> &str {
        "failing"
    }

    async fn deliver(&self, _entry: &LogEntry) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("transport intentionally broken"))
    }
}

/// Retry policy with short, jitter-free delays to keep tests fast and
/// deterministic.
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_factor: 2.0,
        jitter: 0.0,
    }
}
