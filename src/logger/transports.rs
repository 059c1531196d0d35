//! Log transports: the sinks a [`Logger`](super::Logger) dispatches to.
//!
//! The console transport forwards into `tracing` so the crate keeps a single
//! observability backbone; the HTTP transport ships records to a collector
//! endpoint from a background task. Which transports exist is decided at
//! construction time by configuration, never by runtime environment sniffing.

use super::{LogEntry, LogLevel};
use crate::logging::{log_debug, log_error, log_info, log_warn};
use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// A named log sink with an optional level gate of its own.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable name used in fallback diagnostics.
    fn name(&self) -> &str;

    /// Transport-specific minimum level; `None` defers to the logger's gate.
    fn min_level(&self) -> Option<LogLevel> {
        None
    }

    /// Hand one record to the sink.
    async fn deliver(&self, entry: &LogEntry) -> anyhow::Result<()>;

    /// Flush buffered records and release resources. Default: nothing to do.
    async fn shutdown(&self) {}
}

/// Forwards records into `tracing` events at the matching level.
#[derive(Debug, Default)]
pub struct ConsoleTransport {
    min_level: Option<LogLevel>,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_level(min_level: LogLevel) -> Self {
        Self {
            min_level: Some(min_level),
        }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn min_level(&self) -> Option<LogLevel> {
        self.min_level
    }

    async fn deliver(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let source = entry.source.as_deref().unwrap_or("-");
        let request_id = entry.request_id.as_deref().unwrap_or("-");
        let error = entry.error.as_deref().unwrap_or("");

        match entry.level {
            LogLevel::Debug => log_debug!(
                source = source,
                request_id = request_id,
                "{}",
                entry.message
            ),
            LogLevel::Info => log_info!(
                source = source,
                request_id = request_id,
                "{}",
                entry.message
            ),
            LogLevel::Warn => log_warn!(
                source = source,
                request_id = request_id,
                error = error,
                "{}",
                entry.message
            ),
            LogLevel::Error => log_error!(
                source = source,
                request_id = request_id,
                error = error,
                "{}",
                entry.message
            ),
            // tracing has no fatal level; mark it on the error event instead
            LogLevel::Fatal => log_error!(
                source = source,
                request_id = request_id,
                error = error,
                fatal = true,
                "{}",
                entry.message
            ),
        }
        Ok(())
    }
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Collector endpoint receiving JSON log records via POST.
    pub endpoint: String,
    /// Optional API key sent as the `x-api-key` header.
    pub api_key: Option<String>,
    /// Transport-specific minimum level.
    pub min_level: Option<LogLevel>,
    /// Bounded queue size between callers and the shipping task.
    pub queue_capacity: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            min_level: None,
            queue_capacity: 1024,
        }
    }
}

/// Ships records to a collector endpoint from a background task.
///
/// `deliver` enqueues without blocking; a full queue is a delivery error, not
/// a stall for the caller. `shutdown` closes the queue and waits for the task
/// to drain what is left.
pub struct HttpTransport {
    min_level: Option<LogLevel>,
    tx: Mutex<Option<mpsc::Sender<LogEntry>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(Self::run_worker(rx, config.endpoint, config.api_key));

        Self {
            min_level: config.min_level,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn run_worker(
        mut rx: mpsc::Receiver<LogEntry>,
        endpoint: String,
        api_key: Option<String>,
    ) {
        let client = reqwest::Client::new();

        while let Some(entry) = rx.recv().await {
            let mut request = client.post(&endpoint).json(&entry);
            if let Some(key) = &api_key {
                request = request.header("x-api-key", key);
            }

            // Failures here cannot flow back through the logger that produced
            // the record; stderr is the fallback channel.
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    eprintln!(
                        "victry-core: log collector returned {} for {}",
                        response.status(),
                        endpoint
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    eprintln!("victry-core: failed to ship log record: {err}");
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn min_level(&self) -> Option<LogLevel> {
        self.min_level
    }

    async fn deliver(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().context("http transport already shut down")?;
        tx.try_send(entry.clone())
            .context("http transport queue full or closed")?;
        Ok(())
    }

    async fn shutdown(&self) {
        // Dropping the sender closes the queue; the worker drains the rest.
        self.tx.lock().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(err) = worker.await {
                eprintln!("victry-core: log shipping task failed to join: {err}");
            }
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("min_level", &self.min_level)
            .finish()
    }
}
