//! Structured, multi-transport logging.
//!
//! A [`Logger`] is a pure dispatcher: it filters by level, builds one
//! [`LogEntry`] per call, and hands it to every registered [`Transport`].
//! All I/O lives in the transports; a failing transport is reported to a
//! fallback channel and never blocks the others.
//!
//! Loggers are explicitly constructed and passed around (no process-wide
//! singleton); call [`Logger::shutdown`] at teardown to flush transports.
//! [`Logger::child`] derives a logger with the same transports and a new
//! `source` tag, leaving the parent untouched.

pub mod transports;

use crate::error::{ApiError, ErrorCategory, ErrorCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

pub use transports::{ConsoleTransport, HttpTransport, HttpTransportConfig, Transport};

/// Severity ordering: debug < info < warn < error < fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(ApiError::validation(
                format!("unknown log level: {other}"),
                vec![],
            )),
        }
    }
}

/// One log record, built per call and handed to each passing transport.
///
/// Serializes to the wire shape shipped to server transports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Optional per-call context merged into the [`LogEntry`].
#[derive(Debug, Clone, Default)]
pub struct LogFields {
    pub user_id: Option<String>,
    pub request_id: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub error_code: Option<ErrorCode>,
    pub stack: Option<String>,
}

impl LogFields {
    /// Populate the error-related fields from an [`ApiError`].
    pub fn from_error(error: &ApiError) -> Self {
        Self {
            request_id: error.request_id.clone(),
            error: Some(error.message.clone()),
            error_category: Some(error.category),
            error_code: error.code,
            stack: error.cause_chain(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

/// Level-filtered dispatcher over an ordered list of transports.
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    source: Option<String>,
    transports: Arc<Vec<Box<dyn Transport>>>,
}

impl Logger {
    /// Build a logger over the given transports.
    pub fn new(min_level: LogLevel, transports: Vec<Box<dyn Transport>>) -> Self {
        Self {
            min_level,
            source: None,
            transports: Arc::new(transports),
        }
    }

    /// Derive a logger with `source` overridden; transports and level are
    /// shared, the parent is not mutated.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            min_level: self.min_level,
            source: Some(source.into()),
            transports: Arc::clone(&self.transports),
        }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Dispatch one record to every transport whose level gate passes.
    ///
    /// The logger's own `min_level` is checked first; a transport may then
    /// impose a stricter (or looser, within the logger's gate) minimum of its
    /// own. Delivery failures are reported to stderr so one broken transport
    /// cannot block the others or fail the caller.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>, fields: LogFields) {
        if level < self.min_level {
            return;
        }

        let entry = LogEntry {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            source: self.source.clone(),
            user_id: fields.user_id,
            request_id: fields.request_id,
            metadata: fields.metadata,
            error: fields.error,
            error_category: fields.error_category,
            error_code: fields.error_code,
            stack: fields.stack,
        };

        for transport in self.transports.iter() {
            if let Some(transport_min) = transport.min_level() {
                if level < transport_min {
                    continue;
                }
            }
            if let Err(err) = transport.deliver(&entry).await {
                eprintln!(
                    "victry-core: log transport '{}' failed: {err:#}",
                    transport.name()
                );
            }
        }
    }

    pub async fn debug(&self, message: impl Into<String>, fields: LogFields) {
        self.log(LogLevel::Debug, message, fields).await;
    }

    pub async fn info(&self, message: impl Into<String>, fields: LogFields) {
        self.log(LogLevel::Info, message, fields).await;
    }

    pub async fn warn(&self, message: impl Into<String>, fields: LogFields) {
        self.log(LogLevel::Warn, message, fields).await;
    }

    pub async fn error(&self, message: impl Into<String>, fields: LogFields) {
        self.log(LogLevel::Error, message, fields).await;
    }

    pub async fn fatal(&self, message: impl Into<String>, fields: LogFields) {
        self.log(LogLevel::Fatal, message, fields).await;
    }

    /// Flush and tear down every transport. Call once at process shutdown.
    pub async fn shutdown(&self) {
        for transport in self.transports.iter() {
            transport.shutdown().await;
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level)
            .field("source", &self.source)
            .field(
                "transports",
                &self
                    .transports
                    .iter()
                    .map(|t| t.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
