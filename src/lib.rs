//! # victry-core
//!
//! Resilience core for the Victry resume platform. Every database and AI
//! call in the application flows through this crate's retry, classification,
//! and throttling layers.
//!
//! ## Key Features
//!
//! - **Error Taxonomy**: closed categories and codes driving HTTP status
//!   selection and retry eligibility
//! - **Retry Executor**: exponential backoff with jitter, pluggable
//!   retryability, cooperative cancellation
//! - **Structured Logger**: level-filtered multi-transport dispatch with
//!   child loggers
//! - **Rate Limiter**: in-memory fixed-window throttling for sensitive
//!   operations
//! - **Response Envelopes**: uniform success/error bodies plus the
//!   client-side fetch wrapper that interprets them
//!
//! ## Example
//!
//! ```rust,no_run
//! use victry_core::{with_retry, ApiError, RetryOptions};
//!
//! # async fn example() -> Result<(), ApiError> {
//! let options = RetryOptions::default();
//! let value = with_retry(
//!     || async {
//!         // a database or AI call goes here
//!         Ok::<_, ApiError>("tailored summary".to_string())
//!     },
//!     &options,
//! )
//! .await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

// Allow missing errors documentation - errors are self-documenting via type signatures
#![allow(clippy::missing_errors_doc)]

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod client;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logger;
pub mod rate_limit;
pub mod response;
pub mod retry;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use client::{category_for_status, client_should_retry, ApiClient, ApiRequest};
pub use collaborators::{
    AiAnalysisService, HttpAiAnalysisService, HttpResumeStore, NewResume, Resume, ResumeStore,
    ResumeUpdate,
};
pub use config::{AiServiceConfig, CoreConfig, DatabaseConfig, LoggingConfig, RateLimitConfig};
pub use error::{
    is_retryable_error, status_code, ApiError, ApiResult, ErrorCategory, ErrorCode,
    ValidationError,
};
pub use logger::{
    ConsoleTransport, HttpTransport, HttpTransportConfig, LogEntry, LogFields, LogLevel, Logger,
    Transport,
};
pub use rate_limit::{RateLimitDecision, RateLimitStatus, RateLimiter};
pub use response::{ApiResponse, ErrorBody, SuccessBody};
pub use retry::{
    calculate_exponential_delay, with_retry, CancelSignal, RetryOptions, RetryPolicy,
};
