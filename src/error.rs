//! Error taxonomy for Victry API operations.
//!
//! This module provides structured error handling for all Victry operations,
//! including categorization, HTTP status resolution, and retry guidance.
//!
//! # Error Types
//!
//! The main error type is [`ApiError`], which carries a closed [`ErrorCategory`]
//! and an optional finer-grained [`ErrorCode`]:
//! - Categories drive the default HTTP status and coarse retry policy
//! - Codes refine select categories and may override the category status
//! - Validation failures carry per-field [`ValidationError`] entries
//!
//! # Error Handling Example
//!
//! ```rust,no_run
//! use victry_core::{ApiError, ErrorCategory};
//!
//! fn handle_error(err: ApiError) {
//!     // Check if we should retry
//!     if err.is_retryable() {
//!         println!("Retryable error: {}", err);
//!         // Implement retry logic...
//!     }
//!
//!     // Resolve the HTTP status for the response envelope
//!     println!("status: {}", err.status());
//!
//!     // Check error category for routing
//!     match err.category {
//!         ErrorCategory::Validation => {
//!             println!("Fix the request and try again");
//!         }
//!         ErrorCategory::RateLimit => {
//!             println!("Back off and retry later");
//!         }
//!         _ => {
//!             println!("System issue, contact support");
//!         }
//!     }
//! }
//! ```
//!
//! # Result Type
//!
//! Use [`ApiResult<T>`] as a convenient alias for `Result<T, ApiError>`:
//!
//! ```rust
//! use victry_core::ApiResult;
//!
//! fn my_function() -> ApiResult<String> {
//!     Ok("Success".to_string())
//! }
//! ```

use crate::logging::{log_error, log_warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error categorization types
// ============================================================================

/// Closed set of failure categories.
///
/// Every category maps to exactly one default HTTP status; codes under a
/// category may override it via [`ErrorCode::status_override`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Authentication failures (missing/expired session, bad credentials).
    Auth,
    /// Authenticated but not allowed to touch the resource.
    Permission,
    /// Request input failed validation.
    Validation,
    /// Requested resource does not exist (or is hidden by ownership rules).
    NotFound,
    /// Write conflicts with existing state (duplicates, stale versions).
    Conflict,
    /// Caller exceeded a rate limit.
    RateLimit,
    /// A downstream service misbehaved or is unavailable.
    Service,
    /// Database-layer failure.
    Database,
    /// AI analysis collaborator failure.
    Ai,
    /// Internal server error or unclassified failure.
    Server,
    /// Filesystem or stream I/O failure.
    Io,
    /// Transport-level network failure.
    Network,
}

impl ErrorCategory {
    /// Default HTTP status for this category.
    pub fn default_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Auth => 401,
            Self::Permission => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::RateLimit => 429,
            Self::Server => 500,
            Self::Database => 500,
            Self::Io => 500,
            Self::Ai => 502,
            Self::Service => 503,
            Self::Network => 503,
        }
    }

    /// Whether errors of this category are worth retrying at all.
    ///
    /// Client-input categories (validation, auth, permission, not_found,
    /// conflict) are excluded: retrying them cannot change the outcome.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Database | Self::Service | Self::RateLimit
        )
    }

    /// Snake_case wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimit => "rate_limit",
            Self::Service => "service",
            Self::Database => "database",
            Self::Ai => "ai",
            Self::Server => "server",
            Self::Io => "io",
            Self::Network => "network",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained error codes nested under the categories.
///
/// A code, when present, may override its category's default status
/// (e.g. [`ErrorCode::ServerNotImplemented`] resolves to 501 inside the
/// `server` category, default 500). Codes are stable wire identifiers for
/// client-side branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // auth
    AuthInvalidCredentials,
    AuthSessionExpired,
    AuthTokenInvalid,
    AuthMfaRequired,
    AuthEmailNotVerified,
    // permission
    PermissionDenied,
    PermissionOwnershipRequired,
    // validation
    ValidationRequiredField,
    ValidationInvalidFormat,
    ValidationOutOfRange,
    ValidationTooLong,
    // not_found
    NotFoundResume,
    NotFoundJobDescription,
    NotFoundUser,
    NotFoundResource,
    // conflict
    ConflictDuplicateEntry,
    ConflictForeignKey,
    ConflictStaleVersion,
    // rate_limit
    RateLimitExceeded,
    // service
    ServiceUnavailable,
    ServiceTimeout,
    ServiceInvalidResponse,
    // database
    DatabaseConnectionError,
    DatabaseQueryError,
    DatabaseUndefinedTable,
    DatabaseTransactionError,
    DatabaseTimeout,
    // ai
    AiServiceError,
    AiContextTooLong,
    AiContentFiltered,
    AiInvalidResponse,
    // server
    ServerInternalError,
    ServerNotImplemented,
    ServerCancelled,
    // io
    IoReadError,
    IoWriteError,
    IoFileNotFound,
    // network
    NetworkTimeout,
    NetworkConnectionError,
    NetworkDnsError,
}

impl ErrorCode {
    /// The category this code belongs to.
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::AuthInvalidCredentials
            | Self::AuthSessionExpired
            | Self::AuthTokenInvalid
            | Self::AuthMfaRequired
            | Self::AuthEmailNotVerified => ErrorCategory::Auth,
            Self::PermissionDenied | Self::PermissionOwnershipRequired => ErrorCategory::Permission,
            Self::ValidationRequiredField
            | Self::ValidationInvalidFormat
            | Self::ValidationOutOfRange
            | Self::ValidationTooLong => ErrorCategory::Validation,
            Self::NotFoundResume
            | Self::NotFoundJobDescription
            | Self::NotFoundUser
            | Self::NotFoundResource => ErrorCategory::NotFound,
            Self::ConflictDuplicateEntry
            | Self::ConflictForeignKey
            | Self::ConflictStaleVersion => ErrorCategory::Conflict,
            Self::RateLimitExceeded => ErrorCategory::RateLimit,
            Self::ServiceUnavailable | Self::ServiceTimeout | Self::ServiceInvalidResponse => {
                ErrorCategory::Service
            }
            Self::DatabaseConnectionError
            | Self::DatabaseQueryError
            | Self::DatabaseUndefinedTable
            | Self::DatabaseTransactionError
            | Self::DatabaseTimeout => ErrorCategory::Database,
            Self::AiServiceError
            | Self::AiContextTooLong
            | Self::AiContentFiltered
            | Self::AiInvalidResponse => ErrorCategory::Ai,
            Self::ServerInternalError | Self::ServerNotImplemented | Self::ServerCancelled => {
                ErrorCategory::Server
            }
            Self::IoReadError | Self::IoWriteError | Self::IoFileNotFound => ErrorCategory::Io,
            Self::NetworkTimeout | Self::NetworkConnectionError | Self::NetworkDnsError => {
                ErrorCategory::Network
            }
        }
    }

    /// Status override for codes that deviate from their category default.
    pub fn status_override(self) -> Option<u16> {
        match self {
            Self::AuthEmailNotVerified => Some(403),
            Self::AiContextTooLong => Some(400),
            Self::ServerNotImplemented => Some(501),
            Self::IoFileNotFound => Some(404),
            _ => None,
        }
    }

    /// Whether this specific code marks a transient, retryable condition.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded
                | Self::ServiceUnavailable
                | Self::ServiceTimeout
                | Self::DatabaseConnectionError
                | Self::DatabaseTransactionError
                | Self::DatabaseTimeout
                | Self::NetworkTimeout
                | Self::NetworkConnectionError
                | Self::NetworkDnsError
        )
    }

    /// Snake_case wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthInvalidCredentials => "auth_invalid_credentials",
            Self::AuthSessionExpired => "auth_session_expired",
            Self::AuthTokenInvalid => "auth_token_invalid",
            Self::AuthMfaRequired => "auth_mfa_required",
            Self::AuthEmailNotVerified => "auth_email_not_verified",
            Self::PermissionDenied => "permission_denied",
            Self::PermissionOwnershipRequired => "permission_ownership_required",
            Self::ValidationRequiredField => "validation_required_field",
            Self::ValidationInvalidFormat => "validation_invalid_format",
            Self::ValidationOutOfRange => "validation_out_of_range",
            Self::ValidationTooLong => "validation_too_long",
            Self::NotFoundResume => "not_found_resume",
            Self::NotFoundJobDescription => "not_found_job_description",
            Self::NotFoundUser => "not_found_user",
            Self::NotFoundResource => "not_found_resource",
            Self::ConflictDuplicateEntry => "conflict_duplicate_entry",
            Self::ConflictForeignKey => "conflict_foreign_key",
            Self::ConflictStaleVersion => "conflict_stale_version",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ServiceUnavailable => "service_unavailable",
            Self::ServiceTimeout => "service_timeout",
            Self::ServiceInvalidResponse => "service_invalid_response",
            Self::DatabaseConnectionError => "database_connection_error",
            Self::DatabaseQueryError => "database_query_error",
            Self::DatabaseUndefinedTable => "database_undefined_table",
            Self::DatabaseTransactionError => "database_transaction_error",
            Self::DatabaseTimeout => "database_timeout",
            Self::AiServiceError => "ai_service_error",
            Self::AiContextTooLong => "ai_context_too_long",
            Self::AiContentFiltered => "ai_content_filtered",
            Self::AiInvalidResponse => "ai_invalid_response",
            Self::ServerInternalError => "server_internal_error",
            Self::ServerNotImplemented => "server_not_implemented",
            Self::ServerCancelled => "server_cancelled",
            Self::IoReadError => "io_read_error",
            Self::IoWriteError => "io_write_error",
            Self::IoFileNotFound => "io_file_not_found",
            Self::NetworkTimeout => "network_timeout",
            Self::NetworkConnectionError => "network_connection_error",
            Self::NetworkDnsError => "network_dns_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the HTTP status for a category/code pair.
///
/// The code-specific override wins when registered; the category default is
/// the fallback. This lets one category serve many equally-coded conditions
/// while still allowing exceptions.
pub fn status_code(category: ErrorCategory, code: Option<ErrorCode>) -> u16 {
    code.and_then(ErrorCode::status_override)
        .unwrap_or_else(|| category.default_status())
}

// ============================================================================
// Retryability
// ============================================================================

static RETRYABLE_MESSAGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Keyword sniffing is the last resort for third-party errors without
    // structured shape; structured category/code signals are checked first.
    Regex::new(r"(?i)network|timeout|connection|unavailable|temporary|rate limit|try again")
        .expect("keyword pattern compiles")
});

/// Three-tier retryability decision over whatever error shape is available.
///
/// 1. A known category is trusted outright (membership in the retryable set).
/// 2. Else a known code is trusted (membership in the retryable code set).
/// 3. Else the message is scanned for transient-failure keywords.
///
/// Falls back to `false` when nothing matches.
pub fn is_retryable_error(
    category: Option<ErrorCategory>,
    code: Option<ErrorCode>,
    message: Option<&str>,
) -> bool {
    if let Some(category) = category {
        return category.is_retryable();
    }
    if let Some(code) = code {
        return code.is_retryable();
    }
    if let Some(message) = message {
        return RETRYABLE_MESSAGE_PATTERN.is_match(message);
    }
    false
}

// ============================================================================
// ApiError
// ============================================================================

/// Convenient result type for Victry operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path of the offending field (e.g. `sections[0].title`).
    pub field: String,
    /// Human-readable description of what is wrong with it.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The error type that crosses every Victry boundary.
///
/// Created once per failure and immutable after construction; serialized
/// directly as the HTTP error envelope (minus [`ApiError::cause`], which is
/// kept for local logging only and never reaches the client).
///
/// # Creating Errors
///
/// Use the constructor methods, which log at creation with structured fields:
///
/// ```rust
/// use victry_core::ApiError;
///
/// let err = ApiError::auth("session has expired");
/// let err = ApiError::not_found("resume", Some("r1"));
/// let err = ApiError::server("worker pool exhausted");
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable message, safe to serialize to the client.
    pub message: String,
    /// Coarse classification; always present.
    pub category: ErrorCategory,
    /// Finer-grained code for client-side branching.
    pub code: Option<ErrorCode>,
    /// Field-level details for validation failures.
    pub validation_errors: Vec<ValidationError>,
    /// Correlates the failure with a request, when known.
    pub request_id: Option<String>,
    /// Underlying error; logged locally, never serialized.
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    /// Create a bare error with a category and message.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category,
            code: None,
            validation_errors: Vec::new(),
            request_id: None,
            cause: None,
        }
    }

    /// Attach a fine-grained code.
    #[must_use]
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a request ID for correlation.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach the underlying error. Logged at creation, never serialized.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        log_error!(
            category = %self.category,
            message = %self.message,
            cause = %cause,
            "API error cause attached"
        );
        self.cause = Some(Box::new(cause));
        self
    }

    /// Resolve the HTTP status for this error (code override, else category).
    pub fn status(&self) -> u16 {
        status_code(self.category, self.code)
    }

    /// Whether the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        is_retryable_error(Some(self.category), self.code, Some(&self.message))
    }

    /// Render the source chain for log records. `None` when there is no cause.
    pub fn cause_chain(&self) -> Option<String> {
        let mut source = std::error::Error::source(self);
        let mut chain = Vec::new();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        if chain.is_empty() {
            None
        } else {
            Some(chain.join(": "))
        }
    }

    // =========================================================================
    // Specialized constructors with automatic logging
    // =========================================================================
    //
    // These fix category/code and format the message. Use them instead of
    // constructing the struct directly.

    /// Create a validation error with field-level details (logs at WARN level).
    pub fn validation(message: impl Into<String>, errors: Vec<ValidationError>) -> Self {
        let message = message.into();
        log_warn!(
            error_category = "validation",
            message = %message,
            field_count = errors.len(),
            "Request validation failed"
        );
        Self {
            message,
            category: ErrorCategory::Validation,
            code: Some(ErrorCode::ValidationInvalidFormat),
            validation_errors: errors,
            request_id: None,
            cause: None,
        }
    }

    /// Create an authentication error (logs at WARN level).
    pub fn auth(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_category = "auth",
            message = %message,
            "Authentication failed"
        );
        Self::new(ErrorCategory::Auth, message).with_code(ErrorCode::AuthInvalidCredentials)
    }

    /// Create a permission error (logs at WARN level).
    pub fn permission(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_category = "permission",
            message = %message,
            "Permission denied"
        );
        Self::new(ErrorCategory::Permission, message).with_code(ErrorCode::PermissionDenied)
    }

    /// Create a not-found error for a named resource.
    ///
    /// Selects a resource-specific code by case-insensitive match on
    /// `resource` and formats the message as `<resource> with ID <id> not
    /// found` (or `<resource> not found` when no ID is given).
    pub fn not_found(resource: &str, id: Option<&str>) -> Self {
        let code = match resource.to_ascii_lowercase().as_str() {
            "resume" => ErrorCode::NotFoundResume,
            "job description" | "job_description" => ErrorCode::NotFoundJobDescription,
            "user" => ErrorCode::NotFoundUser,
            _ => ErrorCode::NotFoundResource,
        };
        let message = match id {
            Some(id) => format!("{resource} with ID {id} not found"),
            None => format!("{resource} not found"),
        };
        log_warn!(
            error_category = "not_found",
            error_code = %code,
            resource = resource,
            id = id.unwrap_or("-"),
            "Resource not found"
        );
        Self::new(ErrorCategory::NotFound, message).with_code(code)
    }

    /// Create a generic server error (logs at ERROR level).
    pub fn server(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_category = "server",
            message = %message,
            "Internal server error"
        );
        Self::new(ErrorCategory::Server, message).with_code(ErrorCode::ServerInternalError)
    }

    /// Create the distinct cancelled outcome used by the retry executor.
    pub fn cancelled(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_category = "server",
            error_code = "server_cancelled",
            message = %message,
            "Operation cancelled"
        );
        Self::new(ErrorCategory::Server, message).with_code(ErrorCode::ServerCancelled)
    }
}
