//! Configuration for victry-core components.
//!
//! Everything is an explicitly constructed value: build a [`CoreConfig`] at
//! process start (from code or [`CoreConfig::from_env`]), validate it, and
//! hand the pieces to the components that need them. There are no implicit
//! module-level singletons.

use crate::error::{ApiError, ApiResult};
use crate::logger::{ConsoleTransport, HttpTransport, HttpTransportConfig, LogLevel, Logger};
use crate::logging::log_debug;
use crate::rate_limit::{RateLimiter, DEFAULT_SWEEP_INTERVAL};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Database collaborator settings (PostgREST-style endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub retry_policy: RetryPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: None,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl DatabaseConfig {
    /// # Errors
    ///
    /// Returns a validation [`ApiError`] when the base URL is empty or the
    /// API key is missing.
    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.is_empty() {
            return Err(ApiError::validation("database base URL is required", vec![]));
        }
        if self.api_key.is_none() {
            return Err(ApiError::validation("database API key is required", vec![]));
        }
        Ok(())
    }
}

/// AI analysis collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiServiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Temperature-like control forwarded with analysis requests.
    pub default_temperature: f64,
    pub retry_policy: RetryPolicy,
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            default_temperature: 0.7,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl AiServiceConfig {
    /// # Errors
    ///
    /// Returns a validation [`ApiError`] when the base URL is empty, the API
    /// key is missing, or the temperature is out of `[0, 1]`.
    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.is_empty() {
            return Err(ApiError::validation("AI base URL is required", vec![]));
        }
        if self.api_key.is_none() {
            return Err(ApiError::validation("AI API key is required", vec![]));
        }
        if !(0.0..=1.0).contains(&self.default_temperature) {
            return Err(ApiError::validation(
                format!(
                    "AI temperature must be within [0, 1], got {}",
                    self.default_temperature
                ),
                vec![],
            ));
        }
        Ok(())
    }
}

/// Logger settings: global minimum level and an optional shipping endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub min_level: LogLevel,
    /// Collector endpoint; when set, an HTTP transport is added.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            endpoint: None,
            api_key: None,
        }
    }
}

impl LoggingConfig {
    /// Construct the logger this configuration describes: a console transport
    /// always, plus an HTTP transport when an endpoint is configured.
    pub fn build_logger(&self) -> Logger {
        let mut transports: Vec<Box<dyn crate::logger::Transport>> =
            vec![Box::new(ConsoleTransport::new())];
        if let Some(endpoint) = &self.endpoint {
            transports.push(Box::new(HttpTransport::new(HttpTransportConfig {
                endpoint: endpoint.clone(),
                api_key: self.api_key.clone(),
                ..HttpTransportConfig::default()
            })));
        }
        Logger::new(self.min_level, transports)
    }
}

/// Rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RateLimitConfig {
    pub fn build_limiter(&self) -> RateLimiter {
        RateLimiter::with_sweep_interval(self.sweep_interval)
    }
}

/// Top-level configuration for the resilience core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub ai: AiServiceConfig,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
}

impl CoreConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first section's validation [`ApiError`].
    pub fn validate(&self) -> ApiResult<()> {
        self.database.validate()?;
        self.ai.validate()?;
        Ok(())
    }

    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `VICTRY_DATABASE_URL`, `VICTRY_DATABASE_API_KEY`,
    /// `VICTRY_AI_BASE_URL`, `VICTRY_AI_API_KEY`, `VICTRY_LOG_LEVEL`,
    /// `VICTRY_LOG_ENDPOINT`, `VICTRY_LOG_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns a validation [`ApiError`] when `VICTRY_LOG_LEVEL` is set to an
    /// unknown level name.
    pub fn from_env() -> ApiResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VICTRY_DATABASE_URL") {
            config.database.base_url = url;
        }
        if let Ok(key) = std::env::var("VICTRY_DATABASE_API_KEY") {
            config.database.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("VICTRY_AI_BASE_URL") {
            config.ai.base_url = url;
        }
        if let Ok(key) = std::env::var("VICTRY_AI_API_KEY") {
            config.ai.api_key = Some(key);
        }
        if let Ok(level) = std::env::var("VICTRY_LOG_LEVEL") {
            config.logging.min_level = level.parse()?;
        }
        if let Ok(endpoint) = std::env::var("VICTRY_LOG_ENDPOINT") {
            config.logging.endpoint = Some(endpoint);
        }
        if let Ok(key) = std::env::var("VICTRY_LOG_API_KEY") {
            config.logging.api_key = Some(key);
        }

        log_debug!(
            database_url = %config.database.base_url,
            has_database_key = config.database.api_key.is_some(),
            ai_url = %config.ai.base_url,
            has_ai_key = config.ai.api_key.is_some(),
            log_level = %config.logging.min_level,
            "Loaded configuration from environment"
        );

        Ok(config)
    }
}

impl CoreConfig {
    /// Convenience for tests and local tools: defaults plus the two API keys
    /// that `validate` insists on.
    pub fn with_keys(database_api_key: impl Into<String>, ai_api_key: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.database.api_key = Some(database_api_key.into());
        config.ai.api_key = Some(ai_api_key.into());
        config
    }
}
