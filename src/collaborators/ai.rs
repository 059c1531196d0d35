//! AI analysis collaborator.
//!
//! [`AiAnalysisService`] is the stable interface the rest of Victry sees: it
//! accepts text plus a temperature-like control and returns structured JSON.
//! The vendor's error shape (`{status, error: {type, message, param?}}`) is
//! translated through [`translate_ai_error`] at the boundary; prompt
//! construction and response post-processing live upstream, not here.

use crate::client::classify_transport_error;
use crate::config::AiServiceConfig;
use crate::error::{ApiError, ApiResult, ErrorCategory, ErrorCode};
use crate::logging::log_debug;
use crate::retry::{with_retry, RetryOptions};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

/// Vendor error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct AiErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    pub error: AiErrorDetail,
}

/// Vendor error detail carried inside [`AiErrorBody`].
#[derive(Debug, Clone, Deserialize)]
pub struct AiErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub param: Option<String>,
}

/// Map a vendor AI error onto the taxonomy.
///
/// Dispatches on the vendor `type` string with a generic `ai` fallback for
/// unrecognized shapes. Never panics, always yields a well-formed
/// [`ApiError`].
pub fn translate_ai_error(status: StatusCode, body: &str) -> ApiError {
    let Ok(vendor) = serde_json::from_str::<AiErrorBody>(body) else {
        return ApiError::new(
            ErrorCategory::Ai,
            format!("AI service returned status {status}"),
        )
        .with_code(ErrorCode::AiServiceError);
    };

    let message = vendor.error.message.clone();
    if let Some(param) = &vendor.error.param {
        log_debug!(
            kind = %vendor.error.kind,
            param = %param,
            "AI error named a request parameter"
        );
    }

    let (category, code) = match vendor.error.kind.as_str() {
        "authentication_error" => (ErrorCategory::Auth, ErrorCode::AuthTokenInvalid),
        "permission_error" => (ErrorCategory::Permission, ErrorCode::PermissionDenied),
        "not_found_error" => (ErrorCategory::NotFound, ErrorCode::NotFoundResource),
        "rate_limit_error" => (ErrorCategory::RateLimit, ErrorCode::RateLimitExceeded),
        "overloaded_error" => (ErrorCategory::Service, ErrorCode::ServiceUnavailable),
        "invalid_request_error" => {
            let lowered = message.to_ascii_lowercase();
            if lowered.contains("context length") || lowered.contains("too long") {
                (ErrorCategory::Ai, ErrorCode::AiContextTooLong)
            } else {
                (
                    ErrorCategory::Validation,
                    ErrorCode::ValidationInvalidFormat,
                )
            }
        }
        _ => (ErrorCategory::Ai, ErrorCode::AiServiceError),
    };

    ApiError::new(category, message).with_code(code)
}

/// Text analysis behind a stable interface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiAnalysisService: Send + Sync {
    /// Analyze `text`, returning the structured JSON the model produced.
    /// `temperature` overrides the configured default when given.
    async fn analyze(&self, text: &str, temperature: Option<f64>) -> ApiResult<Value>;
}

/// [`AiAnalysisService`] over the vendor's HTTP API.
#[derive(Debug)]
pub struct HttpAiAnalysisService {
    http: reqwest::Client,
    config: AiServiceConfig,
}

impl HttpAiAnalysisService {
    pub fn new(config: AiServiceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn auth_headers(&self) -> ApiResult<HeaderMap> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::validation("AI API key is not configured", vec![]))?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(key)
            .map_err(|e| ApiError::validation(format!("invalid AI API key: {e}"), vec![]))?;
        headers.insert("x-api-key", value);
        Ok(headers)
    }
}

#[async_trait]
impl AiAnalysisService for HttpAiAnalysisService {
    async fn analyze(&self, text: &str, temperature: Option<f64>) -> ApiResult<Value> {
        let headers = self.auth_headers()?;
        let url = format!("{}/v1/analyze", self.config.base_url);
        let payload = json!({
            "text": text,
            "temperature": temperature.unwrap_or(self.config.default_temperature),
        });
        let options = RetryOptions::from(self.config.retry_policy.clone());

        with_retry(
            || async {
                let response = self
                    .http
                    .post(&url)
                    .headers(headers.clone())
                    .json(&payload)
                    .send()
                    .await
                    .map_err(classify_transport_error)?;

                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(translate_ai_error(status, &text));
                }

                response.json::<Value>().await.map_err(|e| {
                    ApiError::new(
                        ErrorCategory::Ai,
                        "AI service returned a response that was not JSON",
                    )
                    .with_code(ErrorCode::AiInvalidResponse)
                    .with_cause(e)
                })
            },
            &options,
        )
        .await
    }
}
