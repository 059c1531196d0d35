//! Client-side fetch wrapper over the Victry API envelopes.
//!
//! [`ApiClient`] performs the network call, negotiates content (JSON
//! envelope, plain text, or binary), classifies failures into the error
//! taxonomy, and optionally retries through the same backoff primitive the
//! server-side executor uses ([`crate::retry`]). Its retryability gate is
//! wider than the taxonomy default: from the client's seat any 5xx is worth
//! another attempt.

use crate::error::{ApiError, ApiResult, ErrorCategory, ErrorCode};
use crate::logging::log_debug;
use crate::response::{ErrorBody, SuccessBody};
use crate::retry::{with_retry, RetryOptions, RetryPolicy};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Infer a taxonomy category from a bare HTTP status.
///
/// Used when a failing response carries no recognizable error envelope (or an
/// envelope without a code); the payload's explicit classification always
/// wins over this table.
pub fn category_for_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        401 => ErrorCategory::Auth,
        403 => ErrorCategory::Permission,
        404 => ErrorCategory::NotFound,
        408 => ErrorCategory::Network,
        409 => ErrorCategory::Conflict,
        429 => ErrorCategory::RateLimit,
        500 | 501 => ErrorCategory::Server,
        502..=504 => ErrorCategory::Service,
        code if (400..500).contains(&code) => ErrorCategory::Validation,
        _ => ErrorCategory::Server,
    }
}

/// Client-side retryability: 5xx, 429, transport failures, or an explicitly
/// retryable code.
pub fn client_should_retry(error: &ApiError, _attempt: u32) -> bool {
    if let Some(code) = error.code {
        if code.is_retryable() {
            return true;
        }
    }
    matches!(
        error.category,
        ErrorCategory::Network
            | ErrorCategory::Service
            | ErrorCategory::Server
            | ErrorCategory::RateLimit
    )
}

/// One outgoing request: method, URL, headers, optional JSON body, and
/// whether failures should be retried.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Retry gate for this request. GETs default to retrying; mutations do
    /// not, since the wrapper cannot know they are idempotent.
    pub retry: bool,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retry: true,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
            retry: false,
        }
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
            retry: false,
        }
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retry: false,
        }
    }

    /// Add a header.
    ///
    /// # Errors
    ///
    /// Returns a validation [`ApiError`] when the name or value is not a
    /// legal HTTP header.
    pub fn header(mut self, name: &str, value: &str) -> ApiResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::validation(format!("invalid header name: {e}"), vec![]))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::validation(format!("invalid header value: {e}"), vec![]))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add a bearer `Authorization` header.
    pub fn bearer(mut self, token: &str) -> ApiResult<Self> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ApiError::validation(format!("invalid bearer token: {e}"), vec![]))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }
}

/// Classify a transport-level failure (no HTTP response at all).
pub fn classify_transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        return ApiError::new(ErrorCategory::Network, "request timed out")
            .with_code(ErrorCode::NetworkTimeout)
            .with_cause(error);
    }
    if error.is_connect() {
        return ApiError::new(ErrorCategory::Network, "connection failed")
            .with_code(ErrorCode::NetworkConnectionError)
            .with_cause(error);
    }
    ApiError::new(ErrorCategory::Network, format!("network error: {error}")).with_cause(error)
}

/// Fetch wrapper speaking the Victry envelopes.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    retry_policy: RetryPolicy,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::default())
    }

    pub fn with_retry_policy(retry_policy: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            retry_policy,
        }
    }

    /// Fetch and unwrap a JSON response.
    ///
    /// A body shaped like the success envelope has its `data` unwrapped; any
    /// other JSON body is deserialized directly (raw passthrough). A body
    /// shaped like the error envelope is raised as a classified [`ApiError`],
    /// with the category inferred from the HTTP status when the payload
    /// carries no code.
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        self.with_request_retry(request, || self.fetch_json_once(request))
            .await
    }

    /// [`Self::fetch_json`] plus a caller-supplied validator over the decoded
    /// payload. A failing validator raises a `service`-category error,
    /// distinct from transport failures.
    pub async fn fetch_json_validated<T, V>(
        &self,
        request: &ApiRequest,
        validate: V,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> Result<(), String> + Send + Sync,
    {
        let value = self.fetch_json::<T>(request).await?;
        if let Err(reason) = validate(&value) {
            return Err(ApiError::new(
                ErrorCategory::Service,
                format!("response failed validation: {reason}"),
            )
            .with_code(ErrorCode::ServiceInvalidResponse));
        }
        Ok(value)
    }

    /// Fetch a plain-text response (error envelopes are still recognized).
    pub async fn fetch_text(&self, request: &ApiRequest) -> ApiResult<String> {
        self.with_request_retry(request, || async {
            let response = self.execute_raw(request).await?;
            response.text().await.map_err(classify_transport_error)
        })
        .await
    }

    /// Fetch a binary response (error envelopes are still recognized).
    pub async fn fetch_bytes(&self, request: &ApiRequest) -> ApiResult<Vec<u8>> {
        self.with_request_retry(request, || async {
            let response = self.execute_raw(request).await?;
            let bytes = response.bytes().await.map_err(classify_transport_error)?;
            Ok(bytes.to_vec())
        })
        .await
    }

    async fn with_request_retry<T, F, Fut>(
        &self,
        request: &ApiRequest,
        operation: F,
    ) -> ApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ApiResult<T>>,
    {
        if !request.retry {
            return operation().await;
        }
        let options = RetryOptions {
            policy: self.retry_policy.clone(),
            should_retry: Some(Box::new(client_should_retry)),
            ..RetryOptions::default()
        };
        with_retry(operation, &options).await
    }

    async fn fetch_json_once<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let response = self.execute_raw(request).await?;
        let bytes = response.bytes().await.map_err(classify_transport_error)?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::new(ErrorCategory::Service, "response was not valid JSON")
                .with_code(ErrorCode::ServiceInvalidResponse)
                .with_cause(e)
        })?;

        let decoded = if value.get("data").is_some() {
            serde_json::from_value::<SuccessBody<T>>(value).map(|envelope| envelope.data)
        } else {
            serde_json::from_value::<T>(value)
        };

        decoded.map_err(|e| {
            ApiError::new(
                ErrorCategory::Service,
                "response did not match the expected shape",
            )
            .with_code(ErrorCode::ServiceInvalidResponse)
            .with_cause(e)
        })
    }

    /// Send the request and classify failures; only a success status passes
    /// through.
    async fn execute_raw(&self, request: &ApiRequest) -> ApiResult<reqwest::Response> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .json(body);
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        log_debug!(
            status = status.as_u16(),
            url = %request.url,
            "Request failed with error status"
        );
        Err(classify_error_response(status, &text))
    }
}

/// Turn a failing response into a classified [`ApiError`].
///
/// An error-envelope payload supplies message, code, validation details and
/// request ID; the category comes from the code when present, else from the
/// status table. Anything else degrades to a status-classified generic error.
pub fn classify_error_response(status: StatusCode, body: &str) -> ApiError {
    if let Ok(envelope) = serde_json::from_str::<ErrorBody>(body) {
        if !envelope.error.is_empty() {
            let category = envelope
                .code
                .map(ErrorCode::category)
                .unwrap_or_else(|| category_for_status(status));
            let mut error = ApiError::new(category, envelope.error);
            error.code = envelope.code;
            error.validation_errors = envelope.validation_errors;
            error.request_id = envelope.request_id;
            return error;
        }
    }

    let snippet: String = body.chars().take(200).collect();
    let message = if snippet.is_empty() {
        format!("request failed with status {status}")
    } else {
        format!("request failed with status {status}: {snippet}")
    };
    ApiError::new(category_for_status(status), message)
}
