//! Resume storage collaborator.
//!
//! [`ResumeStore`] is the stable interface; [`HttpResumeStore`] implements it
//! over a PostgREST-style endpoint. Ownership is enforced on every operation
//! by filtering on `user_id`, mirroring the row-level security the database
//! applies on its side. Vendor errors (`{code, message, details}`) are
//! translated through [`translate_database_error`] at the boundary.

use crate::client::{classify_transport_error, classify_error_response};
use crate::config::DatabaseConfig;
use crate::error::{ApiError, ApiResult, ErrorCategory, ErrorCode};
use crate::logging::log_debug;
use crate::retry::{with_retry, RetryOptions};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored resume row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_job_title: Option<String>,
    /// Structured section data; validated upstream, opaque here.
    #[serde(default)]
    pub content: Value,
}

/// Payload for creating a resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResume {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_job_title: Option<String>,
    #[serde(default)]
    pub content: Value,
}

/// Partial update for a resume; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

/// Vendor error shape returned by the database layer.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
}

/// Map a vendor database error onto the taxonomy.
///
/// Recognizes the Postgres/PostgREST codes Victry actually hits; anything
/// unrecognized degrades to a generic database error. Never panics, always
/// yields a well-formed [`ApiError`].
pub fn translate_database_error(body: &DatabaseErrorBody) -> ApiError {
    let message = body
        .message
        .clone()
        .unwrap_or_else(|| "database request failed".to_string());

    let (category, code) = match body.code.as_deref() {
        Some("23505") => (ErrorCategory::Conflict, ErrorCode::ConflictDuplicateEntry),
        Some("23503") => (ErrorCategory::Conflict, ErrorCode::ConflictForeignKey),
        Some("23502") => (
            ErrorCategory::Validation,
            ErrorCode::ValidationRequiredField,
        ),
        Some("23514") => (ErrorCategory::Validation, ErrorCode::ValidationOutOfRange),
        Some("42P01") => (ErrorCategory::Database, ErrorCode::DatabaseUndefinedTable),
        Some("PGRST116") => (ErrorCategory::NotFound, ErrorCode::NotFoundResource),
        Some("40001") | Some("40P01") => {
            (ErrorCategory::Database, ErrorCode::DatabaseTransactionError)
        }
        Some("57014") => (ErrorCategory::Database, ErrorCode::DatabaseTimeout),
        Some("57P01") => (ErrorCategory::Database, ErrorCode::DatabaseConnectionError),
        Some(code) if code.starts_with("08") => {
            (ErrorCategory::Database, ErrorCode::DatabaseConnectionError)
        }
        _ => (ErrorCategory::Database, ErrorCode::DatabaseQueryError),
    };

    if let Some(details) = &body.details {
        log_debug!(
            vendor_code = body.code.as_deref().unwrap_or("-"),
            details = %details,
            "Database error details"
        );
    }
    ApiError::new(category, message).with_code(code)
}

/// Translate a failing database HTTP response.
fn translate_database_response(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<DatabaseErrorBody>(body) {
        Ok(vendor) if vendor.code.is_some() || vendor.message.is_some() => {
            translate_database_error(&vendor)
        }
        _ => classify_error_response(status, body),
    }
}

/// CRUD over resumes with ownership checks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn get_resume(&self, owner_id: &str, resume_id: &str) -> ApiResult<Resume>;
    async fn list_resumes(&self, owner_id: &str) -> ApiResult<Vec<Resume>>;
    async fn create_resume(&self, owner_id: &str, resume: &NewResume) -> ApiResult<Resume>;
    async fn update_resume(
        &self,
        owner_id: &str,
        resume_id: &str,
        update: &ResumeUpdate,
    ) -> ApiResult<Resume>;
    async fn delete_resume(&self, owner_id: &str, resume_id: &str) -> ApiResult<()>;
}

/// [`ResumeStore`] over a PostgREST-style REST endpoint.
#[derive(Debug)]
pub struct HttpResumeStore {
    http: reqwest::Client,
    config: DatabaseConfig,
}

impl HttpResumeStore {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn resumes_url(&self, query: &str) -> String {
        format!("{}/rest/v1/resumes?{query}", self.config.base_url)
    }

    fn auth_headers(&self) -> ApiResult<HeaderMap> {
        let key = self.config.api_key.as_deref().ok_or_else(|| {
            ApiError::validation("database API key is not configured", vec![])
        })?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(key)
            .map_err(|e| ApiError::validation(format!("invalid database API key: {e}"), vec![]))?;
        headers.insert("apikey", value);
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| ApiError::validation(format!("invalid database API key: {e}"), vec![]))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// One retried request returning the affected rows.
    async fn send_rows(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> ApiResult<Vec<Resume>> {
        let headers = self.auth_headers()?;
        let options = RetryOptions::from(self.config.retry_policy.clone());

        with_retry(
            || async {
                let mut builder = self
                    .http
                    .request(method.clone(), &url)
                    .headers(headers.clone())
                    .header("Prefer", "return=representation");
                if let Some(body) = &body {
                    builder = builder.json(body);
                }

                let response = builder.send().await.map_err(classify_transport_error)?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(translate_database_response(status, &text));
                }

                response.json::<Vec<Resume>>().await.map_err(|e| {
                    ApiError::new(
                        ErrorCategory::Database,
                        "database returned an unreadable row set",
                    )
                    .with_code(ErrorCode::DatabaseQueryError)
                    .with_cause(e)
                })
            },
            &options,
        )
        .await
    }
}

#[async_trait]
impl ResumeStore for HttpResumeStore {
    async fn get_resume(&self, owner_id: &str, resume_id: &str) -> ApiResult<Resume> {
        let url = self.resumes_url(&format!(
            "id=eq.{resume_id}&user_id=eq.{owner_id}&select=*"
        ));
        let rows = self.send_rows(Method::GET, url, None).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found("resume", Some(resume_id)))
    }

    async fn list_resumes(&self, owner_id: &str) -> ApiResult<Vec<Resume>> {
        let url = self.resumes_url(&format!("user_id=eq.{owner_id}&select=*"));
        self.send_rows(Method::GET, url, None).await
    }

    async fn create_resume(&self, owner_id: &str, resume: &NewResume) -> ApiResult<Resume> {
        let url = self.resumes_url("select=*");
        let mut body = serde_json::to_value(resume).map_err(|e| {
            ApiError::validation("resume payload is not serializable", vec![]).with_cause(e)
        })?;
        if let Some(object) = body.as_object_mut() {
            object.insert("user_id".to_string(), Value::String(owner_id.to_string()));
        }
        let rows = self.send_rows(Method::POST, url, Some(body)).await?;
        rows.into_iter().next().ok_or_else(|| {
            ApiError::new(
                ErrorCategory::Database,
                "insert returned no representation",
            )
            .with_code(ErrorCode::DatabaseQueryError)
        })
    }

    async fn update_resume(
        &self,
        owner_id: &str,
        resume_id: &str,
        update: &ResumeUpdate,
    ) -> ApiResult<Resume> {
        let url = self.resumes_url(&format!("id=eq.{resume_id}&user_id=eq.{owner_id}"));
        let body = serde_json::to_value(update).map_err(|e| {
            ApiError::validation("resume update is not serializable", vec![]).with_cause(e)
        })?;
        let rows = self.send_rows(Method::PATCH, url, Some(body)).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found("resume", Some(resume_id)))
    }

    async fn delete_resume(&self, owner_id: &str, resume_id: &str) -> ApiResult<()> {
        let url = self.resumes_url(&format!("id=eq.{resume_id}&user_id=eq.{owner_id}"));
        let rows = self.send_rows(Method::DELETE, url, None).await?;
        if rows.is_empty() {
            return Err(ApiError::not_found("resume", Some(resume_id)));
        }
        Ok(())
    }
}
