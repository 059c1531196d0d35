//! Uniform API response envelopes.
//!
//! Every Victry endpoint answers with one of two JSON shapes:
//! - success: `{ "data": ..., "metadata": ..., "requestId": ... }`
//! - error: `{ "error": ..., "code": ..., "validationErrors": ..., "requestId": ... }`
//!
//! The error status is resolved through the taxonomy ([`crate::error::status_code`]):
//! the code-specific override wins, the category default is the fallback. The
//! client fetch wrapper ([`crate::client::ApiClient`]) recognizes both shapes
//! on the way back in.

use crate::error::{ApiError, ErrorCode, ValidationError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Success envelope wrapping a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error envelope serialized from an [`ApiError`].
///
/// The error's `cause` never appears here; it is for local logging only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl From<&ApiError> for ErrorBody {
    fn from(error: &ApiError) -> Self {
        Self {
            error: error.message.clone(),
            code: error.code,
            validation_errors: error.validation_errors.clone(),
            request_id: error.request_id.clone(),
        }
    }
}

/// A framework-agnostic response: resolved status plus the JSON body.
///
/// Whatever HTTP server fronts the crate turns this into its own response
/// type; the envelope and status policy live here.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// Wrap `data` in the success envelope with status 200.
    pub fn success<T: Serialize>(data: T) -> Self {
        Self::success_with(data, StatusCode::OK, None)
    }

    /// Wrap `data` in the success envelope with an explicit status and
    /// optional metadata. A fresh request ID is attached.
    pub fn success_with<T: Serialize>(data: T, status: StatusCode, metadata: Option<Value>) -> Self {
        let body = SuccessBody {
            data,
            metadata,
            request_id: Some(Uuid::new_v4().to_string()),
        };
        match serde_json::to_value(&body) {
            Ok(body) => Self { status, body },
            // The envelope itself must never fail to materialize; degrade to
            // a well-formed server error instead.
            Err(err) => Self::failure(
                &ApiError::server("failed to serialize response payload").with_cause(err),
            ),
        }
    }

    /// Build the error envelope for `error`, resolving the status through the
    /// taxonomy. A request ID is generated when the error carries none.
    pub fn failure(error: &ApiError) -> Self {
        let mut body = ErrorBody::from(error);
        if body.request_id.is_none() {
            body.request_id = Some(Uuid::new_v4().to_string());
        }

        let status =
            StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_value(&body).unwrap_or_else(|_| {
            serde_json::json!({ "error": "internal serialization failure" })
        });

        Self { status, body }
    }
}
