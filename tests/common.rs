//! Test helper utilities for victry-core integration tests
//!
//! This module provides reusable fixtures and helper functions shared across
//! the wiremock-backed test modules.
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use serde_json::json;
use std::time::Duration;
use victry_core::{AiServiceConfig, DatabaseConfig, RetryPolicy};
use wiremock::ResponseTemplate;

/// Create retry policy with fast, jitter-free delays for deterministic tests
pub fn create_fast_test_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_factor: 2.0,
        jitter: 0.0,
    }
}

/// Create retry policy with no retries (for deterministic single-shot tests)
pub fn create_no_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        initial_delay: Duration::from_millis(0),
        max_delay: Duration::from_millis(0),
        backoff_factor: 1.0,
        jitter: 0.0,
    }
}

/// Create a database collaborator config pointing at a mock server
pub fn create_test_database_config(base_url: &str) -> DatabaseConfig {
    DatabaseConfig {
        base_url: base_url.to_string(),
        api_key: Some("test-db-key".to_string()),
        retry_policy: create_fast_test_retry_policy(),
    }
}

/// Create an AI collaborator config pointing at a mock server
pub fn create_test_ai_config(base_url: &str) -> AiServiceConfig {
    AiServiceConfig {
        base_url: base_url.to_string(),
        api_key: Some("test-ai-key".to_string()),
        default_temperature: 0.7,
        retry_policy: create_fast_test_retry_policy(),
    }
}

/// Create a stored resume row as the database endpoint would return it
pub fn create_resume_row(id: &str, owner: &str, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": owner,
        "title": title,
        "target_job_title": "Staff Engineer",
        "content": { "sections": [] }
    })
}

/// Create a success-envelope response for the Victry API
pub fn create_success_envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": data,
        "requestId": "req-test-1"
    }))
}

/// Create an error-envelope response with an explicit code
pub fn create_error_envelope(status: u16, message: &str, code: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": message,
        "code": code,
        "requestId": "req-test-2"
    }))
}

/// Create a vendor database error response (`{code, message, details}`)
pub fn create_database_error_response(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "code": code,
        "message": message,
        "details": null
    }))
}

/// Create a vendor AI error response (`{status, error: {type, message}}`)
pub fn create_ai_error_response(status: u16, kind: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "status": status,
        "error": { "type": kind, "message": message }
    }))
}
