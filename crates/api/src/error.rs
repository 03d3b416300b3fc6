//! API error types with HTTP response mapping.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use workflow::WorkflowError;

const UNAVAILABLE: &str = "Service temporarily unavailable, please retry";
const INTERNAL: &str = "Internal server error";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid bearer token.
    Unauthenticated(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Offer or deal workflow error.
    Workflow(WorkflowError),
}

impl ApiError {
    /// Status code and client-facing message.
    ///
    /// Store failures are logged here and replaced with a generic message.
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Workflow(err) => workflow_error_to_response(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        metrics::counter!("http_errors_total", "status" => status.as_str().to_string())
            .increment(1);

        let body = serde_json::json!({ "error": message });
        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        DomainError::InvalidState(msg) | DomainError::Validation(msg) => {
            (StatusCode::BAD_REQUEST, msg)
        }
        DomainError::Store(ref e) if e.is_transient() => {
            tracing::warn!(error = %e, "document store unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE.to_string())
        }
        other => {
            tracing::error!(error = %other, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn workflow_error_to_response(err: WorkflowError) -> (StatusCode, String) {
    match err {
        WorkflowError::Domain(err) => domain_error_to_response(err),
        WorkflowError::Timeout(limit) => {
            tracing::warn!(?limit, "workflow operation timed out");
            (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE.to_string())
        }
        WorkflowError::Inconsistent(msg) => (StatusCode::CONFLICT, msg),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<common::IdParseError> for ApiError {
    fn from(err: common::IdParseError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
