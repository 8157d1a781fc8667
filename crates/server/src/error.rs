//! HTTP error mapping.
//!
//! One response shape per error class: validation and auth problems are
//! reported before any side effect, persistence diagnostics are forwarded
//! for operator diagnosis, and notification failures never appear here at
//! all — they travel as data in the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use payment::PaymentError;
use repository::RepositoryError;
use serde_json::json;
use service::ServiceError;

#[derive(Debug)]
pub enum ApiError {
    /// Caller-supplied data failed required-field or type checks.
    Validation(String),
    /// Invalid credentials or malformed/expired token. Deliberately generic:
    /// no detail about which credential failed.
    Unauthorized,
    /// Authenticated but lacking the admin role.
    Forbidden,
    NotFound,
    /// Required third-party credential absent — a deployment defect.
    Configuration(String),
    /// Datastore or downstream failure; detail forwarded for diagnosis.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidOrder(msg) => ApiError::Validation(msg),
            ServiceError::Db(RepositoryError::NotFound) => ApiError::NotFound,
            ServiceError::Db(e) => ApiError::Internal(e.to_string()),
            ServiceError::Unexpected(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidParameters(msg) => ApiError::Validation(msg),
            PaymentError::Configuration(_) => ApiError::Configuration(err.to_string()),
            // Signature mismatches are handled at the webhook boundary with a
            // plain-text 400; reaching here means a non-webhook caller.
            PaymentError::InvalidSignature => ApiError::Validation(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
