//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
/// The authentication variants are kept distinct because callers rely on
/// telling a configuration problem apart from throttling.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No `X-API-Key` header, or an empty one.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Missing X-API-Key header")]
    MissingCredential,

    /// The credential does not resolve to an active key.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Invalid or inactive API key")]
    InvalidCredential,

    /// The key is valid but its role is below what the endpoint requires.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Admin access required")]
    InsufficientRole,

    /// The key has used up its per-minute quota.
    ///
    /// Returns HTTP 429 Too Many Requests with the applicable limit.
    #[error("Rate limit exceeded")]
    QuotaExceeded { limit: i32 },

    /// Storage could not be reached or did not answer in time.
    ///
    /// Returns HTTP 503 Service Unavailable (hides details from client).
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    /// The initial admin key could not be created at startup.
    ///
    /// Only ever logged; it never reaches a client.
    #[error("Bootstrap failed: {0}")]
    BootstrapFailure(StoreError),

    /// Requested key id does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    KeyNotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// `QuotaExceeded` additionally carries `"limit": "<n>/min"` at the top level.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::MissingCredential => (
                StatusCode::UNAUTHORIZED,
                "missing_credential",
                self.to_string(),
            ),
            AppError::InvalidCredential => {
                (StatusCode::FORBIDDEN, "invalid_credential", self.to_string())
            }
            AppError::InsufficientRole => {
                (StatusCode::FORBIDDEN, "insufficient_role", self.to_string())
            }
            AppError::QuotaExceeded { limit } => {
                let body = Json(json!({
                    "error": {
                        "code": "quota_exceeded",
                        "message": self.to_string()
                    },
                    "limit": format!("{limit}/min")
                }));
                return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            }
            AppError::KeyNotFound => (StatusCode::NOT_FOUND, "key_not_found", self.to_string()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::StorageUnavailable(StoreError::Duplicate) => (
                StatusCode::CONFLICT,
                "duplicate_key",
                "A key with this credential already exists".to_string(),
            ),
            AppError::StorageUnavailable(_) | AppError::BootstrapFailure(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_unavailable",
                "Storage unavailable".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_errors_map_to_distinct_statuses() {
        assert_eq!(
            AppError::MissingCredential.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidCredential.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::InsufficientRole.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::QuotaExceeded { limit: 2 }.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::StorageUnavailable(StoreError::Timeout)
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn duplicate_hash_is_a_conflict_not_an_outage() {
        assert_eq!(
            AppError::StorageUnavailable(StoreError::Duplicate)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::StorageUnavailable(StoreError::Unavailable("down".to_string()))
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn quota_body_carries_limit() {
        let response = AppError::QuotaExceeded { limit: 2 }.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["limit"], "2/min");
        assert_eq!(body["error"]["code"], "quota_exceeded");
    }
}
