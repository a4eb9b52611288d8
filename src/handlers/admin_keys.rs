//! Key administration HTTP handlers.
//!
//! This module implements the admin-only key endpoints:
//! - GET /admin/keys - List key metadata
//! - POST /admin/keys/create - Create a key and return its one-time credential
//! - POST /admin/keys/{id}/activate - Re-enable a key
//! - POST /admin/keys/{id}/deactivate - Revoke a key without deleting it
//!
//! All of them sit behind the auth gate with the admin role required.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::api_key::{ApiKeyResponse, CreateKeyRequest},
    state::AppState,
};

/// List all keys.
///
/// # Response
///
/// - **Success (200 OK)**: Array of key metadata, ordered by id
/// - **Error (503)**: Storage unavailable
///
/// ```json
/// [
///   {
///     "id": 1,
///     "label": "master-admin",
///     "role": "admin",
///     "rate_limit": 2147483647,
///     "is_active": true,
///     "created_at": "2025-12-20T10:00:00Z",
///     "last_used": "2025-12-21T08:12:44Z"
///   }
/// ]
/// ```
///
/// Neither the credential nor its hash is ever included.
pub async fn list_keys(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = state.key_admin.list_keys().await?;

    Ok(Json(keys))
}

/// Create a new key.
///
/// # Request Body
///
/// ```json
/// {
///   "label": "reporting job",
///   "role": "user",
///   "rate_limit": 60
/// }
/// ```
///
/// Every field is optional. A missing or unparseable body is treated as `{}`;
/// well-formed JSON with a field of the wrong type or range is rejected.
///
/// # Response
///
/// - **Success (201 Created)**: Returns the key including `api_key`, shown only this once
/// - **Error (400)**: Unknown role, negative rate limit, or a mistyped field
/// - **Error (503)**: Storage unavailable
///
/// ```json
/// {
///   "id": 2,
///   "api_key": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
///   "label": "reporting job",
///   "role": "user",
///   "rate_limit": 60
/// }
/// ```
pub async fn create_key(
    State(state): State<AppState>,
    body: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::JsonDataError(e)) => {
            return Err(AppError::InvalidRequest(e.body_text()));
        }
        Err(_) => CreateKeyRequest::default(),
    };

    let created = state.key_admin.create_key(request).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Re-enable a deactivated key.
///
/// # Response
///
/// - **Success (200 OK)**: Updated key metadata
/// - **Error (404)**: Unknown key id
pub async fn activate_key(
    State(state): State<AppState>,
    Path(key_id): Path<i32>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let key = state.key_admin.set_key_active(key_id, true).await?;

    Ok(Json(key))
}

/// Deactivate a key (soft delete).
///
/// The record is kept; its credential stops authenticating immediately.
///
/// # Response
///
/// - **Success (200 OK)**: Updated key metadata
/// - **Error (404)**: Unknown key id
pub async fn deactivate_key(
    State(state): State<AppState>,
    Path(key_id): Path<i32>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let key = state.key_admin.set_key_active(key_id, false).await?;

    Ok(Json(key))
}
