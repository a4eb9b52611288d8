//! Caller identity endpoint.

use axum::{Extension, Json};
use serde::Serialize;

use crate::{middleware::auth::AuthContext, models::api_key::Role};

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub key_id: i32,
    pub role: Role,
}

/// Report the identity the auth gate attached to this request.
///
/// `GET /api/v1/whoami`, any authenticated key.
///
/// ```json
/// { "key_id": 3, "role": "user" }
/// ```
pub async fn whoami(Extension(auth): Extension<AuthContext>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        key_id: auth.key_id,
        role: auth.role,
    })
}
