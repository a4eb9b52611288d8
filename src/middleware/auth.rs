//! API key authentication and rate limiting middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the `X-API-Key` header
//! 2. Resolve it to an identity (master credential or stored key)
//! 3. Enforce the role the route group requires
//! 4. Admit the request against the key's per-minute quota
//! 5. Inject authentication context into the request
//!
//! Each step has its own rejection, so callers can tell a missing key (401)
//! from a bad key or role (403), a throttled key (429), or an outage (503).

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::api_key::{KeyIdentity, Role},
    services::{
        key_store::{UNLIMITED_QUOTA, digests_match, hash_key, hash_prefix},
        rate_limiter::Admission,
    },
    state::AppState,
};

/// Header carrying the raw credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Id reported for requests authenticated with the master credential.
pub const MASTER_KEY_ID: i32 = 0;

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    /// Id of the authenticated key, [`MASTER_KEY_ID`] for the master credential
    pub key_id: i32,

    pub role: Role,
}

/// The gate in front of one group of routes.
///
/// The role the group requires is part of the gate, so user and admin routes
/// are wrapped by two gates over the same state.
#[derive(Clone)]
pub struct AuthGate {
    state: AppState,
    required: Role,
}

impl AuthGate {
    pub fn new(state: AppState, required: Role) -> Self {
        Self { state, required }
    }

    /// Run the full check sequence against a request's headers.
    ///
    /// # Errors
    ///
    /// In check order:
    /// - `MissingCredential`: header absent or blank
    /// - `StorageUnavailable`: key lookup could not reach storage
    /// - `InvalidCredential`: unknown or deactivated key
    /// - `InsufficientRole`: key role below the gate's requirement
    /// - `QuotaExceeded`: key is over its per-minute quota
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<AuthContext, AppError> {
        let raw_key = extract_api_key(headers)?;
        let identity = self.identify(raw_key).await?;

        if !identity.role.satisfies(self.required) {
            tracing::debug!(key_id = identity.id, "Rejected: admin access required");
            return Err(AppError::InsufficientRole);
        }

        match self
            .state
            .rate_limiter
            .admit(&identity.key_hash, identity.rate_limit)
            .await
        {
            Admission::Allowed => Ok(AuthContext {
                key_id: identity.id,
                role: identity.role,
            }),
            Admission::Denied => {
                tracing::info!(
                    key_id = identity.id,
                    limit = identity.rate_limit,
                    "Rejected: rate limit exceeded"
                );
                Err(AppError::QuotaExceeded {
                    limit: identity.rate_limit,
                })
            }
        }
    }

    /// Resolve a credential. The master credential is recognised without
    /// touching storage, so the service stays administrable during an outage.
    async fn identify(&self, raw_key: &str) -> Result<KeyIdentity, AppError> {
        let key_hash = hash_key(raw_key);

        if digests_match(&key_hash, self.state.master_key_hash()) {
            return Ok(KeyIdentity {
                id: MASTER_KEY_ID,
                key_hash,
                role: Role::Admin,
                rate_limit: UNLIMITED_QUOTA,
            });
        }

        match self.state.key_store.lookup(raw_key).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                tracing::debug!(key = hash_prefix(&key_hash), "Rejected: invalid API key");
                Err(AppError::InvalidCredential)
            }
            Err(e) => {
                tracing::error!(error = %e, "Key lookup failed");
                Err(AppError::StorageUnavailable(e))
            }
        }
    }
}

/// Pull the trimmed credential out of `X-API-Key`.
fn extract_api_key(headers: &HeaderMap) -> Result<&str, AppError> {
    let Some(value) = headers.get(API_KEY_HEADER) else {
        tracing::debug!("Rejected: missing API key");
        return Err(AppError::MissingCredential);
    };

    // Present but not valid header text: it cannot match any key.
    let raw_key = value
        .to_str()
        .map_err(|_| AppError::InvalidCredential)?
        .trim();

    if raw_key.is_empty() {
        tracing::debug!("Rejected: empty API key");
        return Err(AppError::MissingCredential);
    }

    Ok(raw_key)
}

/// API key authentication middleware function.
///
/// Install with `from_fn_with_state(AuthGate::new(state, role), auth_middleware)`.
///
/// # Returns
///
/// - `Ok(Response)` if authorized (calls next handler with [`AuthContext`] attached)
/// - `Err(AppError)` with the status of the first failed check
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_context = gate.authorize(request.headers()).await?;

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, config::Config, store::MemoryStore};
    use std::sync::Arc;

    const MASTER: &str = "master-credential";

    fn state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            Config::new("postgres://localhost/test", MASTER),
            store.clone(),
            store.clone(),
            Arc::new(ManualClock::default()),
        );
        (state, store)
    }

    fn headers(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key.parse().unwrap());
        headers
    }

    async fn create(state: &AppState, role: Role, rate_limit: i32) -> String {
        state
            .key_store
            .create("t".to_string(), role, rate_limit)
            .await
            .unwrap()
            .api_key
    }

    #[tokio::test]
    async fn missing_header_is_missing_credential() {
        let (state, _) = state();
        let gate = AuthGate::new(state, Role::User);

        let result = gate.authorize(&HeaderMap::new()).await;

        assert!(matches!(result, Err(AppError::MissingCredential)));
    }

    #[tokio::test]
    async fn blank_header_is_missing_credential() {
        let (state, _) = state();
        let gate = AuthGate::new(state, Role::User);

        let result = gate.authorize(&headers("   ")).await;

        assert!(matches!(result, Err(AppError::MissingCredential)));
    }

    #[tokio::test]
    async fn unknown_key_is_invalid_even_with_zero_quota_keys_around() {
        let (state, _) = state();
        create(&state, Role::User, 0).await;
        let gate = AuthGate::new(state, Role::User);

        let result = gate.authorize(&headers("nope")).await;

        assert!(matches!(result, Err(AppError::InvalidCredential)));
    }

    #[tokio::test]
    async fn role_is_checked_before_quota() {
        let (state, _) = state();
        let key = create(&state, Role::User, 0).await;
        let gate = AuthGate::new(state, Role::Admin);

        let result = gate.authorize(&headers(&key)).await;

        assert!(matches!(result, Err(AppError::InsufficientRole)));
    }

    #[tokio::test]
    async fn over_quota_reports_limit() {
        let (state, _) = state();
        let key = create(&state, Role::User, 1).await;
        let gate = AuthGate::new(state, Role::User);

        gate.authorize(&headers(&key)).await.unwrap();
        let result = gate.authorize(&headers(&key)).await;

        assert!(matches!(result, Err(AppError::QuotaExceeded { limit: 1 })));
    }

    #[tokio::test]
    async fn valid_key_yields_context() {
        let (state, _) = state();
        let key = create(&state, Role::Admin, 5).await;
        let gate = AuthGate::new(state, Role::Admin);

        let context = gate.authorize(&headers(&format!(" {key} "))).await.unwrap();

        assert_eq!(context.role, Role::Admin);
        assert_eq!(context.key_id, 1);
    }

    #[tokio::test]
    async fn master_key_works_during_outage() {
        let (state, store) = state();
        store.set_unavailable(true);
        let gate = AuthGate::new(state, Role::Admin);

        let context = gate.authorize(&headers(MASTER)).await.unwrap();

        assert_eq!(
            context,
            AuthContext {
                key_id: MASTER_KEY_ID,
                role: Role::Admin
            }
        );
    }

    #[tokio::test]
    async fn lookup_outage_is_storage_unavailable() {
        let (state, store) = state();
        let key = create(&state, Role::User, 5).await;
        store.set_unavailable(true);
        let gate = AuthGate::new(state, Role::User);

        let result = gate.authorize(&headers(&key)).await;

        assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn deactivated_key_is_invalid_not_throttled() {
        let (state, _) = state();
        let key = create(&state, Role::User, 1).await;
        let gate = AuthGate::new(state.clone(), Role::User);
        gate.authorize(&headers(&key)).await.unwrap();

        state.key_store.set_active(1, false).await.unwrap();

        for _ in 0..3 {
            let result = gate.authorize(&headers(&key)).await;
            assert!(matches!(result, Err(AppError::InvalidCredential)));
        }
    }
}
