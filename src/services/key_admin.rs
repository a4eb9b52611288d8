//! Key administration - the privileged operations behind `/admin/keys`.
//!
//! Callers reach this service only after the auth gate has enforced the admin
//! role. Raw credentials pass through here on creation and are never logged.

use crate::{
    error::AppError,
    models::api_key::{ApiKeyResponse, CreateKeyRequest, CreatedKeyResponse, Role},
    services::key_store::KeyStore,
};

const DEFAULT_LABEL: &str = "unnamed";

#[derive(Clone)]
pub struct KeyAdminService {
    key_store: KeyStore,
    default_rate_limit: i32,
}

impl KeyAdminService {
    pub fn new(key_store: KeyStore, default_rate_limit: i32) -> Self {
        Self {
            key_store,
            default_rate_limit,
        }
    }

    /// Create a new key and return its one-time credential.
    ///
    /// # Validation
    ///
    /// - `role`: "user" or "admin", defaults to "user"
    /// - `rate_limit`: zero or more, defaults to the configured quota; zero disables the key's quota
    /// - `label`: any string, defaults to "unnamed"
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: unknown role or negative rate limit
    /// - `StorageUnavailable`: the key could not be persisted
    pub async fn create_key(
        &self,
        request: CreateKeyRequest,
    ) -> Result<CreatedKeyResponse, AppError> {
        let role = match request.role.as_deref() {
            None => Role::default(),
            Some(role) => role.parse::<Role>().map_err(AppError::InvalidRequest)?,
        };

        let rate_limit = request.rate_limit.unwrap_or(self.default_rate_limit);
        if rate_limit < 0 {
            return Err(AppError::InvalidRequest(
                "rate_limit must not be negative".to_string(),
            ));
        }

        let label = request.label.unwrap_or_else(|| DEFAULT_LABEL.to_string());

        let created = self.key_store.create(label, role, rate_limit).await?;

        tracing::info!(
            key_id = created.id,
            label = %created.label,
            role = %created.role,
            rate_limit = created.rate_limit,
            "API key created"
        );

        Ok(created)
    }

    pub async fn list_keys(&self) -> Result<Vec<ApiKeyResponse>, AppError> {
        Ok(self.key_store.list().await?)
    }

    /// Toggle a key's activation state.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound`: no key with this id
    /// - `StorageUnavailable`: storage could not be reached
    pub async fn set_key_active(&self, id: i32, active: bool) -> Result<ApiKeyResponse, AppError> {
        let key = self
            .key_store
            .set_active(id, active)
            .await?
            .ok_or(AppError::KeyNotFound)?;

        tracing::info!(key_id = id, active, "API key activation changed");

        Ok(key)
    }
}
