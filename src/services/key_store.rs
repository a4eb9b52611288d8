//! Key store - hashing, lookup, creation, and bootstrap of API keys.
//!
//! # Security
//!
//! Only the SHA-256 digest of a credential is ever persisted. A raw credential
//! exists in memory at creation time and in the single response that hands it
//! to the caller; it can never be read back.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::{
    clock::Clock,
    error::AppError,
    models::api_key::{ApiKeyResponse, CreatedKeyResponse, KeyIdentity, NewApiKey, Role},
    store::{KeyRepository, StoreError},
};

/// Label of the admin record created by [`KeyStore::bootstrap`].
pub const MASTER_LABEL: &str = "master-admin";

/// Quota given to the master identity and the bootstrap record.
pub const UNLIMITED_QUOTA: i32 = i32::MAX;

/// Hash an API key for storage and comparison.
///
/// Surrounding whitespace is ignored, so `" abc "` and `"abc"` are the same
/// credential. The result is 64 lowercase hex characters.
pub fn hash_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.trim().as_bytes());

    hex::encode(hasher.finalize())
}

/// Compare two digests without exiting early on the first differing byte.
pub fn digests_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// First eight characters of a digest, for log lines.
pub fn hash_prefix(key_hash: &str) -> &str {
    key_hash.get(..8).unwrap_or(key_hash)
}

/// Generate cryptographically secure raw credential.
///
/// 64 hex characters (32 random bytes, 256 bits)
fn generate_raw_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Result of [`KeyStore::bootstrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The table was empty; the admin record with this id was created.
    Created { id: i32 },
    /// Keys already existed; nothing was written.
    AlreadyInitialized,
}

#[derive(Clone)]
pub struct KeyStore {
    repo: Arc<dyn KeyRepository>,
    clock: Arc<dyn Clock>,
}

impl KeyStore {
    pub fn new(repo: Arc<dyn KeyRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Create the master admin record if no key exists yet.
    ///
    /// Running it again once any key exists is a no-op.
    ///
    /// # Errors
    ///
    /// - `BootstrapFailure`: storage could not be reached. Callers log this and keep serving.
    pub async fn bootstrap(&self, master_raw_key: &str) -> Result<BootstrapOutcome, AppError> {
        let key = NewApiKey {
            key_hash: hash_key(master_raw_key),
            label: MASTER_LABEL.to_string(),
            role: Role::Admin,
            rate_limit: UNLIMITED_QUOTA,
            created_at: self.clock.now(),
        };

        match self.repo.insert_if_empty(key).await {
            Ok(Some(record)) => Ok(BootstrapOutcome::Created { id: record.id }),
            Ok(None) => Ok(BootstrapOutcome::AlreadyInitialized),
            Err(e) => Err(AppError::BootstrapFailure(e)),
        }
    }

    /// Resolve a raw credential to an active key.
    ///
    /// Returns `Ok(None)` for unknown and deactivated keys. On success the
    /// key's `last_used` is stamped; a failure to stamp is logged and does not
    /// fail the lookup.
    pub async fn lookup(&self, raw_key: &str) -> Result<Option<KeyIdentity>, StoreError> {
        let key_hash = hash_key(raw_key);

        let Some(record) = self.repo.find_active_by_hash(&key_hash).await? else {
            return Ok(None);
        };

        if let Err(e) = self.repo.touch_last_used(record.id, self.clock.now()).await {
            tracing::warn!(key_id = record.id, error = %e, "Failed to update last_used");
        }

        Ok(Some(KeyIdentity::from(&record)))
    }

    /// Create a key with a fresh random credential.
    ///
    /// The returned `api_key` is the only copy of the raw credential.
    pub async fn create(
        &self,
        label: String,
        role: Role,
        rate_limit: i32,
    ) -> Result<CreatedKeyResponse, StoreError> {
        let raw_key = generate_raw_key();

        let record = self
            .repo
            .insert(NewApiKey {
                key_hash: hash_key(&raw_key),
                label,
                role,
                rate_limit,
                created_at: self.clock.now(),
            })
            .await?;

        Ok(CreatedKeyResponse {
            id: record.id,
            api_key: raw_key,
            label: record.label,
            role: record.role,
            rate_limit: record.rate_limit,
        })
    }

    /// Metadata of every key, ordered by id.
    pub async fn list(&self) -> Result<Vec<ApiKeyResponse>, StoreError> {
        let records = self.repo.list().await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Activate or deactivate a key. `None` if the id is unknown.
    pub async fn set_active(
        &self,
        id: i32,
        active: bool,
    ) -> Result<Option<ApiKeyResponse>, StoreError> {
        Ok(self.repo.set_active(id, active).await?.map(Into::into))
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.repo.ping().await
    }
}
