//! Storage seams for keys and rate-limit hits.
//!
//! Services talk to storage only through [`KeyRepository`] and [`HitLog`].
//! [`postgres::PgStore`] is the production backend; [`memory::MemoryStore`]
//! keeps everything in process and can simulate an outage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::api_key::{ApiKeyRecord, NewApiKey};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Why a storage call did not produce an answer.
///
/// "Not found" is never an error here; lookups return `Ok(None)` for that.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage call exceeded its deadline")]
    Timeout,

    /// A record with this key hash already exists.
    #[error("duplicate key_hash")]
    Duplicate,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable table of API key identities.
#[async_trait]
pub trait KeyRepository: Send + Sync {
    /// Insert a key; the store assigns the id.
    async fn insert(&self, key: NewApiKey) -> Result<ApiKeyRecord, StoreError>;

    /// Insert `key` only when the table holds no keys at all.
    ///
    /// Returns `None` when keys already existed. Safe to run concurrently:
    /// at most one record is ever created this way.
    async fn insert_if_empty(&self, key: NewApiKey) -> Result<Option<ApiKeyRecord>, StoreError>;

    async fn find_active_by_hash(&self, key_hash: &str)
    -> Result<Option<ApiKeyRecord>, StoreError>;

    async fn touch_last_used(&self, id: i32, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// All keys ordered by id.
    async fn list(&self) -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// Returns the updated record, or `None` if `id` is unknown.
    async fn set_active(&self, id: i32, active: bool) -> Result<Option<ApiKeyRecord>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Append-only log of admitted requests, keyed by key hash.
#[async_trait]
pub trait HitLog: Send + Sync {
    /// Count hits for `key_hash` strictly after `window_start`; if the count is
    /// below `limit`, record a hit at `now`.
    ///
    /// Returns whether the hit was recorded. Count and insert happen as one
    /// step per key: concurrent callers for the same key never both slip in
    /// under the limit.
    async fn record_if_under(
        &self,
        key_hash: &str,
        limit: i64,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Delete hits for one key older than `before`.
    async fn prune_key(&self, key_hash: &str, before: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Delete every hit older than `before`.
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64, StoreError>;
}
