//! PostgreSQL-backed storage.
//!
//! Every call borrows a pooled connection for the duration of one logical
//! operation and is bounded by the configured storage deadline. Connections go
//! back to the pool when the query future completes or is dropped.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{HitLog, KeyRepository, StoreError};
use crate::{
    db::DbPool,
    models::api_key::{ApiKeyRecord, NewApiKey, Role},
};

const KEY_COLUMNS: &str = "id, key_hash, label, role, rate_limit, created_at, last_used, is_active";

/// Row shape of `api_keys`; `role` is stored as text.
#[derive(Debug, sqlx::FromRow)]
struct KeyRow {
    id: i32,
    key_hash: String,
    label: Option<String>,
    role: String,
    rate_limit: i32,
    created_at: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<KeyRow> for ApiKeyRecord {
    fn from(row: KeyRow) -> Self {
        // Anything that is not exactly "admin" gets the least privilege.
        let role = row.role.parse().unwrap_or_else(|_| {
            tracing::warn!(key_id = row.id, role = %row.role, "Unknown role in api_keys, treating as user");
            Role::User
        });

        Self {
            id: row.id,
            key_hash: row.key_hash,
            label: row.label.unwrap_or_default(),
            role,
            rate_limit: row.rate_limit,
            created_at: row.created_at,
            last_used: row.last_used,
            is_active: row.is_active,
        }
    }
}

/// Unique violations on `key_hash` are reported like the in-memory backend does.
fn into_store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
        _ => StoreError::Database(error),
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Run one storage operation under the deadline.
    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result.map_err(into_store_error),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl KeyRepository for PgStore {
    async fn insert(&self, key: NewApiKey) -> Result<ApiKeyRecord, StoreError> {
        let sql = format!(
            "INSERT INTO api_keys (key_hash, label, role, rate_limit, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {KEY_COLUMNS}"
        );

        let row = self
            .bounded(
                sqlx::query_as::<_, KeyRow>(&sql)
                    .bind(&key.key_hash)
                    .bind(&key.label)
                    .bind(key.role.as_str())
                    .bind(key.rate_limit)
                    .bind(key.created_at)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(row.into())
    }

    async fn insert_if_empty(&self, key: NewApiKey) -> Result<Option<ApiKeyRecord>, StoreError> {
        // The unique key_hash absorbs two bootstraps racing on an empty table.
        let sql = format!(
            "INSERT INTO api_keys (key_hash, label, role, rate_limit, created_at)
             SELECT $1, $2, $3, $4, $5
             WHERE NOT EXISTS (SELECT 1 FROM api_keys)
             ON CONFLICT (key_hash) DO NOTHING
             RETURNING {KEY_COLUMNS}"
        );

        let row = self
            .bounded(
                sqlx::query_as::<_, KeyRow>(&sql)
                    .bind(&key.key_hash)
                    .bind(&key.label)
                    .bind(key.role.as_str())
                    .bind(key.rate_limit)
                    .bind(key.created_at)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(Into::into))
    }

    async fn find_active_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE key_hash = $1 AND is_active = true");

        let row = self
            .bounded(
                sqlx::query_as::<_, KeyRow>(&sql)
                    .bind(key_hash)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(Into::into))
    }

    async fn touch_last_used(&self, id: i32, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query("UPDATE api_keys SET last_used = $1 WHERE id = $2")
                .bind(at)
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys ORDER BY id");

        let rows = self
            .bounded(sqlx::query_as::<_, KeyRow>(&sql).fetch_all(&self.pool))
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_active(&self, id: i32, active: bool) -> Result<Option<ApiKeyRecord>, StoreError> {
        let sql = format!("UPDATE api_keys SET is_active = $1 WHERE id = $2 RETURNING {KEY_COLUMNS}");

        let row = self
            .bounded(
                sqlx::query_as::<_, KeyRow>(&sql)
                    .bind(active)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(Into::into))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(sqlx::query("SELECT 1").execute(&self.pool))
            .await?;

        Ok(())
    }
}

#[async_trait]
impl HitLog for PgStore {
    async fn record_if_under(
        &self,
        key_hash: &str,
        limit: i64,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            // Serialize admissions for this key until commit/rollback.
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(key_hash)
                .execute(&mut *tx)
                .await?;

            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM rate_log WHERE key_hash = $1 AND hit_at > $2",
            )
            .bind(key_hash)
            .bind(window_start)
            .fetch_one(&mut *tx)
            .await?;

            if count >= limit {
                tx.rollback().await?;
                return Ok(false);
            }

            sqlx::query("INSERT INTO rate_log (key_hash, hit_at) VALUES ($1, $2)")
                .bind(key_hash)
                .bind(now)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            Ok::<_, sqlx::Error>(true)
        })
        .await
    }

    async fn prune_key(&self, key_hash: &str, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM rate_log WHERE key_hash = $1 AND hit_at < $2")
                    .bind(key_hash)
                    .bind(before)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM rate_log WHERE hit_at < $1")
                    .bind(before)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }
}
