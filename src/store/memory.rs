//! In-process storage.
//!
//! Behaves like [`super::PgStore`] for every operation the services use,
//! including per-key atomic admission. [`MemoryStore::set_unavailable`] makes
//! every call fail as if the database were unreachable.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::{HitLog, KeyRepository, StoreError};
use crate::models::{
    api_key::{ApiKeyRecord, NewApiKey},
    rate_limit::RateLimitHit,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<BTreeMap<i32, ApiKeyRecord>>,
    hits: Mutex<Vec<RateLimitHit>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate (or end) a storage outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of hits currently retained, across all keys.
    pub async fn hit_count(&self) -> usize {
        self.hits.lock().await.len()
    }

    /// Number of hits currently retained for one key.
    pub async fn hit_count_for(&self, key_hash: &str) -> usize {
        self.hits
            .lock()
            .await
            .iter()
            .filter(|hit| hit.key_hash == key_hash)
            .count()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn materialize(id: i32, key: NewApiKey) -> ApiKeyRecord {
        ApiKeyRecord {
            id,
            key_hash: key.key_hash,
            label: key.label,
            role: key.role,
            rate_limit: key.rate_limit,
            created_at: key.created_at,
            last_used: None,
            is_active: true,
        }
    }
}

fn next_id(keys: &BTreeMap<i32, ApiKeyRecord>) -> i32 {
    keys.keys().next_back().map_or(1, |last| last + 1)
}

#[async_trait]
impl KeyRepository for MemoryStore {
    async fn insert(&self, key: NewApiKey) -> Result<ApiKeyRecord, StoreError> {
        self.check_available()?;
        let mut keys = self.keys.write().await;

        if keys.values().any(|existing| existing.key_hash == key.key_hash) {
            return Err(StoreError::Duplicate);
        }

        let record = Self::materialize(next_id(&keys), key);
        keys.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_if_empty(&self, key: NewApiKey) -> Result<Option<ApiKeyRecord>, StoreError> {
        self.check_available()?;
        let mut keys = self.keys.write().await;

        if !keys.is_empty() {
            return Ok(None);
        }

        let record = Self::materialize(next_id(&keys), key);
        keys.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn find_active_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        self.check_available()?;
        let keys = self.keys.read().await;

        Ok(keys
            .values()
            .find(|k| k.is_active && k.key_hash == key_hash)
            .cloned())
    }

    async fn touch_last_used(&self, id: i32, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(key) = self.keys.write().await.get_mut(&id) {
            key.last_used = Some(at);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        self.check_available()?;
        Ok(self.keys.read().await.values().cloned().collect())
    }

    async fn set_active(&self, id: i32, active: bool) -> Result<Option<ApiKeyRecord>, StoreError> {
        self.check_available()?;
        let mut keys = self.keys.write().await;

        Ok(keys.get_mut(&id).map(|key| {
            key.is_active = active;
            key.clone()
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[async_trait]
impl HitLog for MemoryStore {
    async fn record_if_under(
        &self,
        key_hash: &str,
        limit: i64,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        // One lock across count and insert.
        let mut hits = self.hits.lock().await;

        let count = hits
            .iter()
            .filter(|hit| hit.key_hash == key_hash && hit.occurred_at > window_start)
            .count() as i64;

        if count >= limit {
            return Ok(false);
        }

        hits.push(RateLimitHit {
            key_hash: key_hash.to_string(),
            occurred_at: now,
        });
        Ok(true)
    }

    async fn prune_key(&self, key_hash: &str, before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut hits = self.hits.lock().await;

        let initial = hits.len();
        hits.retain(|hit| hit.key_hash != key_hash || hit.occurred_at >= before);
        Ok((initial - hits.len()) as u64)
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut hits = self.hits.lock().await;

        let initial = hits.len();
        hits.retain(|hit| hit.occurred_at >= before);
        Ok((initial - hits.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api_key::Role;
    use chrono::Duration;

    fn new_key(hash: &str) -> NewApiKey {
        NewApiKey {
            key_hash: hash.to_string(),
            label: "test".to_string(),
            role: Role::User,
            rate_limit: 5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryStore::new();

        let first = store.insert(new_key("a")).await.unwrap();
        let second = store.insert(new_key("b")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(first.is_active);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_hash() {
        let store = MemoryStore::new();
        store.insert(new_key("a")).await.unwrap();

        assert!(matches!(
            store.insert(new_key("a")).await,
            Err(StoreError::Duplicate)
        ));
    }

    #[tokio::test]
    async fn insert_if_empty_only_fills_empty_table() {
        let store = MemoryStore::new();

        assert!(store.insert_if_empty(new_key("a")).await.unwrap().is_some());
        assert!(store.insert_if_empty(new_key("b")).await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inactive_keys_are_not_found() {
        let store = MemoryStore::new();
        let record = store.insert(new_key("a")).await.unwrap();

        store.set_active(record.id, false).await.unwrap();

        assert!(store.find_active_by_hash("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.list().await.is_err());
        assert!(
            store
                .record_if_under("a", 1, Utc::now(), Utc::now())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn prune_key_leaves_other_keys() {
        let store = MemoryStore::new();
        let old = Utc::now() - Duration::minutes(10);
        let window = old - Duration::minutes(1);

        store.record_if_under("a", 10, window, old).await.unwrap();
        store.record_if_under("b", 10, window, old).await.unwrap();

        let removed = store.prune_key("a", Utc::now()).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.hit_count_for("a").await, 0);
        assert_eq!(store.hit_count_for("b").await, 1);
    }
}
