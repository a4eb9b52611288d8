//! Sliding-window rate limiter backed by the hit log.
//!
//! A key may make at most `quota` requests in any trailing 60-second window.
//! Hits older than five minutes are removed, per key on every admission and
//! globally by a periodic sweep.
//!
//! # Storage failures
//!
//! Admission fails open: if the hit log cannot be reached, the request is
//! allowed and the failure is logged. Throttling is given up during an outage
//! so that a storage problem does not take every caller down with it.

use std::sync::Arc;

use chrono::Duration;
use tokio::task::JoinHandle;

use crate::{
    clock::Clock,
    services::key_store::hash_prefix,
    store::{HitLog, StoreError},
};

/// Length of the counting window.
pub const WINDOW_SECS: i64 = 60;

/// Hits older than this are eligible for deletion.
pub const RETENTION_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied,
}

#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<dyn HitLog>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(hits: Arc<dyn HitLog>, clock: Arc<dyn Clock>) -> Self {
        Self { hits, clock }
    }

    /// Decide whether one more request for `key_hash` fits in its quota.
    ///
    /// # Process
    ///
    /// 1. A quota of zero (or less) is always denied, without touching storage
    /// 2. Count hits newer than `now - 60s`; a hit exactly 60s old no longer counts
    /// 3. At or over quota: deny, record nothing
    /// 4. Otherwise record a hit at `now` and drop this key's hits older than five minutes
    ///
    /// Steps 2 and 3 run atomically per key, so concurrent requests cannot
    /// push a key past its quota.
    pub async fn admit(&self, key_hash: &str, quota: i32) -> Admission {
        if quota <= 0 {
            return Admission::Denied;
        }

        let now = self.clock.now();
        let window_start = now - Duration::seconds(WINDOW_SECS);

        match self
            .hits
            .record_if_under(key_hash, i64::from(quota), window_start, now)
            .await
        {
            Ok(true) => {
                let cutoff = now - Duration::seconds(RETENTION_SECS);
                if let Err(e) = self.hits.prune_key(key_hash, cutoff).await {
                    tracing::debug!(error = %e, "Per-key hit cleanup failed");
                }
                Admission::Allowed
            }
            Ok(false) => Admission::Denied,
            Err(e) => {
                tracing::warn!(
                    key = hash_prefix(key_hash),
                    error = %e,
                    "Rate limit storage unavailable, allowing request"
                );
                Admission::Allowed
            }
        }
    }

    /// Delete every hit older than the retention horizon.
    pub async fn sweep(&self) -> Result<u64, StoreError> {
        let cutoff = self.clock.now() - Duration::seconds(RETENTION_SECS);
        self.hits.prune(cutoff).await
    }

    /// Run [`RateLimiter::sweep`] every `period` until the runtime shuts down.
    pub fn spawn_sweeper(self, period: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(removed) => tracing::debug!(removed, "Rate log sweep complete"),
                    Err(e) => tracing::warn!(error = %e, "Rate log sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, store::MemoryStore};

    fn limiter() -> (RateLimiter, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let limiter = RateLimiter::new(store.clone(), Arc::new(clock.clone()));
        (limiter, store, clock)
    }

    #[tokio::test]
    async fn quota_th_request_allowed_next_denied() {
        let (limiter, _, _) = limiter();

        for _ in 0..3 {
            assert_eq!(limiter.admit("k", 3).await, Admission::Allowed);
        }
        assert_eq!(limiter.admit("k", 3).await, Admission::Denied);
    }

    #[tokio::test]
    async fn denied_requests_are_not_recorded() {
        let (limiter, store, _) = limiter();

        limiter.admit("k", 1).await;
        limiter.admit("k", 1).await;
        limiter.admit("k", 1).await;

        assert_eq!(store.hit_count_for("k").await, 1);
    }

    #[tokio::test]
    async fn keys_are_counted_separately() {
        let (limiter, _, _) = limiter();

        assert_eq!(limiter.admit("a", 1).await, Admission::Allowed);
        assert_eq!(limiter.admit("b", 1).await, Admission::Allowed);
        assert_eq!(limiter.admit("a", 1).await, Admission::Denied);
    }

    #[tokio::test]
    async fn zero_quota_always_denies() {
        let (limiter, store, _) = limiter();

        assert_eq!(limiter.admit("k", 0).await, Admission::Denied);
        assert_eq!(store.hit_count().await, 0);
    }

    #[tokio::test]
    async fn hit_counts_until_just_before_sixty_seconds() {
        let (limiter, _, clock) = limiter();
        limiter.admit("k", 1).await;

        clock.advance(Duration::milliseconds(59_999));

        assert_eq!(limiter.admit("k", 1).await, Admission::Denied);
    }

    #[tokio::test]
    async fn hit_exactly_sixty_seconds_old_is_excluded() {
        let (limiter, _, clock) = limiter();
        limiter.admit("k", 1).await;

        clock.advance(Duration::seconds(60));

        assert_eq!(limiter.admit("k", 1).await, Admission::Allowed);
    }

    #[tokio::test]
    async fn window_slides_rather_than_resets() {
        let (limiter, _, clock) = limiter();

        limiter.admit("k", 2).await;
        clock.advance(Duration::seconds(30));
        limiter.admit("k", 2).await;
        clock.advance(Duration::seconds(31));

        // First hit has aged out, second is still inside the window.
        assert_eq!(limiter.admit("k", 2).await, Admission::Allowed);
        assert_eq!(limiter.admit("k", 2).await, Admission::Denied);
    }

    #[tokio::test]
    async fn storage_outage_fails_open() {
        let (limiter, store, _) = limiter();
        store.set_unavailable(true);

        for _ in 0..5 {
            assert_eq!(limiter.admit("k", 1).await, Admission::Allowed);
        }
    }

    #[tokio::test]
    async fn admission_prunes_old_hits_for_key() {
        let (limiter, store, clock) = limiter();
        limiter.admit("k", 10).await;
        limiter.admit("other", 10).await;

        clock.advance(Duration::seconds(RETENTION_SECS + 1));
        limiter.admit("k", 10).await;

        assert_eq!(store.hit_count_for("k").await, 1);
        assert_eq!(store.hit_count_for("other").await, 1);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_hits() {
        let (limiter, store, clock) = limiter();
        limiter.admit("a", 10).await;
        clock.advance(Duration::seconds(RETENTION_SECS - 10));
        limiter.admit("b", 10).await;
        clock.advance(Duration::seconds(20));

        let removed = limiter.sweep().await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.hit_count_for("a").await, 0);
        assert_eq!(store.hit_count_for("b").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_admissions_never_exceed_quota() {
        let (limiter, store, _) = limiter();
        let limiter = Arc::new(limiter);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.admit("shared", 5).await })
            })
            .collect();

        let mut allowed = 0;
        for task in tasks {
            if task.await.unwrap() == Admission::Allowed {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 5);
        assert_eq!(store.hit_count_for("shared").await, 5);
    }
}
