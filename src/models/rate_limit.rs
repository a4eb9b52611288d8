//! Rate limit hit model.

use chrono::{DateTime, Utc};

/// One admitted request, as recorded in the `rate_log` table.
///
/// Rows older than the retention horizon are swept; only hits inside the
/// trailing minute count toward a key's quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHit {
    pub key_hash: String,
    pub occurred_at: DateTime<Utc>,
}
