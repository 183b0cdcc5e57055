//! Request idempotency guard and its expiring cache.
//!
//! This layer is independent of the session-keyed idempotency inside sale
//! finalization: it rejects a second submission carrying the same
//! caller-supplied token while the first one is remembered.
//!
//! # Lifecycle and concurrency
//!
//! One [`ExpiringCache`] is built at startup and shared (cheap `Clone`, all
//! clones see the same entries) by every request. Entries carry an absolute
//! wall-clock expiry and are treated as absent once it has passed; the check
//! happens lazily on access. There is no teardown.
//!
//! Admission uses [`ExpiringCache::insert_if_absent`], which is atomic per
//! key, so two racing requests with a fresh token cannot both be admitted by
//! the same process. The cache is process-local: replicas that do not share
//! it can each admit the same token once.
//!
//! The cache has no size bound. A live entry leaves only through expiry or
//! [`ExpiringCache::delete`], so memory grows with request rate times TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use saleflow_core::Clock;

/// Namespace prefix for idempotency keys in the shared cache.
pub const IDEMPOTENCY_KEY_PREFIX: &str = "IDEMPOTENCY:";

// =============================================================================
// ExpiringCache
// =============================================================================

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Lets moka reclaim memory for entries nobody reads again. Liveness is
/// still decided against the injected clock on every access.
///
/// Never shorter than the entry's TTL, so moka cannot drop a live entry.
struct EntryTtl;

impl<V> Expiry<String, CacheEntry<V>> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Key/value store whose entries expire at an absolute time.
#[derive(Clone)]
pub struct ExpiringCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V> ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache that reads time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let entries = Cache::builder().expire_after(EntryTtl).build();

        Self { entries, clock }
    }

    fn entry(&self, value: V, ttl_secs: u64) -> CacheEntry<V> {
        let ttl = Duration::from_secs(ttl_secs);
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        CacheEntry {
            value,
            expires_at,
            ttl,
        }
    }

    /// Get a live value, `None` if never set or already expired.
    ///
    /// An expired entry found here is removed.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let result = self
            .entries
            .entry_by_ref(key)
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) if !entry.value().is_live(now) => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::Unchanged(entry) => Some(entry.into_value().value),
            _ => None,
        }
    }

    /// Store `value` under `key` for `ttl_secs`, replacing any previous value.
    pub async fn set(&self, key: &str, value: V, ttl_secs: u64) {
        let entry = self.entry(value, ttl_secs);
        self.entries.insert(key.to_owned(), entry).await;
    }

    /// Store `value` only if `key` has no live entry.
    ///
    /// Returns `true` if this call stored the value. The check and the write
    /// happen atomically with respect to other calls on the same key.
    pub async fn insert_if_absent(&self, key: &str, value: V, ttl_secs: u64) -> bool {
        let now = self.clock.now();
        let fresh = self.entry(value, ttl_secs);
        let result = self
            .entries
            .entry_by_ref(key)
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) if entry.value().is_live(now) => Op::Nop,
                    _ => Op::Put(fresh),
                };
                std::future::ready(op)
            })
            .await;

        matches!(result, CompResult::Inserted(_) | CompResult::ReplacedWith(_))
    }

    /// Remove `key`.
    pub async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}

// =============================================================================
// Idempotency guard
// =============================================================================

/// Caller-supplied token identifying retries of one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    /// Parse a raw token; blank values count as no token.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    /// Pick the token for a request: the header wins over the body field.
    #[must_use]
    pub fn resolve(header: Option<&str>, body_field: Option<&str>) -> Option<Self> {
        header
            .and_then(Self::parse)
            .or_else(|| body_field.and_then(Self::parse))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this token is recorded in the cache.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{IDEMPOTENCY_KEY_PREFIX}{}", self.0)
    }
}

/// What the cache remembers about a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyRecord {
    /// The first request is still running.
    Processing,
    /// The first request finished with this HTTP status.
    Completed {
        #[serde(rename = "httpStatus")]
        http_status: u16,
    },
}

/// Outcome of presenting a token to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the request.
    Admitted,
    /// The token was already seen; report a conflict.
    Rejected,
}

/// Guards commit-once endpoints against duplicate submissions.
#[derive(Clone)]
pub struct IdempotencyGuard {
    cache: ExpiringCache<IdempotencyRecord>,
    ttl_secs: u64,
}

impl IdempotencyGuard {
    /// Create a guard whose markers live for `ttl_secs`.
    #[must_use]
    pub const fn new(cache: ExpiringCache<IdempotencyRecord>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Decide whether a request may run.
    ///
    /// Requests without a token are always admitted. A token with no live
    /// record is admitted and marked as processing; any live record, whether
    /// still processing or completed, rejects the request.
    pub async fn admit(&self, token: Option<&IdempotencyToken>) -> Admission {
        let Some(token) = token else {
            return Admission::Admitted;
        };

        if self
            .cache
            .insert_if_absent(&token.cache_key(), IdempotencyRecord::Processing, self.ttl_secs)
            .await
        {
            debug!(token = token.as_str(), "Idempotency token admitted");
            Admission::Admitted
        } else {
            warn!(token = token.as_str(), "Duplicate idempotency token rejected");
            Admission::Rejected
        }
    }

    /// Record the final status of an admitted request.
    ///
    /// Restarts the record's lifetime, so the token stays rejected for a full
    /// TTL after the request finishes.
    pub async fn complete(&self, token: &IdempotencyToken, http_status: u16) {
        self.cache
            .set(
                &token.cache_key(),
                IdempotencyRecord::Completed { http_status },
                self.ttl_secs,
            )
            .await;
    }

    /// Forget a token so the next request carrying it is admitted.
    pub async fn release(&self, token: &IdempotencyToken) {
        debug!(token = token.as_str(), "Idempotency token released");
        self.cache.delete(&token.cache_key()).await;
    }

    /// Look up what is remembered about a token.
    pub async fn record(&self, token: &IdempotencyToken) -> Option<IdempotencyRecord> {
        self.cache.get(&token.cache_key()).await
    }
}
