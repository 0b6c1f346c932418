//! Best-effort request throttling.
//!
//! [`ThrottleGuard`] keeps a counter and a last-seen time per key in a
//! [`ThrottleStore`] whose entries expire after the policy window. A request
//! is rejected when it arrives sooner than the minimum interval after the
//! previous one, or once the counter passes the window maximum. When the
//! store cannot be reached the guard lets the request through.
//!
//! The read and the write are separate calls, so concurrent requests on the
//! same key may be miscounted. That is acceptable for abuse mitigation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ActorId, BusinessId, OrderId};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// Limits for one throttled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Lifetime of a counter after its last update.
    pub window: Duration,
    /// Requests allowed per window. Zero disables the limit.
    pub max_requests: u32,
    /// Minimum spacing between two requests on the same key.
    pub min_interval: Duration,
}

impl ThrottlePolicy {
    /// 30 requests per minute, at least one second apart.
    pub fn per_minute() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 30,
            min_interval: Duration::from_secs(1),
        }
    }

    /// 60 requests per five minutes, at least one second apart.
    pub fn per_five_minutes() -> Self {
        Self {
            window: Duration::from_secs(5 * 60),
            max_requests: 60,
            min_interval: Duration::from_secs(1),
        }
    }

    /// A policy that never rejects.
    pub fn unlimited() -> Self {
        Self {
            window: Duration::from_secs(1),
            max_requests: 0,
            min_interval: Duration::ZERO,
        }
    }
}

/// Throttled operations of the order core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThrottledOperation {
    Create,
    Preview,
    NoteCreate,
}

impl ThrottledOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottledOperation::Create => "create",
            ThrottledOperation::Preview => "preview",
            ThrottledOperation::NoteCreate => "note:create",
        }
    }

    /// Builds the store key for a request. Note creation is also keyed by
    /// order.
    pub fn key(
        &self,
        business_id: BusinessId,
        actor_id: ActorId,
        order_id: Option<OrderId>,
    ) -> String {
        match (self, order_id) {
            (ThrottledOperation::NoteCreate, Some(order_id)) => {
                format!("rl:order:{}:{business_id}:{actor_id}:{order_id}", self.as_str())
            }
            _ => format!("rl:order:{}:{business_id}:{actor_id}", self.as_str()),
        }
    }
}

/// Counter state kept per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleEntry {
    pub count: u32,
    pub last_seen: DateTime<Utc>,
}

/// Failure of the backing store. The guard treats it as "allow".
#[derive(Debug, Error)]
#[error("throttle store unavailable: {0}")]
pub struct ThrottleStoreError(pub String);

/// Expiring key-value store for throttle counters.
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    async fn get(
        &self,
        key: &str,
    ) -> std::result::Result<Option<ThrottleEntry>, ThrottleStoreError>;

    /// Stores the entry, replacing any previous one, for `ttl`.
    async fn put(
        &self,
        key: &str,
        entry: ThrottleEntry,
        ttl: Duration,
    ) -> std::result::Result<(), ThrottleStoreError>;
}

/// Gate evaluated before a throttled operation starts.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns `RateLimited` if the request must be refused.
    async fn check(
        &self,
        operation: ThrottledOperation,
        key: &str,
        policy: &ThrottlePolicy,
    ) -> Result<()>;
}

/// Rate limiter backed by a [`ThrottleStore`] that fails open.
#[derive(Debug, Clone)]
pub struct ThrottleGuard<S> {
    store: S,
}

impl<S: ThrottleStore> ThrottleGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns true if the request is allowed, updating the counter.
    pub async fn allow(&self, key: &str, policy: &ThrottlePolicy) -> bool {
        if policy.max_requests == 0 {
            return true;
        }
        let now = Utc::now();

        let previous = match self.store.get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(key, error = %err, "throttle store unavailable, allowing request");
                None
            }
        };

        if let Some(entry) = previous {
            let elapsed = now
                .signed_duration_since(entry.last_seen)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if !policy.min_interval.is_zero() && elapsed < policy.min_interval {
                return false;
            }
        }

        let entry = ThrottleEntry {
            count: previous.map_or(0, |e| e.count).saturating_add(1),
            last_seen: now,
        };
        let ttl = policy.window.max(Duration::from_secs(1));
        if let Err(err) = self.store.put(key, entry, ttl).await {
            tracing::warn!(key, error = %err, "failed to record throttle counter");
        }

        entry.count <= policy.max_requests
    }
}

#[async_trait]
impl<S: ThrottleStore> RateLimiter for ThrottleGuard<S> {
    async fn check(
        &self,
        operation: ThrottledOperation,
        key: &str,
        policy: &ThrottlePolicy,
    ) -> Result<()> {
        if self.allow(key, policy).await {
            Ok(())
        } else {
            tracing::warn!(operation = operation.as_str(), key, "request throttled");
            metrics::counter!("order_throttle_rejections_total", "operation" => operation.as_str())
                .increment(1);
            Err(ServiceError::RateLimited {
                operation: operation.as_str(),
            })
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryThrottleState {
    entries: HashMap<String, (ThrottleEntry, tokio::time::Instant)>,
    unavailable: bool,
}

/// Process-local throttle store with per-key expiry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryThrottleStore {
    state: Arc<RwLock<InMemoryThrottleState>>,
}

impl InMemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the store being unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the live entry for a key.
    pub async fn entry(&self, key: &str) -> Option<ThrottleEntry> {
        self.get(key).await.ok().flatten()
    }
}

#[async_trait]
impl ThrottleStore for InMemoryThrottleStore {
    async fn get(
        &self,
        key: &str,
    ) -> std::result::Result<Option<ThrottleEntry>, ThrottleStoreError> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(ThrottleStoreError("connection refused".into()));
        }
        let now = tokio::time::Instant::now();
        Ok(state
            .entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(entry, _)| *entry))
    }

    async fn put(
        &self,
        key: &str,
        entry: ThrottleEntry,
        ttl: Duration,
    ) -> std::result::Result<(), ThrottleStoreError> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(ThrottleStoreError("connection refused".into()));
        }
        let now = tokio::time::Instant::now();
        state.entries.retain(|_, (_, expires_at)| *expires_at > now);
        state.entries.insert(key.to_string(), (entry, now + ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burst_policy(max_requests: u32) -> ThrottlePolicy {
        ThrottlePolicy {
            window: Duration::from_secs(60),
            max_requests,
            min_interval: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_rejects_after_window_maximum() {
        let guard = ThrottleGuard::new(InMemoryThrottleStore::new());
        let policy = burst_policy(2);
        assert!(guard.allow("k", &policy).await);
        assert!(guard.allow("k", &policy).await);
        assert!(!guard.allow("k", &policy).await);
        // Other keys are independent.
        assert!(guard.allow("other", &policy).await);
    }

    #[tokio::test]
    async fn test_rejects_within_minimum_interval() {
        let store = InMemoryThrottleStore::new();
        let guard = ThrottleGuard::new(store.clone());
        let policy = ThrottlePolicy::per_minute();
        assert!(guard.allow("k", &policy).await);
        assert!(!guard.allow("k", &policy).await);
        // The rejected request is not counted.
        assert_eq!(store.entry("k").await.map(|e| e.count), Some(1));
    }

    #[tokio::test]
    async fn test_fails_open_when_store_unavailable() {
        let store = InMemoryThrottleStore::new();
        store.set_unavailable(true).await;
        let guard = ThrottleGuard::new(store);
        let policy = burst_policy(1);
        for _ in 0..5 {
            assert!(guard.allow("k", &policy).await);
        }
    }

    #[tokio::test]
    async fn test_zero_maximum_disables_limit() {
        let guard = ThrottleGuard::new(InMemoryThrottleStore::new());
        for _ in 0..5 {
            assert!(guard.allow("k", &ThrottlePolicy::unlimited()).await);
        }
    }

    #[tokio::test]
    async fn test_check_maps_rejection_to_rate_limited() {
        let guard = ThrottleGuard::new(InMemoryThrottleStore::new());
        let policy = burst_policy(1);
        guard
            .check(ThrottledOperation::Create, "k", &policy)
            .await
            .unwrap();
        let err = guard
            .check(ThrottledOperation::Create, "k", &policy)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::RateLimited {
                operation: "create"
            }
        ));
    }

    #[test]
    fn test_keys() {
        let business_id = BusinessId::new();
        let actor_id = ActorId::new();
        let order_id = OrderId::new();
        assert_eq!(
            ThrottledOperation::Preview.key(business_id, actor_id, None),
            format!("rl:order:preview:{business_id}:{actor_id}")
        );
        assert_eq!(
            ThrottledOperation::NoteCreate.key(business_id, actor_id, Some(order_id)),
            format!("rl:order:note:create:{business_id}:{actor_id}:{order_id}")
        );
    }
}
