//! TTL cache for hydration results using moka
//!
//! Entries carry their own TTL. Freshness is checked against the tokio clock
//! on every read, so an entry is served strictly before `inserted_at + ttl`
//! and never after. Expired entries are dropped lazily on read, by moka's
//! own expiry, or eagerly by [`HydrationCache::sweep`].

use crate::key::CacheKey;
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Default entry capacity
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

// moka evicts on the wall clock; freshness is decided on the tokio clock.
const EVICTION_GRACE: Duration = Duration::from_secs(1);

/// A cached hydration result
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Fetched value
    pub value: Arc<Value>,
    /// Insertion time
    pub inserted_at: Instant,
    /// Time to live from insertion
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create entry stamped with the current time
    #[inline]
    #[must_use]
    pub fn new(value: Arc<Value>, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// Check if entry has outlived its TTL at `now`
    #[inline]
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }

    /// Check if entry has outlived its TTL
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

struct EntryExpiry;

impl Expiry<CacheKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl.saturating_add(EVICTION_GRACE))
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl.saturating_add(EVICTION_GRACE))
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Approximate number of entries, expired ones included until swept
    pub entry_count: u64,
}

/// Bounded TTL cache of successful hydration results
///
/// Cheap to clone; clones share storage.
#[derive(Debug, Clone)]
pub struct HydrationCache {
    inner: Cache<CacheKey, CacheEntry>,
}

impl HydrationCache {
    /// Create cache with max capacity
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
        }
    }

    /// Live value for `key`
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Value>> {
        let entry = self.inner.get(key).await?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value)
    }

    /// Insert or replace value for `key`
    pub async fn insert(&self, key: CacheKey, value: Arc<Value>, ttl: Duration) {
        self.inner.insert(key, CacheEntry::new(value, ttl)).await;
    }

    /// Check if a live entry exists
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).await.is_some()
    }

    /// Invalidate cache entry
    #[inline]
    pub async fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key).await;
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Remove every expired entry, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<CacheKey> = self
            .inner
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.inner.invalidate(key).await;
        }
        self.inner.run_pending_tasks().await;

        if !expired.is_empty() {
            debug!(removed = expired.len(), "swept expired hydration entries");
        }
        expired.len()
    }

    /// Spawn a task that sweeps every `period`
    ///
    /// Must be called inside a tokio runtime. The task stops when the
    /// returned handle is dropped.
    #[must_use]
    pub fn spawn_sweeper(&self, period: Duration) -> SweeperHandle {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep().await;
            }
        });
        SweeperHandle { task }
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }

    /// Flush moka's pending maintenance so counts are current
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for HydrationCache {
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Background sweeper; aborted on drop
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper now
    #[inline]
    pub fn stop(self) {
        drop(self);
    }

    /// Check if the sweeper task has ended
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdui_schema::Props;
    use serde_json::json;

    fn key(endpoint: &str) -> CacheKey {
        CacheKey::compute(None, endpoint, &Props::new())
    }

    #[tokio::test(start_paused = true)]
    async fn entry_served_until_ttl() {
        let cache = HydrationCache::default();
        cache
            .insert(key("/a"), Arc::new(json!(1)), Duration::from_millis(100))
            .await;

        tokio::time::advance(Duration::from_millis(99)).await;
        assert_eq!(cache.get(&key("/a")).await.as_deref(), Some(&json!(1)));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(cache.get(&key("/a")).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_is_never_served() {
        let cache = HydrationCache::default();
        cache.insert(key("/a"), Arc::new(json!(1)), Duration::ZERO).await;
        assert!(!cache.contains(&key("/a")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_refreshes_entry() {
        let cache = HydrationCache::default();
        cache
            .insert(key("/a"), Arc::new(json!("old")), Duration::from_millis(50))
            .await;
        tokio::time::advance(Duration::from_millis(60)).await;
        cache
            .insert(key("/a"), Arc::new(json!("new")), Duration::from_millis(50))
            .await;

        assert_eq!(cache.get(&key("/a")).await.as_deref(), Some(&json!("new")));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired() {
        let cache = HydrationCache::default();
        cache
            .insert(key("/short"), Arc::new(json!(1)), Duration::from_millis(10))
            .await;
        cache
            .insert(key("/long"), Arc::new(json!(2)), Duration::from_secs(60))
            .await;
        cache.sync().await;

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.sweep().await, 1);
        assert!(cache.contains(&key("/long")).await);
        assert_eq!(cache.stats().entry_count, 1);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = HydrationCache::new(16);
        cache
            .insert(key("/a"), Arc::new(json!(1)), Duration::from_secs(60))
            .await;
        cache.invalidate(&key("/a")).await;
        assert!(!cache.contains(&key("/a")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_periodically_and_stops_on_drop() {
        let cache = HydrationCache::default();
        cache
            .insert(key("/a"), Arc::new(json!(1)), Duration::from_millis(10))
            .await;
        cache.sync().await;

        let handle = cache.spawn_sweeper(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.sync().await;
        assert_eq!(cache.stats().entry_count, 0);

        assert!(!handle.is_finished());
        handle.stop();
    }
}
