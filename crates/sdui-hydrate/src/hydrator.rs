//! Concurrent hydration with caching and request coalescing
//!
//! A batch of directives is resolved in two phases. The lookup phase runs
//! in input order: each directive is answered from the cache, attached to
//! an identical in-flight fetch, or becomes the owner of a new fetch spawned
//! as a tokio task. The wait phase then awaits every directive concurrently,
//! each under its own timeout. A fetch whose waiters gave up keeps running
//! and still populates the cache.

use crate::cache::{HydrationCache, SweeperHandle};
use crate::config::{millis, HydrationSettings, HydratorConfig};
use crate::error::HydrationError;
use crate::key::CacheKey;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::transport::{FetchRequest, FetcherSet, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use sdui_schema::HydrationDirective;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

type FetchResult = Result<Arc<Value>, HydrationError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type InFlightMap = DashMap<CacheKey, InFlight>;

/// A running fetch, tagged so that stale removals leave newer fetches alone
#[derive(Clone)]
struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

/// How a directive's result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheStatus {
    /// Served from a live cache entry
    Hit,
    /// Started a new fetch
    Miss,
    /// Attached to an identical fetch already in flight
    Coalesced,
}

impl Display for CacheStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Coalesced => "coalesced",
        })
    }
}

/// Hydration counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HydrationStats {
    /// Directives served from cache
    pub hits: u64,
    /// Directives that started a fetch
    pub misses: u64,
    /// Directives attached to an in-flight fetch
    pub coalesced: u64,
    /// Individual transport calls, retries included
    pub transport_calls: u64,
    /// Directives that ended in an error
    pub failures: u64,
}

impl HydrationStats {
    fn record(&mut self, status: CacheStatus, failed: bool) {
        match status {
            CacheStatus::Hit => self.hits += 1,
            CacheStatus::Miss => self.misses += 1,
            CacheStatus::Coalesced => self.coalesced += 1,
        }
        if failed {
            self.failures += 1;
        }
    }

    /// Add another set of counters into this one
    pub fn merge(&mut self, other: &Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.coalesced += other.coalesced;
        self.transport_calls += other.transport_calls;
        self.failures += other.failures;
    }

    /// Total directives accounted for
    #[inline]
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.hits + self.misses + self.coalesced
    }
}

/// Result of one directive
#[derive(Debug, Clone)]
pub struct HydrationOutcome {
    /// Request identity
    pub key: CacheKey,
    /// Directive endpoint
    pub endpoint: String,
    /// Cache status
    pub status: CacheStatus,
    /// Fetched value or failure
    pub result: FetchResult,
    /// Time from batch start until this directive resolved
    pub elapsed: Duration,
}

impl HydrationOutcome {
    /// Check if the directive succeeded
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of one `hydrate` call, index-aligned with its input
#[derive(Debug, Clone, Default)]
pub struct HydrationBatch {
    /// One outcome per input directive
    pub outcomes: Vec<HydrationOutcome>,
    /// Counters for this batch
    pub stats: HydrationStats,
    /// Wall time of the batch
    pub elapsed: Duration,
}

impl HydrationBatch {
    /// Number of outcomes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcome for input index `i`
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&HydrationOutcome> {
        self.outcomes.get(i)
    }

    /// Iterate outcomes in input order
    pub fn iter(&self) -> impl Iterator<Item = &HydrationOutcome> {
        self.outcomes.iter()
    }

    /// First outcome per key
    #[must_use]
    pub fn by_key(&self) -> HashMap<CacheKey, &HydrationOutcome> {
        let mut map = HashMap::with_capacity(self.outcomes.len());
        for outcome in &self.outcomes {
            map.entry(outcome.key).or_insert(outcome);
        }
        map
    }

    /// Failed outcomes in input order
    pub fn failures(&self) -> impl Iterator<Item = &HydrationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}

/// Removes an in-flight entry when the owning fetch task ends
struct InFlightGuard {
    in_flight: Arc<InFlightMap>,
    key: CacheKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        detach(&self.in_flight, &self.key, self.id);
    }
}

/// Remove `key` from the in-flight map if it still belongs to fetch `id`
fn detach(in_flight: &InFlightMap, key: &CacheKey, id: u64) -> bool {
    in_flight.remove_if(key, |_, entry| entry.id == id).is_some()
}

struct PendingDirective {
    key: CacheKey,
    endpoint: String,
    status: CacheStatus,
    timeout: Duration,
    source: Source,
}

enum Source {
    Cached(Arc<Value>),
    Fetch(InFlight),
}

/// Everything a spawned fetch task needs
struct FetchJob {
    key: CacheKey,
    request: FetchRequest,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    ttl: Duration,
    batch_calls: Arc<AtomicU64>,
}

/// Concurrent, caching, deduplicating data fetcher
///
/// Holds the only state shared between render passes: the TTL cache and the
/// in-flight map. Share one instance behind an `Arc`.
pub struct DataHydrator {
    config: HydratorConfig,
    transport: Arc<dyn Transport>,
    fetchers: FetcherSet,
    cache: HydrationCache,
    in_flight: Arc<InFlightMap>,
    next_fetch_id: AtomicU64,
    stats: Mutex<HydrationStats>,
    transport_calls: Arc<AtomicU64>,
}

impl DataHydrator {
    /// Create hydrator with default config
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, HydratorConfig::default())
    }

    /// Create hydrator with config
    #[must_use]
    pub fn with_config(transport: Arc<dyn Transport>, config: HydratorConfig) -> Self {
        Self {
            cache: HydrationCache::new(config.max_cache_entries),
            config,
            transport,
            fetchers: FetcherSet::new(),
            in_flight: Arc::new(DashMap::new()),
            next_fetch_id: AtomicU64::new(0),
            stats: Mutex::new(HydrationStats::default()),
            transport_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// With a named transport for directives whose `fetcher` matches
    #[inline]
    #[must_use]
    pub fn with_fetcher(mut self, name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        self.fetchers.insert(name, transport);
        self
    }

    /// Current config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HydratorConfig {
        &self.config
    }

    /// Underlying cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &HydrationCache {
        &self.cache
    }

    /// Cumulative counters across all batches
    #[must_use]
    pub fn stats(&self) -> HydrationStats {
        let mut stats = *self.stats.lock();
        stats.transport_calls = self.transport_calls.load(Ordering::Relaxed);
        stats
    }

    /// Number of fetches new lookups can still attach to
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop the cached result for a directive
    pub async fn invalidate(&self, directive: &HydrationDirective) {
        self.cache.invalidate(&CacheKey::for_directive(directive)).await;
    }

    /// Drop every cached result
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Start the background sweeper at the configured interval
    #[must_use]
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        self.cache.spawn_sweeper(self.config.sweep_interval)
    }

    /// Hydrate with configured defaults
    pub async fn hydrate(&self, directives: &[HydrationDirective]) -> HydrationBatch {
        self.hydrate_with(directives, &HydrationSettings::default())
            .await
    }

    /// Hydrate with per-call overrides
    ///
    /// Never fails as a whole: each directive gets exactly one outcome.
    #[instrument(skip_all, fields(directives = directives.len()))]
    pub async fn hydrate_with(
        &self,
        directives: &[HydrationDirective],
        settings: &HydrationSettings,
    ) -> HydrationBatch {
        let started = Instant::now();
        let batch_calls = Arc::new(AtomicU64::new(0));

        let mut pending = Vec::with_capacity(directives.len());
        for directive in directives {
            pending.push(self.lookup(directive, settings, &batch_calls).await);
        }

        let outcomes = join_all(pending.into_iter().map(|p| self.wait(p, started))).await;

        let mut stats = HydrationStats::default();
        for outcome in &outcomes {
            stats.record(outcome.status, !outcome.is_ok());
        }
        stats.transport_calls = batch_calls.load(Ordering::Relaxed);
        {
            let mut total = self.stats.lock();
            let mut counted = stats;
            counted.transport_calls = 0;
            total.merge(&counted);
        }

        debug!(
            hits = stats.hits,
            misses = stats.misses,
            coalesced = stats.coalesced,
            failures = stats.failures,
            "hydration batch complete"
        );

        HydrationBatch {
            outcomes,
            stats,
            elapsed: started.elapsed(),
        }
    }

    async fn lookup(
        &self,
        directive: &HydrationDirective,
        settings: &HydrationSettings,
        batch_calls: &Arc<AtomicU64>,
    ) -> PendingDirective {
        let key = Self::key_for(directive, settings);
        let timeout = directive
            .timeout()
            .or(settings.timeout)
            .unwrap_or(self.config.default_timeout);
        let endpoint = directive.endpoint.clone();

        if let Some(value) = self.cache.get(&key).await {
            debug!(endpoint = %endpoint, key = %key.short(), "cache hit");
            return PendingDirective {
                key,
                endpoint,
                status: CacheStatus::Hit,
                timeout,
                source: Source::Cached(value),
            };
        }

        let (fetch, sender) = match self.in_flight.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel::<FetchResult>();
                let aborted = endpoint.clone();
                let fetch = InFlight {
                    id: self.next_fetch_id.fetch_add(1, Ordering::Relaxed),
                    fetch: rx
                        .map(move |received| {
                            received.unwrap_or_else(|_| Err(HydrationError::aborted(aborted)))
                        })
                        .boxed()
                        .shared(),
                };
                entry.insert(fetch.clone());
                (fetch, Some(tx))
            }
        };

        let status = match sender {
            None => {
                debug!(endpoint = %endpoint, key = %key.short(), "coalesced with in-flight fetch");
                CacheStatus::Coalesced
            }
            Some(tx) => {
                debug!(endpoint = %endpoint, key = %key.short(), "cache miss");
                self.start_fetch(directive, settings, (key, fetch.id), timeout, batch_calls, tx);
                CacheStatus::Miss
            }
        };

        PendingDirective {
            key,
            endpoint,
            status,
            timeout,
            source: Source::Fetch(fetch),
        }
    }

    /// Cache and coalescing key, namespaced by any transport override
    ///
    /// Directives naming a `fetcher` never use the override, so their key
    /// is left as is.
    fn key_for(directive: &HydrationDirective, settings: &HydrationSettings) -> CacheKey {
        let key = CacheKey::for_directive(directive);
        match (&directive.fetcher, &settings.transport) {
            (None, Some(transport)) => key.scoped(&transport.name),
            _ => key,
        }
    }

    fn start_fetch(
        &self,
        directive: &HydrationDirective,
        settings: &HydrationSettings,
        (key, id): (CacheKey, u64),
        timeout: Duration,
        batch_calls: &Arc<AtomicU64>,
        tx: oneshot::Sender<FetchResult>,
    ) {
        let transport = match &directive.fetcher {
            Some(name) => match self.fetchers.get(name) {
                Some(transport) => Arc::clone(transport),
                None => {
                    warn!(endpoint = %directive.endpoint, fetcher = %name, "unknown fetcher");
                    detach(&self.in_flight, &key, id);
                    let _ = tx.send(Err(HydrationError::unknown_fetcher(
                        directive.endpoint.clone(),
                        name,
                    )));
                    return;
                }
            },
            None => settings
                .transport
                .as_ref()
                .map_or_else(|| Arc::clone(&self.transport), |o| Arc::clone(&o.transport)),
        };

        let job = FetchJob {
            key,
            request: FetchRequest::new(directive.endpoint.clone(), directive.params.clone(), timeout),
            transport,
            retry: settings.retry.unwrap_or(self.config.retry),
            ttl: directive
                .ttl()
                .or(settings.ttl)
                .unwrap_or(self.config.default_ttl),
            batch_calls: Arc::clone(batch_calls),
        };

        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
            id,
        };
        let cache = self.cache.clone();
        let total_calls = Arc::clone(&self.transport_calls);

        tokio::spawn(async move {
            let calls = AtomicU64::new(0);
            let result = fetch_with_retry(job.transport.as_ref(), job.request, &job.retry, &calls)
                .await
                .map(Arc::new);

            let made = calls.load(Ordering::Relaxed);
            total_calls.fetch_add(made, Ordering::Relaxed);
            job.batch_calls.fetch_add(made, Ordering::Relaxed);

            if let Ok(value) = &result {
                cache.insert(job.key, Arc::clone(value), job.ttl).await;
            }
            drop(guard);
            let _ = tx.send(result);
        });
    }

    async fn wait(&self, pending: PendingDirective, started: Instant) -> HydrationOutcome {
        let PendingDirective {
            key,
            endpoint,
            status,
            timeout,
            source,
        } = pending;

        let result = match source {
            Source::Cached(value) => Ok(value),
            Source::Fetch(InFlight { id, fetch }) => {
                match tokio::time::timeout(timeout, fetch).await {
                    Ok(result) => result,
                    Err(_) => {
                        // Later lookups start over; the orphaned task may still fill the cache.
                        let detached = detach(&self.in_flight, &key, id);
                        warn!(
                            endpoint = %endpoint,
                            timeout_ms = millis(timeout),
                            detached,
                            "hydration timed out"
                        );
                        Err(HydrationError::timeout(endpoint.clone(), timeout))
                    }
                }
            }
        };

        HydrationOutcome {
            key,
            endpoint,
            status,
            result,
            elapsed: started.elapsed(),
        }
    }
}

impl Debug for DataHydrator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataHydrator")
            .field("config", &self.config)
            .field("fetchers", &self.fetchers)
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
