//! Hydrator configuration

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Default per-directive timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cache TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default sweeper period
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Long-lived hydrator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratorConfig {
    /// Timeout for directives that set none
    pub default_timeout: Duration,
    /// TTL for directives that set none
    pub default_ttl: Duration,
    /// Retry schedule for transient failures
    pub retry: RetryPolicy,
    /// Cache entry bound
    pub max_cache_entries: u64,
    /// Period of the background sweeper
    pub sweep_interval: Duration,
}

impl Default for HydratorConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            default_ttl: DEFAULT_TTL,
            retry: RetryPolicy::default(),
            max_cache_entries: DEFAULT_CACHE_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl HydratorConfig {
    /// With default timeout
    #[inline]
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// With default TTL
    #[inline]
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With cache bound
    #[inline]
    #[must_use]
    pub fn with_max_cache_entries(mut self, entries: u64) -> Self {
        self.max_cache_entries = entries;
        self
    }

    /// With sweeper period
    #[inline]
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Duration as whole milliseconds, saturating
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Transport replacing the default one for a batch
///
/// `name` namespaces cache and in-flight entries: results fetched through
/// one override are never served to a batch using another, or none.
#[derive(Clone)]
pub struct TransportOverride {
    /// Cache namespace
    pub name: String,
    pub transport: Arc<dyn Transport>,
}

impl TransportOverride {
    /// Create override
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }
}

impl Debug for TransportOverride {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOverride")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Per-call overrides for one hydration batch
///
/// Unset fields fall back to [`HydratorConfig`]. Directive-level
/// `timeout_ms`/`ttl_ms` still take precedence over these.
#[derive(Clone, Default)]
pub struct HydrationSettings {
    /// Timeout override
    pub timeout: Option<Duration>,
    /// TTL override
    pub ttl: Option<Duration>,
    /// Retry override
    pub retry: Option<RetryPolicy>,
    /// Replacement for the default transport
    pub transport: Option<TransportOverride>,
}

impl HydrationSettings {
    /// Create empty overrides
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// With TTL
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// With a transport override cached under `name`
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(TransportOverride::new(name, transport));
        self
    }
}

impl Debug for HydrationSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrationSettings")
            .field("timeout", &self.timeout)
            .field("ttl", &self.ttl)
            .field("retry", &self.retry)
            .field("transport", &self.transport)
            .finish()
    }
}
