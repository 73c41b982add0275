//! Per-pass render options

use sdui_hydrate::{HydrationSettings, RetryPolicy, Transport, TransportOverride};
use sdui_registry::FallbackRenderer;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Options for one `render_page` call
///
/// Unset hydration fields use the hydrator's configuration.
pub struct RenderOptions<O> {
    /// Renderer for failed nodes without a usable node-level fallback
    pub default_fallback: Arc<dyn FallbackRenderer<O>>,
    /// Timeout for directives that set none
    pub hydration_timeout: Option<Duration>,
    /// Retry count for transient failures
    pub hydration_retry_count: Option<u32>,
    /// TTL for directives that set none
    pub cache_ttl: Option<Duration>,
    /// Replacement for the hydrator's default transport, cached under its name
    pub fetcher: Option<TransportOverride>,
}

impl<O> RenderOptions<O> {
    /// Create options with a default fallback
    #[inline]
    #[must_use]
    pub fn new(default_fallback: Arc<dyn FallbackRenderer<O>>) -> Self {
        Self {
            default_fallback,
            hydration_timeout: None,
            hydration_retry_count: None,
            cache_ttl: None,
            fetcher: None,
        }
    }

    /// With hydration timeout
    #[inline]
    #[must_use]
    pub fn with_hydration_timeout(mut self, timeout: Duration) -> Self {
        self.hydration_timeout = Some(timeout);
        self
    }

    /// With retry count
    #[inline]
    #[must_use]
    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.hydration_retry_count = Some(retries);
        self
    }

    /// With cache TTL
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// With transport override
    ///
    /// Results are cached under `name`, apart from the default transport's
    /// and every other override's.
    #[inline]
    #[must_use]
    pub fn with_fetcher(mut self, name: impl Into<String>, fetcher: Arc<dyn Transport>) -> Self {
        self.fetcher = Some(TransportOverride::new(name, fetcher));
        self
    }

    /// Hydration overrides, with retry count applied on top of `base_retry`
    #[must_use]
    pub fn hydration_settings(&self, base_retry: RetryPolicy) -> HydrationSettings {
        HydrationSettings {
            timeout: self.hydration_timeout,
            ttl: self.cache_ttl,
            retry: self
                .hydration_retry_count
                .map(|n| base_retry.with_max_retries(n)),
            transport: self.fetcher.clone(),
        }
    }
}

impl<O> Clone for RenderOptions<O> {
    fn clone(&self) -> Self {
        Self {
            default_fallback: Arc::clone(&self.default_fallback),
            hydration_timeout: self.hydration_timeout,
            hydration_retry_count: self.hydration_retry_count,
            cache_ttl: self.cache_ttl,
            fetcher: self.fetcher.clone(),
        }
    }
}

impl<O> Debug for RenderOptions<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("hydration_timeout", &self.hydration_timeout)
            .field("hydration_retry_count", &self.hydration_retry_count)
            .field("cache_ttl", &self.cache_ttl)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}
