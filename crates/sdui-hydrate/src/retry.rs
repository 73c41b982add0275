//! Retry with exponential backoff and jitter
//!
//! Transient transport failures are retried up to
//! [`RetryPolicy::max_retries`] times. Permanent failures return at once.

use crate::config::millis;
use crate::error::HydrationError;
use crate::transport::{FetchRequest, Transport, TransportError};
use rand::Rng;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry schedule for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Randomize delays to spread retries out
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// With retry count
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With base delay
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// With delay cap
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// With or without jitter
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts including the first
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Un-jittered delay before retry number `retry` (1-based)
    #[must_use]
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// With jitter the result lies in `[d/2, d]` where `d` is
    /// [`base_delay_for`](Self::base_delay_for).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = self.base_delay_for(retry);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let total = millis(delay);
        let half = total / 2;
        let spread = rand::rng().random_range(0..=total - half);
        Duration::from_millis(half + spread)
    }
}

/// Fetch through `transport`, retrying per `policy`
///
/// `request.timeout` is passed to the transport as its budget; attempts are
/// not cut short here, so a slow fetch can still finish and be cached after
/// its waiters have given up. `calls` is incremented once per transport call.
///
/// # Errors
/// [`HydrationError`] with kind `PermanentFailure` on the first permanent
/// failure, or `TransientFailure` once retries are exhausted.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    request: FetchRequest,
    policy: &RetryPolicy,
    calls: &AtomicU64,
) -> Result<Value, HydrationError> {
    let endpoint = request.endpoint.clone();
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        calls.fetch_add(1, Ordering::Relaxed);
        let outcome = transport.fetch(request.clone().with_attempt(attempt)).await;

        let err = match outcome {
            Ok(value) => {
                debug!(endpoint = %endpoint, attempt, "fetch succeeded");
                return Ok(value);
            }
            Err(TransportError::Permanent(message)) => {
                warn!(endpoint = %endpoint, attempt, error = %message, "permanent fetch failure");
                return Err(HydrationError::permanent(endpoint, message, attempt));
            }
            Err(TransportError::Transient(message)) => message,
        };

        if attempt >= max_attempts {
            warn!(endpoint = %endpoint, attempts = attempt, error = %err, "retries exhausted");
            return Err(HydrationError::transient(endpoint, err, attempt));
        }

        let delay = policy.delay_for(attempt);
        debug!(
            endpoint = %endpoint,
            attempt,
            delay_ms = millis(delay),
            error = %err,
            "transient fetch failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
