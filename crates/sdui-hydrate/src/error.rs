//! Hydration error types

use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Result type for hydration operations
pub type Result<T> = std::result::Result<T, HydrationError>;

/// Classification of a hydration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HydrationErrorKind {
    /// Directive did not resolve within its timeout
    Timeout,
    /// Transport kept failing transiently until retries were exhausted
    TransientFailure,
    /// Transport failed in a way retrying cannot fix
    PermanentFailure,
}

impl Display for HydrationErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::TransientFailure => "transient failure",
            Self::PermanentFailure => "permanent failure",
        })
    }
}

/// A failed hydration directive
///
/// Cloneable so one fetch result can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind} for '{endpoint}' after {attempts} attempt(s): {message}")]
pub struct HydrationError {
    /// Failure classification
    pub kind: HydrationErrorKind,
    /// Endpoint of the failed directive
    pub endpoint: String,
    /// Failure detail
    pub message: String,
    /// Transport attempts made before giving up
    pub attempts: u32,
}

impl HydrationError {
    /// Create error
    #[inline]
    pub fn new(
        kind: HydrationErrorKind,
        endpoint: impl Into<String>,
        message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            message: message.into(),
            attempts,
        }
    }

    /// Directive exceeded its time budget
    #[inline]
    pub fn timeout(endpoint: impl Into<String>, after: Duration) -> Self {
        Self::new(
            HydrationErrorKind::Timeout,
            endpoint,
            format!("no result within {}ms", after.as_millis()),
            0,
        )
    }

    /// Retries exhausted on transient failures
    #[inline]
    pub fn transient(endpoint: impl Into<String>, message: impl Into<String>, attempts: u32) -> Self {
        Self::new(HydrationErrorKind::TransientFailure, endpoint, message, attempts)
    }

    /// Non-retryable failure
    #[inline]
    pub fn permanent(endpoint: impl Into<String>, message: impl Into<String>, attempts: u32) -> Self {
        Self::new(HydrationErrorKind::PermanentFailure, endpoint, message, attempts)
    }

    /// Directive named a fetcher that is not registered
    #[inline]
    pub fn unknown_fetcher(endpoint: impl Into<String>, fetcher: &str) -> Self {
        Self::permanent(endpoint, format!("unknown fetcher '{fetcher}'"), 0)
    }

    /// Fetch task ended without reporting a result
    #[inline]
    pub fn aborted(endpoint: impl Into<String>) -> Self {
        Self::transient(endpoint, "fetch task ended without a result", 0)
    }

    /// Check if a later attempt could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind != HydrationErrorKind::PermanentFailure
    }

    /// Check if error is a timeout
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == HydrationErrorKind::Timeout
    }
}
