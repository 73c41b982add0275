//! Transport boundary for hydration fetches
//!
//! The host application supplies its own HTTP/RPC client by implementing
//! [`Transport`]. The only contract beyond "return JSON" is the failure
//! classification: [`TransportError::Transient`] is retried,
//! [`TransportError::Permanent`] is not.

use async_trait::async_trait;
use sdui_schema::Props;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// One outgoing fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Endpoint URL or identifier
    pub endpoint: String,
    /// Request parameters
    pub params: Props,
    /// Time budget for this attempt
    pub timeout: Duration,
    /// 1-based attempt number
    pub attempt: u32,
}

impl FetchRequest {
    /// Create first-attempt request
    #[inline]
    #[must_use]
    pub fn new(endpoint: impl Into<String>, params: Props, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
            timeout,
            attempt: 1,
        }
    }

    /// Same request for a later attempt
    #[inline]
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// Host-supplied fetch capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch raw data for a request
    ///
    /// # Errors
    /// Returns a classified [`TransportError`].
    async fn fetch(&self, request: FetchRequest) -> Result<Value, TransportError>;
}

/// Classified transport failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Network error, 5xx, throttling: worth retrying
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// 4xx, malformed request, decode failure: retrying will not help
    #[error("permanent transport failure: {0}")]
    Permanent(String),
}

impl TransportError {
    /// Create transient failure
    #[inline]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create permanent failure
    #[inline]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    /// Classify an HTTP-style status code
    ///
    /// 408, 425, 429 and 5xx are transient; everything else permanent.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = format!("status {status}: {}", message.into());
        match status {
            408 | 425 | 429 | 500..=599 => Self::Transient(message),
            _ => Self::Permanent(message),
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Failure detail
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(message) | Self::Permanent(message) => message,
        }
    }
}

/// Transport serving canned values keyed by endpoint
///
/// Useful for offline previews and fixture-driven rendering. Unknown
/// endpoints fail permanently.
#[derive(Debug, Clone, Default)]
pub struct StaticTransport {
    responses: HashMap<String, Value>,
}

impl StaticTransport {
    /// Create empty transport
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a canned response
    #[inline]
    #[must_use]
    pub fn with_response(mut self, endpoint: impl Into<String>, value: Value) -> Self {
        self.responses.insert(endpoint.into(), value);
        self
    }

    /// Build from a JSON object mapping endpoint to response
    #[must_use]
    pub fn from_map(map: &Props) -> Self {
        Self {
            responses: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Number of canned endpoints
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<Value, TransportError> {
        self.responses
            .get(&request.endpoint)
            .cloned()
            .ok_or_else(|| TransportError::from_status(404, request.endpoint))
    }
}

/// Named transports selectable by a directive's `fetcher` field
#[derive(Clone, Default)]
pub struct FetcherSet {
    fetchers: HashMap<String, Arc<dyn Transport>>,
}

impl FetcherSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a named transport
    pub fn insert(&mut self, name: impl Into<String>, transport: Arc<dyn Transport>) {
        self.fetchers.insert(name.into(), transport);
    }

    /// Look up a named transport
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Transport>> {
        self.fetchers.get(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fetchers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Debug for FetcherSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherSet")
            .field("names", &self.names())
            .finish()
    }
}
