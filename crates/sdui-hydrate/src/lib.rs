//! SDUI Hydrate
//!
//! Fetches the remote data that page nodes declare through hydration
//! directives.
//!
//! # Core Concepts
//!
//! - [`DataHydrator`]: scatter/gather over a batch of directives, one
//!   outcome per directive, failures isolated
//! - [`HydrationCache`]: bounded TTL cache keyed by [`CacheKey`]
//! - Request coalescing: identical concurrent requests share one fetch
//! - [`RetryPolicy`]: exponential backoff with jitter for transient
//!   failures; permanent failures are never retried
//! - [`Transport`]: host-supplied fetch capability
//!
//! # Example
//!
//! ```rust
//! use sdui_hydrate::{CacheStatus, DataHydrator, StaticTransport};
//! use sdui_schema::HydrationDirective;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let transport = StaticTransport::new().with_response("/x", json!({ "title": "Hello" }));
//! let hydrator = DataHydrator::new(Arc::new(transport));
//!
//! let batch = hydrator.hydrate(&[HydrationDirective::new("/x")]).await;
//! assert_eq!(batch.outcomes[0].status, CacheStatus::Miss);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod hydrator;
pub mod key;
pub mod retry;
pub mod transport;

pub use cache::{CacheEntry, CacheStats, HydrationCache, SweeperHandle, DEFAULT_CACHE_CAPACITY};
pub use config::{
    HydrationSettings, HydratorConfig, TransportOverride, DEFAULT_SWEEP_INTERVAL, DEFAULT_TIMEOUT,
    DEFAULT_TTL,
};
pub use error::{HydrationError, HydrationErrorKind, Result};
pub use hydrator::{CacheStatus, DataHydrator, HydrationBatch, HydrationOutcome, HydrationStats};
pub use key::CacheKey;
pub use retry::{fetch_with_retry, RetryPolicy};
pub use transport::{FetchRequest, FetcherSet, StaticTransport, Transport, TransportError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
