//! SDUI Core - server-driven UI render engine
//!
//! Turns a raw JSON page definition into rendered output:
//! - Validates the definition, reporting every structural error at once
//! - Hydrates all data directives concurrently, with caching and retries
//! - Resolves each node against a versioned component registry
//! - Renders depth-first with a per-node error boundary, so one broken
//!   component becomes a fallback instead of a broken page
//!
//! # Example
//!
//! ```rust
//! use sdui_core::prelude::*;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = ComponentRegistry::<Value>::new();
//! registry.register(
//!     "Card",
//!     1,
//!     |props: &Props, _children: Vec<Value>| -> Result<Value, RenderError> {
//!         Ok(json!({ "card": props.get("title").cloned() }))
//!     },
//!     ["title"],
//! );
//!
//! let transport = StaticTransport::new().with_response("/x", json!({ "title": "Hello" }));
//! let engine = RenderEngine::new(
//!     Arc::new(registry),
//!     Arc::new(DataHydrator::new(Arc::new(transport))),
//! );
//! let options = RenderOptions::new(Arc::new(|_: &Props, e: &ErrorInfo| json!({ "fallback": e.kind })));
//!
//! let page = json!({
//!     "components": [
//!         { "type": "Card", "version": 1, "hydrate": [{ "endpoint": "/x" }] },
//!         { "type": "Unknown", "version": 1 }
//!     ]
//! });
//! let result = engine.render_page(&page, &options).await.unwrap();
//!
//! assert_eq!(result.outputs[0], json!({ "card": "Hello" }));
//! assert_eq!(result.outputs[1], json!({ "fallback": "ComponentNotFound" }));
//! assert_eq!(result.metadata.errors.len(), 1);
//! # });
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod boundary;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod options;
pub mod state;

pub use boundary::ErrorBoundary;
pub use config::EngineConfig;
pub use engine::{render_page, RenderEngine, DEFAULT_BIND_PROP, HYDRATION_ERRORS_PROP};
pub use error::{ConfigError, PageError, Result};
pub use metadata::{NodeOutcome, NodeReport, RenderMetadata, RenderResult};
pub use options::RenderOptions;
pub use state::{allowed_transitions, validate_transition, IllegalTransition, NodeState, StateTrace};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the render engine
    pub use crate::{EngineConfig, PageError, RenderEngine, RenderOptions, RenderResult};
    pub use sdui_hydrate::{DataHydrator, HydratorConfig, StaticTransport, Transport, TransportError};
    pub use sdui_registry::{
        ComponentRegistry, ErrorInfo, FailureKind, FallbackRenderer, RenderCapability, RenderError,
    };
    pub use sdui_schema::{PageDefinition, Props, SchemaValidator};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
