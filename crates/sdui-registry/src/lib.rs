//! SDUI Registry
//!
//! Maps component type names and versions to typed render capabilities.
//!
//! # Core Concepts
//!
//! - [`RenderCapability`]: a component's render function over opaque output `O`
//! - [`FallbackRenderer`]: infallible placeholder renderer
//! - [`ComponentRegistry`]: runtime `(type, version)` map with
//!   latest-compatible version fallback
//! - [`Resolution`]: `Found(entry) | NotFound`, never a panic
//!
//! # Example
//!
//! ```rust
//! use sdui_registry::{ComponentRegistry, RenderError};
//! use sdui_schema::Props;
//!
//! let registry = ComponentRegistry::<String>::new();
//! registry.register(
//!     "Badge",
//!     2,
//!     |props: &Props, _children: Vec<String>| -> Result<String, RenderError> {
//!         Ok(format!("badge:{}", props.len()))
//!     },
//!     ["label"],
//! );
//!
//! let entry = registry.resolve_latest_compatible("Badge", 3).into_option().unwrap();
//! assert_eq!(entry.version(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod capability;
pub mod registry;

pub use capability::{ErrorInfo, FailureKind, FallbackRenderer, RenderCapability, RenderError};
pub use registry::{ComponentRegistry, RegistryEntry, Resolution};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
