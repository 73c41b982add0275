//! SDUI Schema
//!
//! Typed page definitions for the server-driven UI engine and the validator
//! that produces them from raw JSON.
//!
//! # Core Concepts
//!
//! - [`PageDefinition`]: root of a page, an ordered list of components
//! - [`ComponentNode`]: one typed UI element with props, children and
//!   optional [`HydrationDirective`]s
//! - [`SchemaValidator`]: fail-fast structural validation reporting every
//!   problem at once
//! - [`NodePath`] / [`FieldPath`]: addressing used in diagnostics
//!
//! # Example
//!
//! ```rust
//! use sdui_schema::SchemaValidator;
//! use serde_json::json;
//!
//! let raw = json!({
//!     "components": [{ "type": "Card", "props": { "title": "Hi" } }]
//! });
//! let page = SchemaValidator::new().validate(&raw).unwrap();
//! assert_eq!(page.components[0].component_type, "Card");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod node;
mod path;
mod validate;

pub use node::{
    ComponentNode, DirectiveRef, HydrationDirective, NodeFallback, PageDefinition, Props,
    LATEST_COMPONENT_VERSION,
};
pub use path::{FieldPath, FieldSegment, NodePath};
pub use validate::{
    SchemaValidator, ValidationError, ValidationErrorKind, ValidationErrors, DEFAULT_MAX_DEPTH,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
