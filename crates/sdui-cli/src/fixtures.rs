//! Offline fixtures for local renders
//!
//! A fixture file stands in for the backend and the host application:
//!
//! ```json
//! {
//!   "endpoints": { "/user": { "name": "Ada" } },
//!   "components": [{ "type": "Card", "version": 2, "required": ["title"] }],
//!   "fallbacks": ["skeleton"]
//! }
//! ```
//!
//! Every component renders as a JSON echo of its inputs, so the output
//! shows exactly which props and children each node received.

use anyhow::{Context, Result};
use sdui_hydrate::StaticTransport;
use sdui_registry::{ComponentRegistry, ErrorInfo, FallbackRenderer, RenderError};
use sdui_schema::{Props, LATEST_COMPONENT_VERSION};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Fixtures {
    /// Canned response per endpoint
    pub(crate) endpoints: Props,
    pub(crate) components: Vec<ComponentFixture>,
    /// Names of node fallback renderers to register
    pub(crate) fallbacks: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ComponentFixture {
    #[serde(rename = "type")]
    pub(crate) component_type: String,
    #[serde(default = "latest_version")]
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) required: Vec<String>,
}

fn latest_version() -> u32 {
    LATEST_COMPONENT_VERSION
}

impl Fixtures {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixtures {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing fixtures {}", path.display()))
    }

    pub(crate) fn transport(&self) -> StaticTransport {
        StaticTransport::from_map(&self.endpoints)
    }

    pub(crate) fn registry(&self) -> ComponentRegistry<Value> {
        let registry = ComponentRegistry::new();
        for component in &self.components {
            let type_name = component.component_type.clone();
            let version = component.version;
            let replaced = registry.register(
                component.component_type.as_str(),
                version,
                move |props: &Props, children: Vec<Value>| -> Result<Value, RenderError> {
                    Ok(json!({
                        "type": type_name,
                        "version": version,
                        "props": props,
                        "children": children,
                    }))
                },
                component.required.iter().cloned(),
            );
            if replaced {
                tracing::warn!(
                    component = %component.component_type,
                    version,
                    "duplicate component fixture replaced"
                );
            }
        }
        for name in &self.fallbacks {
            let label = name.clone();
            registry.register_fallback(name.as_str(), move |props: &Props, error: &ErrorInfo| {
                json!({
                    "fallback": label,
                    "kind": error.kind,
                    "path": error.path,
                    "props": props,
                })
            });
        }
        registry
    }
}

/// Fallback used for nodes without a registered node fallback
pub(crate) fn default_fallback() -> Arc<dyn FallbackRenderer<Value>> {
    Arc::new(|_: &Props, error: &ErrorInfo| {
        json!({
            "fallback": "default",
            "kind": error.kind,
            "path": error.path,
            "type": error.component_type,
            "message": error.message,
        })
    })
}
