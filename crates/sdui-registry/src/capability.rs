//! Render boundary traits
//!
//! The engine never looks inside rendered output: `O` is whatever the host
//! application renders into (a virtual DOM node, an HTML string, a JSON
//! tree). Components implement [`RenderCapability`]; fallbacks implement
//! [`FallbackRenderer`], which cannot fail.

use sdui_schema::{NodePath, Props};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// A registered component's render function
pub trait RenderCapability<O>: Send + Sync {
    /// Render with merged props and already-rendered children
    ///
    /// # Errors
    /// Returns [`RenderError`] when the component cannot produce output.
    fn render(&self, props: &Props, children: Vec<O>) -> Result<O, RenderError>;
}

impl<O, F> RenderCapability<O> for F
where
    F: Fn(&Props, Vec<O>) -> Result<O, RenderError> + Send + Sync,
{
    fn render(&self, props: &Props, children: Vec<O>) -> Result<O, RenderError> {
        self(props, children)
    }
}

/// Always-renderable substitute for a failed node
///
/// Implementations must not panic. A panicking node-level fallback is
/// replaced by the default fallback, but the default fallback is the last
/// resort: `O` is opaque to the engine, so there is nothing left to render
/// in its place and its panic propagates out of the render pass.
pub trait FallbackRenderer<O>: Send + Sync {
    /// Render a placeholder for the node described by `error`
    fn render_fallback(&self, props: &Props, error: &ErrorInfo) -> O;
}

impl<O, F> FallbackRenderer<O> for F
where
    F: Fn(&Props, &ErrorInfo) -> O + Send + Sync,
{
    fn render_fallback(&self, props: &Props, error: &ErrorInfo) -> O {
        self(props, error)
    }
}

/// Failure raised by a render capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Component-specific failure
    #[error("render failed: {0}")]
    Failed(String),

    /// A prop had an unusable value
    #[error("invalid prop '{prop}': {reason}")]
    InvalidProp { prop: String, reason: String },

    /// The render function panicked
    #[error("render panicked: {0}")]
    Panicked(String),
}

impl RenderError {
    /// Create generic failure
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create invalid prop failure
    #[inline]
    pub fn invalid_prop(prop: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProp {
            prop: prop.into(),
            reason: reason.into(),
        }
    }
}

/// Why a node ended up as a fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// No registered (type, version) compatible with the node
    ComponentNotFound,
    /// Resolved component declares props the node does not have
    MissingRequiredProp,
    /// Hydration did not finish within its timeout
    HydrationTimeout,
    /// Hydration kept failing transiently until retries ran out
    HydrationTransient,
    /// Hydration failed permanently
    HydrationPermanent,
    /// The render capability returned an error or panicked
    RenderFailed,
}

impl FailureKind {
    /// Check if the failure came from data hydration
    #[inline]
    #[must_use]
    pub fn is_hydration(self) -> bool {
        matches!(
            self,
            Self::HydrationTimeout | Self::HydrationTransient | Self::HydrationPermanent
        )
    }

    /// Stable identifier
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ComponentNotFound => "ComponentNotFound",
            Self::MissingRequiredProp => "MissingRequiredProp",
            Self::HydrationTimeout => "HydrationTimeout",
            Self::HydrationTransient => "HydrationTransient",
            Self::HydrationPermanent => "HydrationPermanent",
            Self::RenderFailed => "RenderFailed",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure context handed to fallback renderers and recorded in metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Position of the failed node
    pub path: NodePath,
    /// Author-supplied node id, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Declared component type
    pub component_type: String,
    /// Declared component version
    pub version: u32,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

impl ErrorInfo {
    /// Create error info for a node
    #[inline]
    #[must_use]
    pub fn new(
        path: NodePath,
        component_type: impl Into<String>,
        version: u32,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path,
            node_id: None,
            component_type: component_type.into(),
            version,
            kind,
            message: message.into(),
        }
    }

    /// With node id
    #[inline]
    #[must_use]
    pub fn with_node_id(mut self, id: Option<String>) -> Self {
        self.node_id = id;
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} v{}): {}: {}",
            self.path, self.component_type, self.version, self.kind, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_render_capabilities() {
        let capability = |props: &Props, children: Vec<String>| -> Result<String, RenderError> {
            let title = props.get("title").and_then(|v| v.as_str()).unwrap_or("-");
            Ok(format!("{title}[{}]", children.join(",")))
        };

        let mut props = Props::new();
        props.insert("title".into(), "card".into());
        let out = capability
            .render(&props, vec!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(out, "card[a,b]");
    }

    #[test]
    fn closures_are_fallback_renderers() {
        let fallback = |_: &Props, error: &ErrorInfo| format!("unavailable: {}", error.kind);
        let info = ErrorInfo::new(
            NodePath::root(0),
            "Chart",
            2,
            FailureKind::ComponentNotFound,
            "no such component",
        );
        assert_eq!(
            fallback.render_fallback(&Props::new(), &info),
            "unavailable: ComponentNotFound"
        );
    }

    #[test]
    fn render_error_display() {
        assert_eq!(RenderError::failed("boom").to_string(), "render failed: boom");
        assert_eq!(
            RenderError::invalid_prop("count", "negative").to_string(),
            "invalid prop 'count': negative"
        );
    }

    #[test]
    fn failure_kind_classification() {
        assert!(FailureKind::HydrationTimeout.is_hydration());
        assert!(FailureKind::HydrationPermanent.is_hydration());
        assert!(!FailureKind::ComponentNotFound.is_hydration());
        assert_eq!(FailureKind::RenderFailed.to_string(), "RenderFailed");
    }

    #[test]
    fn error_info_display_and_serialize() {
        let info = ErrorInfo::new(
            NodePath::root(1).child(0),
            "Card",
            1,
            FailureKind::MissingRequiredProp,
            "missing required prop 'title'",
        )
        .with_node_id(Some("b".into()));

        assert_eq!(
            info.to_string(),
            "components[1].children[0] (Card v1): MissingRequiredProp: missing required prop 'title'"
        );

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["path"], "components[1].children[0]");
        assert_eq!(json["node_id"], "b");
        assert_eq!(json["kind"], "MissingRequiredProp");
    }
}
