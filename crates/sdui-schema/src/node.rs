//! Page definition data model
//!
//! These are the validated, typed forms produced by
//! [`SchemaValidator`](crate::SchemaValidator). They are immutable once
//! built; the render engine copies hydrated data into fresh prop maps
//! instead of mutating the definition.

use crate::path::NodePath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Component properties: arbitrary JSON keyed by name
pub type Props = serde_json::Map<String, Value>;

/// Version assigned to nodes that omit `version`
pub const LATEST_COMPONENT_VERSION: u32 = 1;

/// Root of a server-driven page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    /// Optional page title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Optional page schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Top-level components in render order
    pub components: Vec<ComponentNode>,
}

impl PageDefinition {
    /// Create page from top-level components
    #[inline]
    #[must_use]
    pub fn new(components: Vec<ComponentNode>) -> Self {
        Self {
            title: None,
            version: None,
            components,
        }
    }

    /// With page title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Visit every node in pre-order together with its path
    pub fn walk(&self) -> impl Iterator<Item = (NodePath, &ComponentNode)> {
        let mut stack: Vec<(NodePath, &ComponentNode)> = self
            .components
            .iter()
            .enumerate()
            .rev()
            .map(|(i, node)| (NodePath::root(i), node))
            .collect();

        std::iter::from_fn(move || {
            let (path, node) = stack.pop()?;
            for (i, child) in node.children.iter().enumerate().rev() {
                stack.push((path.child(i), child));
            }
            Some((path, node))
        })
    }

    /// Total number of nodes in the tree
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    /// Every hydration directive in the tree, in pre-order
    ///
    /// Each entry carries the owning node's path and the directive's index
    /// within that node's `hydrate` list.
    #[must_use]
    pub fn directives(&self) -> Vec<DirectiveRef<'_>> {
        self.walk()
            .flat_map(|(path, node)| {
                node.hydrate
                    .iter()
                    .enumerate()
                    .map(move |(index, directive)| DirectiveRef {
                        node: path.clone(),
                        index,
                        directive,
                    })
            })
            .collect()
    }

    /// Look up a node by path
    #[must_use]
    pub fn node(&self, path: &NodePath) -> Option<&ComponentNode> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.components.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }
}

/// A hydration directive located in the tree
#[derive(Debug, Clone)]
pub struct DirectiveRef<'a> {
    /// Path of the owning node
    pub node: NodePath,
    /// Index within the node's `hydrate` list
    pub index: usize,
    /// The directive itself
    pub directive: &'a HydrationDirective,
}

/// One UI element in the page tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Optional author-supplied identifier, used in diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Registered component type name
    #[serde(rename = "type")]
    pub component_type: String,

    /// Component schema version
    pub version: u32,

    /// Declared properties
    #[serde(default)]
    pub props: Props,

    /// Children in render order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentNode>,

    /// Remote data to merge into `props` before rendering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hydrate: Vec<HydrationDirective>,

    /// Node-level fallback used when this node cannot render
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<NodeFallback>,
}

impl ComponentNode {
    /// Create node with type and version
    #[inline]
    #[must_use]
    pub fn new(component_type: impl Into<String>, version: u32) -> Self {
        Self {
            id: None,
            component_type: component_type.into(),
            version,
            props: Props::new(),
            children: Vec::new(),
            hydrate: Vec::new(),
            fallback: None,
        }
    }

    /// With identifier
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// With a single prop
    #[inline]
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// With a child appended
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: ComponentNode) -> Self {
        self.children.push(child);
        self
    }

    /// With a hydration directive appended
    #[inline]
    #[must_use]
    pub fn with_hydration(mut self, directive: HydrationDirective) -> Self {
        self.hydrate.push(directive);
        self
    }

    /// With node-level fallback
    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, fallback: NodeFallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Check if node needs remote data
    #[inline]
    #[must_use]
    pub fn needs_hydration(&self) -> bool {
        !self.hydrate.is_empty()
    }
}

/// Remote data reference attached to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationDirective {
    /// Endpoint URL or identifier, passed verbatim to the transport
    pub endpoint: String,

    /// Request parameters
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub params: Props,

    /// Cache TTL override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,

    /// Timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Named transport to use instead of the default one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetcher: Option<String>,

    /// Prop name receiving the result
    ///
    /// When absent, an object result is shallow-merged into props and any
    /// other value is bound to `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Value merged in place of the result when the fetch fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_data: Option<Value>,
}

impl HydrationDirective {
    /// Create directive for endpoint
    #[inline]
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Props::new(),
            ttl_ms: None,
            timeout_ms: None,
            fetcher: None,
            bind: None,
            fallback_data: None,
        }
    }

    /// With a request parameter
    #[inline]
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// With TTL override
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = Some(duration_ms(ttl));
        self
    }

    /// With timeout override
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// With named fetcher
    #[inline]
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: impl Into<String>) -> Self {
        self.fetcher = Some(fetcher.into());
        self
    }

    /// With result binding
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, prop: impl Into<String>) -> Self {
        self.bind = Some(prop.into());
        self
    }

    /// With fallback data
    #[inline]
    #[must_use]
    pub fn with_fallback_data(mut self, data: impl Into<Value>) -> Self {
        self.fallback_data = Some(data.into());
        self
    }

    /// TTL override as a duration
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// Timeout override as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Node-level fallback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFallback {
    /// Name of a fallback renderer registered in the component registry
    pub renderer: String,

    /// Extra props handed to the fallback renderer
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
}

impl NodeFallback {
    /// Create fallback referencing a named renderer
    #[inline]
    #[must_use]
    pub fn new(renderer: impl Into<String>) -> Self {
        Self {
            renderer: renderer.into(),
            props: Props::new(),
        }
    }

    /// With an extra prop
    #[inline]
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
