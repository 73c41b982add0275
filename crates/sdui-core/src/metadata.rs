//! Render pass results and diagnostics

use crate::state::NodeState;
use chrono::{DateTime, Utc};
use sdui_hydrate::HydrationStats;
use sdui_registry::{ErrorInfo, FailureKind};
use sdui_schema::NodePath;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// How a node ended up in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeOutcome {
    Rendered,
    Fallback,
}

/// Per-node diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub path: NodePath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub component_type: String,
    /// Version declared by the node
    pub requested_version: u32,
    /// Version of the registry entry used, if one resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_version: Option<u32>,
    pub outcome: NodeOutcome,
    /// Lifecycle states visited, `Pending` first
    pub states: Vec<NodeState>,
    /// Time spent in this node, children included
    pub elapsed: Duration,
}

/// Aggregated diagnostics for one render pass
#[derive(Debug, Clone, Serialize)]
pub struct RenderMetadata {
    /// Unique id of the pass, for log correlation
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Every visited node, in pre-order
    pub nodes: Vec<NodeReport>,
    /// Recovered failures, sorted by node path
    pub errors: Vec<ErrorInfo>,
    pub hydration: HydrationStats,
    pub hydration_elapsed: Duration,
    pub duration: Duration,
}

impl RenderMetadata {
    pub(crate) fn new(pass_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            pass_id,
            started_at,
            nodes: Vec::new(),
            errors: Vec::new(),
            hydration: HydrationStats::default(),
            hydration_elapsed: Duration::ZERO,
            duration: Duration::ZERO,
        }
    }

    /// Directives served from cache
    #[inline]
    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.hydration.hits
    }

    /// Directives that started a fetch
    #[inline]
    #[must_use]
    pub fn cache_misses(&self) -> u64 {
        self.hydration.misses
    }

    /// Nodes rendered by their own component
    #[must_use]
    pub fn rendered_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.outcome == NodeOutcome::Rendered)
            .count()
    }

    /// Nodes replaced by a fallback
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.outcome == NodeOutcome::Fallback)
            .count()
    }

    /// Errors of one kind
    pub fn errors_of(&self, kind: FailureKind) -> impl Iterator<Item = &ErrorInfo> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Report for the node at `path`
    #[must_use]
    pub fn node(&self, path: &NodePath) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| &n.path == path)
    }

    /// Check if every node rendered without recovery
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Rendered outputs plus diagnostics
#[derive(Debug, Clone)]
pub struct RenderResult<O> {
    /// One output per top-level component, in definition order
    pub outputs: Vec<O>,
    pub metadata: RenderMetadata,
}
