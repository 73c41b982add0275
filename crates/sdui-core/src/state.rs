//! Per-node render lifecycle
//!
//! Every node walks `Pending -> Hydrating -> Resolving -> Rendering` and
//! ends in exactly one of [`NodeState::Rendered`] or [`NodeState::Fallback`].
//! Transitions are checked against [`allowed_transitions`].

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Lifecycle state of one node during a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeState {
    Pending,
    Hydrating,
    HydrationOk,
    HydrationFailed,
    Resolving,
    Resolved,
    NotFound,
    Rendering,
    Rendered,
    RenderFailed,
    Fallback,
}

impl NodeState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rendered | Self::Fallback)
    }
}

impl Display for NodeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Illegal lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal node state transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: NodeState,
    pub to: NodeState,
}

/// Validates a state transition.
///
/// # Errors
/// [`IllegalTransition`] if `to` is not reachable from `from` in one step.
pub fn validate_transition(from: NodeState, to: NodeState) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: NodeState) -> &'static [NodeState] {
    use NodeState::*;
    match from {
        // Nodes without directives skip hydration.
        Pending => &[Hydrating, Resolving],
        Hydrating => &[HydrationOk, HydrationFailed],
        HydrationOk => &[Resolving],
        HydrationFailed => &[Fallback],
        Resolving => &[Resolved, NotFound],
        // Resolved -> Fallback on missing required props.
        Resolved => &[Rendering, Fallback],
        NotFound => &[Fallback],
        Rendering => &[Rendered, RenderFailed],
        RenderFailed => &[Fallback],
        Rendered | Fallback => &[],
    }
}

/// Recorded path of one node through the lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StateTrace(Vec<NodeState>);

impl StateTrace {
    /// Start a trace in `Pending`
    #[must_use]
    pub fn new() -> Self {
        Self(vec![NodeState::Pending])
    }

    /// Current state
    #[must_use]
    pub fn current(&self) -> NodeState {
        self.0.last().copied().unwrap_or(NodeState::Pending)
    }

    /// Move to `to`
    ///
    /// # Errors
    /// [`IllegalTransition`] if the step is not allowed; the trace is left
    /// unchanged.
    pub fn advance(&mut self, to: NodeState) -> Result<(), IllegalTransition> {
        validate_transition(self.current(), to)?;
        self.0.push(to);
        Ok(())
    }

    /// Every state visited, in order
    #[inline]
    #[must_use]
    pub fn states(&self) -> &[NodeState] {
        &self.0
    }

    /// Consume into visited states
    #[inline]
    #[must_use]
    pub fn into_states(self) -> Vec<NodeState> {
        self.0
    }
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NodeState::*;

    #[test]
    fn happy_path_with_hydration() {
        let mut trace = StateTrace::new();
        for state in [Hydrating, HydrationOk, Resolving, Resolved, Rendering, Rendered] {
            trace.advance(state).unwrap();
        }
        assert!(trace.current().is_terminal());
        assert_eq!(trace.states().len(), 7);
    }

    #[test]
    fn nodes_without_directives_skip_hydration() {
        assert!(validate_transition(Pending, Resolving).is_ok());
    }

    #[test]
    fn every_failure_state_leads_to_fallback() {
        for state in [HydrationFailed, NotFound, RenderFailed, Resolved] {
            assert!(validate_transition(state, Fallback).is_ok(), "{state}");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(allowed_transitions(Rendered).is_empty());
        assert!(allowed_transitions(Fallback).is_empty());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        assert_eq!(
            validate_transition(Pending, Rendered),
            Err(IllegalTransition {
                from: Pending,
                to: Rendered
            })
        );
        assert!(validate_transition(Rendered, Fallback).is_err());
        assert!(validate_transition(NotFound, Rendering).is_err());

        let mut trace = StateTrace::new();
        assert!(trace.advance(Rendering).is_err());
        assert_eq!(trace.current(), Pending);
    }

    #[test]
    fn illegal_transition_display() {
        let err = validate_transition(Hydrating, Rendered).unwrap_err();
        assert_eq!(
            err.to_string(),
            "illegal node state transition: Hydrating -> Rendered"
        );
    }
}
