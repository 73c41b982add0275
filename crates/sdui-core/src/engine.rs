//! Render engine
//!
//! One pass: validate, hydrate every directive in one concurrent batch,
//! then walk the tree depth-first resolving and rendering each node inside
//! its own error boundary. Only validation can fail the page.

use crate::boundary::ErrorBoundary;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::metadata::{NodeOutcome, NodeReport, RenderMetadata, RenderResult};
use crate::options::RenderOptions;
use crate::state::{NodeState, StateTrace};
use chrono::Utc;
use sdui_hydrate::{DataHydrator, HydrationBatch, HydrationError, HydrationErrorKind, Transport};
use sdui_registry::{ComponentRegistry, ErrorInfo, FailureKind};
use sdui_schema::{
    ComponentNode, DirectiveRef, HydrationDirective, NodePath, PageDefinition, Props,
    SchemaValidator,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Prop under which failed directives are reported to components
pub const HYDRATION_ERRORS_PROP: &str = "_hydration_errors";

/// Prop that non-object results bind to when a directive has no `bind`
pub const DEFAULT_BIND_PROP: &str = "data";

/// Server-driven page renderer
///
/// Owns no global state: the registry and hydrator are injected and may be
/// shared between engines.
pub struct RenderEngine<O> {
    registry: Arc<ComponentRegistry<O>>,
    hydrator: Arc<DataHydrator>,
    validator: SchemaValidator,
}

impl<O> RenderEngine<O> {
    /// Create engine with a default validator
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry<O>>, hydrator: Arc<DataHydrator>) -> Self {
        Self {
            registry,
            hydrator,
            validator: SchemaValidator::new(),
        }
    }

    /// Build engine and hydrator from file configuration
    #[must_use]
    pub fn from_config(
        registry: Arc<ComponentRegistry<O>>,
        transport: Arc<dyn Transport>,
        config: &EngineConfig,
    ) -> Self {
        let hydrator = DataHydrator::with_config(transport, config.hydrator_config());
        Self::new(registry, Arc::new(hydrator)).with_validator(config.validator())
    }

    /// With validator
    #[inline]
    #[must_use]
    pub fn with_validator(mut self, validator: SchemaValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Component registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry<O>> {
        &self.registry
    }

    /// Data hydrator
    #[inline]
    #[must_use]
    pub fn hydrator(&self) -> &Arc<DataHydrator> {
        &self.hydrator
    }

    /// Schema validator
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Validate and render a raw page definition
    ///
    /// # Errors
    /// [`PageError::Validation`](crate::PageError::Validation) if the
    /// definition is malformed. Every other failure is recovered per node.
    ///
    /// # Panics
    /// Only if `options.default_fallback` panics; fallback renderers must be
    /// infallible.
    #[instrument(skip_all, fields(pass_id = tracing::field::Empty))]
    pub async fn render_page(
        &self,
        raw: &Value,
        options: &RenderOptions<O>,
    ) -> Result<RenderResult<O>> {
        let page = match self.validator.validate(raw) {
            Ok(page) => page,
            Err(errors) => {
                warn!(errors = errors.len(), "page definition rejected");
                return Err(errors.into());
            }
        };
        Ok(self.render_definition(&page, options).await)
    }

    /// Render an already validated page
    pub async fn render_definition(
        &self,
        page: &PageDefinition,
        options: &RenderOptions<O>,
    ) -> RenderResult<O> {
        let pass_id = Uuid::new_v4();
        tracing::Span::current().record("pass_id", tracing::field::display(&pass_id));
        let started = Instant::now();
        let mut metadata = RenderMetadata::new(pass_id, Utc::now());

        let refs = page.directives();
        let directives: Vec<HydrationDirective> = refs.iter().map(|r| r.directive.clone()).collect();
        let settings = options.hydration_settings(self.hydrator.config().retry);
        let batch = self.hydrator.hydrate_with(&directives, &settings).await;
        metadata.hydration = batch.stats;
        metadata.hydration_elapsed = batch.elapsed;

        let mut by_node: HashMap<NodePath, Vec<usize>> = HashMap::new();
        for (i, r) in refs.iter().enumerate() {
            by_node.entry(r.node.clone()).or_default().push(i);
        }

        let mut pass = Pass {
            registry: &self.registry,
            options,
            refs: &refs,
            batch: &batch,
            by_node,
            nodes: Vec::with_capacity(page.node_count()),
            errors: Vec::new(),
        };
        let outputs: Vec<O> = page
            .components
            .iter()
            .enumerate()
            .map(|(i, node)| pass.render_node(node, NodePath::root(i)))
            .collect();

        let Pass {
            mut nodes,
            mut errors,
            ..
        } = pass;
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        errors.sort_by(|a, b| a.path.cmp(&b.path));
        metadata.nodes = nodes;
        metadata.errors = errors;
        metadata.duration = started.elapsed();

        info!(
            nodes = metadata.nodes.len(),
            fallbacks = metadata.fallback_count(),
            cache_hits = metadata.cache_hits(),
            cache_misses = metadata.cache_misses(),
            elapsed_ms = u64::try_from(metadata.duration.as_millis()).unwrap_or(u64::MAX),
            "render pass complete"
        );

        RenderResult { outputs, metadata }
    }
}

impl<O> Debug for RenderEngine<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("registry", &self.registry)
            .field("hydrator", &self.hydrator)
            .field("validator", &self.validator)
            .finish()
    }
}

/// Validate and render `raw` with `engine`
///
/// # Errors
/// See [`RenderEngine::render_page`].
pub async fn render_page<O>(
    engine: &RenderEngine<O>,
    raw: &Value,
    options: &RenderOptions<O>,
) -> Result<RenderResult<O>> {
    engine.render_page(raw, options).await
}

/// State of one tree walk
struct Pass<'a, O> {
    registry: &'a ComponentRegistry<O>,
    options: &'a RenderOptions<O>,
    refs: &'a [DirectiveRef<'a>],
    batch: &'a HydrationBatch,
    /// Outcome indices per node, in directive order
    by_node: HashMap<NodePath, Vec<usize>>,
    nodes: Vec<NodeReport>,
    errors: Vec<ErrorInfo>,
}

/// Why a node is being replaced
struct Failure {
    kind: FailureKind,
    message: String,
    resolved_version: Option<u32>,
}

impl<O> Pass<'_, O> {
    fn render_node(&mut self, node: &ComponentNode, path: NodePath) -> O {
        let started = Instant::now();
        let mut trace = StateTrace::new();
        let mut props = node.props.clone();

        if let Some(indices) = self.by_node.remove(&path) {
            step(&mut trace, NodeState::Hydrating);
            let failure = self.merge_hydration(&mut props, &indices);
            if let Some(failure) = failure {
                step(&mut trace, NodeState::HydrationFailed);
                return self.fail(node, path, trace, &props, failure, started);
            }
            step(&mut trace, NodeState::HydrationOk);
        }

        step(&mut trace, NodeState::Resolving);
        let resolution = match self.registry.resolve(&node.component_type, node.version) {
            found if found.is_found() => found,
            _ => self
                .registry
                .resolve_latest_compatible(&node.component_type, node.version),
        };
        let Some(entry) = resolution.into_option() else {
            step(&mut trace, NodeState::NotFound);
            let failure = Failure {
                kind: FailureKind::ComponentNotFound,
                message: format!(
                    "no component '{}' registered at or below version {}",
                    node.component_type, node.version
                ),
                resolved_version: None,
            };
            return self.fail(node, path, trace, &props, failure, started);
        };
        step(&mut trace, NodeState::Resolved);
        if entry.version() != node.version {
            debug!(
                path = %path,
                component = %node.component_type,
                requested = node.version,
                resolved = entry.version(),
                "resolved older compatible version"
            );
        }

        let missing = entry.missing_required_props(&props);
        if !missing.is_empty() {
            let failure = Failure {
                kind: FailureKind::MissingRequiredProp,
                message: format!("missing required prop(s): {}", missing.join(", ")),
                resolved_version: Some(entry.version()),
            };
            return self.fail(node, path, trace, &props, failure, started);
        }

        step(&mut trace, NodeState::Rendering);
        let children: Vec<O> = node
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| self.render_node(child, path.child(i)))
            .collect();

        match ErrorBoundary::render(entry.capability().as_ref(), &props, children) {
            Ok(output) => {
                step(&mut trace, NodeState::Rendered);
                self.record(node, path, Some(entry.version()), NodeOutcome::Rendered, trace, started);
                output
            }
            Err(err) => {
                step(&mut trace, NodeState::RenderFailed);
                let failure = Failure {
                    kind: FailureKind::RenderFailed,
                    message: err.to_string(),
                    resolved_version: Some(entry.version()),
                };
                self.fail(node, path, trace, &props, failure, started)
            }
        }
    }

    /// Merge successful results into `props`; report the first unrecoverable failure
    fn merge_hydration(&self, props: &mut Props, indices: &[usize]) -> Option<Failure> {
        let mut annotations = Vec::new();
        let mut failure = None;

        for &i in indices {
            let directive = self.refs[i].directive;
            let Some(outcome) = self.batch.get(i) else {
                continue;
            };
            match &outcome.result {
                Ok(value) => bind(props, directive.bind.as_deref(), Value::clone(value)),
                Err(err) => {
                    annotations.push(annotation(self.refs[i].index, err));
                    if let Some(data) = &directive.fallback_data {
                        bind(props, directive.bind.as_deref(), data.clone());
                    } else if failure.is_none() {
                        failure = Some(Failure {
                            kind: failure_kind(err),
                            message: err.to_string(),
                            resolved_version: None,
                        });
                    }
                }
            }
        }

        if !annotations.is_empty() {
            props.insert(HYDRATION_ERRORS_PROP.to_string(), Value::Array(annotations));
        }
        failure
    }

    fn fail(
        &mut self,
        node: &ComponentNode,
        path: NodePath,
        mut trace: StateTrace,
        props: &Props,
        failure: Failure,
        started: Instant,
    ) -> O {
        step(&mut trace, NodeState::Fallback);
        warn!(
            path = %path,
            component = %node.component_type,
            version = node.version,
            kind = %failure.kind,
            error = %failure.message,
            "rendering fallback"
        );

        let info = ErrorInfo::new(
            path.clone(),
            node.component_type.clone(),
            node.version,
            failure.kind,
            failure.message,
        )
        .with_node_id(node.id.clone());

        let node_fallback = node.fallback.as_ref().and_then(|fallback| {
            let renderer = self.registry.resolve_fallback(&fallback.renderer);
            if renderer.is_none() {
                warn!(path = %path, renderer = %fallback.renderer, "node fallback renderer not registered");
            }
            let mut fallback_props = props.clone();
            fallback_props.extend(fallback.props.clone());
            renderer.map(|r| (r, fallback_props))
        });
        let output = ErrorBoundary::fallback(
            node_fallback.as_ref().map(|(renderer, props)| (renderer, props)),
            &self.options.default_fallback,
            props,
            &info,
        );

        self.errors.push(info);
        self.record(node, path, failure.resolved_version, NodeOutcome::Fallback, trace, started);
        output
    }

    fn record(
        &mut self,
        node: &ComponentNode,
        path: NodePath,
        resolved_version: Option<u32>,
        outcome: NodeOutcome,
        trace: StateTrace,
        started: Instant,
    ) {
        self.nodes.push(NodeReport {
            path,
            node_id: node.id.clone(),
            component_type: node.component_type.clone(),
            requested_version: node.version,
            resolved_version,
            outcome,
            states: trace.into_states(),
            elapsed: started.elapsed(),
        });
    }
}

fn step(trace: &mut StateTrace, to: NodeState) {
    let result = trace.advance(to);
    debug_assert!(result.is_ok(), "{result:?}");
}

/// Put a hydrated value into props
///
/// With `bind` the value lands under that prop. Without it, objects are
/// merged key by key (hydrated keys win) and anything else lands under
/// [`DEFAULT_BIND_PROP`].
fn bind(props: &mut Props, bind: Option<&str>, value: Value) {
    match (bind, value) {
        (Some(prop), value) => {
            props.insert(prop.to_string(), value);
        }
        (None, Value::Object(map)) => props.extend(map),
        (None, value) => {
            props.insert(DEFAULT_BIND_PROP.to_string(), value);
        }
    }
}

fn annotation(directive: usize, err: &HydrationError) -> Value {
    json!({
        "directive": directive,
        "endpoint": err.endpoint,
        "kind": err.kind,
        "message": err.message,
        "attempts": err.attempts,
    })
}

fn failure_kind(err: &HydrationError) -> FailureKind {
    match err.kind {
        HydrationErrorKind::Timeout => FailureKind::HydrationTimeout,
        HydrationErrorKind::TransientFailure => FailureKind::HydrationTransient,
        HydrationErrorKind::PermanentFailure => FailureKind::HydrationPermanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn props(value: Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn bind_to_named_prop() {
        let mut p = props(json!({ "title": "declared" }));
        bind(&mut p, Some("rows"), json!([1, 2]));
        assert_eq!(Value::Object(p), json!({ "title": "declared", "rows": [1, 2] }));
    }

    #[test]
    fn unbound_object_merges_over_declared() {
        let mut p = props(json!({ "title": "declared", "size": "s" }));
        bind(&mut p, None, json!({ "title": "Hello" }));
        assert_eq!(Value::Object(p), json!({ "title": "Hello", "size": "s" }));
    }

    #[test]
    fn unbound_scalar_lands_under_data() {
        let mut p = Props::new();
        bind(&mut p, None, json!(42));
        assert_eq!(Value::Object(p), json!({ "data": 42 }));
    }

    #[test]
    fn annotation_shape() {
        let err = HydrationError::timeout("/slow", Duration::from_millis(5));
        let value = annotation(1, &err);
        assert_eq!(value["directive"], 1);
        assert_eq!(value["endpoint"], "/slow");
        assert_eq!(value["kind"], "Timeout");
    }

    #[test]
    fn hydration_kinds_map_to_failure_kinds() {
        assert_eq!(
            failure_kind(&HydrationError::timeout("/a", Duration::ZERO)),
            FailureKind::HydrationTimeout
        );
        assert_eq!(
            failure_kind(&HydrationError::transient("/a", "x", 4)),
            FailureKind::HydrationTransient
        );
        assert_eq!(
            failure_kind(&HydrationError::permanent("/a", "x", 1)),
            FailureKind::HydrationPermanent
        );
    }
}
