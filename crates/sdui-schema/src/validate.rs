//! Schema validation for raw page definitions
//!
//! [`SchemaValidator`] turns loosely-typed JSON into a [`PageDefinition`],
//! or reports every structural problem it found in one pass. Validation
//! never stops at the first error: callers get the full list so that an
//! author can fix a definition without a fix-one/rerun loop.

use crate::node::{
    ComponentNode, HydrationDirective, NodeFallback, PageDefinition, Props,
    LATEST_COMPONENT_VERSION,
};
use crate::path::FieldPath;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use tracing::debug;

/// Default maximum nesting depth of a page tree
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Validates raw definitions into typed pages
///
/// Pure: no I/O, no shared state.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator {
    default_version: u32,
    max_depth: usize,
}

impl SchemaValidator {
    /// Create validator with default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_version: LATEST_COMPONENT_VERSION,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Version applied to nodes that omit `version`
    #[inline]
    #[must_use]
    pub fn with_default_version(mut self, version: u32) -> Self {
        self.default_version = version;
        self
    }

    /// Maximum nesting depth before a subtree is rejected
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Validate a raw definition
    ///
    /// # Errors
    /// Returns every validation error found, in document order.
    pub fn validate(&self, raw: &Value) -> Result<PageDefinition, ValidationErrors> {
        let mut errors = Vec::new();
        let page = self.page(raw, &mut errors);

        match page {
            Some(page) if errors.is_empty() => Ok(page),
            _ => {
                debug!(count = errors.len(), "page definition rejected");
                Err(ValidationErrors(errors))
            }
        }
    }

    fn page(&self, raw: &Value, errors: &mut Vec<ValidationError>) -> Option<PageDefinition> {
        let root = FieldPath::root();
        let Some(object) = raw.as_object() else {
            errors.push(ValidationError::wrong_type(root, "object", raw));
            return None;
        };

        let title = optional_string(object, "title", &root, errors);
        let version = optional_version(object, "version", &root, errors);

        let components_path = root.key("components");
        let components = match object.get("components") {
            None => {
                errors.push(ValidationError::new(
                    components_path,
                    ValidationErrorKind::MissingField,
                ));
                Vec::new()
            }
            Some(Value::Array(items)) => self.nodes(items, &components_path, 1, errors),
            Some(other) => {
                errors.push(ValidationError::wrong_type(components_path, "array", other));
                Vec::new()
            }
        };

        Some(PageDefinition {
            title,
            version,
            components,
        })
    }

    fn nodes(
        &self,
        items: &[Value],
        path: &FieldPath,
        depth: usize,
        errors: &mut Vec<ValidationError>,
    ) -> Vec<ComponentNode> {
        if depth > self.max_depth {
            errors.push(ValidationError::new(
                path.clone(),
                ValidationErrorKind::TooDeep {
                    max_depth: self.max_depth,
                },
            ));
            return Vec::new();
        }

        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.node(item, &path.index(i), depth, errors))
            .collect()
    }

    fn node(
        &self,
        raw: &Value,
        path: &FieldPath,
        depth: usize,
        errors: &mut Vec<ValidationError>,
    ) -> Option<ComponentNode> {
        let Some(object) = raw.as_object() else {
            errors.push(ValidationError::wrong_type(path.clone(), "object", raw));
            return None;
        };
        let before = errors.len();

        let id = optional_string(object, "id", path, errors);

        let type_path = path.key("type");
        let component_type = match object.get("type") {
            None => {
                errors.push(ValidationError::new(type_path, ValidationErrorKind::MissingField));
                None
            }
            Some(Value::String(name)) if name.trim().is_empty() => {
                errors.push(ValidationError::new(type_path, ValidationErrorKind::Empty));
                None
            }
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => {
                errors.push(ValidationError::wrong_type(type_path, "string", other));
                None
            }
        };

        let version =
            optional_version(object, "version", path, errors).unwrap_or(self.default_version);
        let props = optional_object(object, "props", path, errors).unwrap_or_default();

        let children_path = path.key("children");
        let children = match object.get("children") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => self.nodes(items, &children_path, depth + 1, errors),
            Some(other) => {
                errors.push(ValidationError::wrong_type(children_path, "array", other));
                Vec::new()
            }
        };

        let hydrate_path = path.key("hydrate");
        let hydrate = match object.get("hydrate") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| directive(item, &hydrate_path.index(i), errors))
                .collect(),
            Some(other) => {
                errors.push(ValidationError::wrong_type(hydrate_path, "array", other));
                Vec::new()
            }
        };

        let fallback = match object.get("fallback") {
            None | Some(Value::Null) => None,
            Some(value) => fallback(value, &path.key("fallback"), errors),
        };

        if errors.len() > before {
            return None;
        }

        Some(ComponentNode {
            id,
            component_type: component_type?,
            version,
            props,
            children,
            hydrate,
            fallback,
        })
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn directive(
    raw: &Value,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) -> Option<HydrationDirective> {
    let Some(object) = raw.as_object() else {
        errors.push(ValidationError::wrong_type(path.clone(), "object", raw));
        return None;
    };
    let before = errors.len();

    let endpoint_path = path.key("endpoint");
    let endpoint = match object.get("endpoint") {
        None => {
            errors.push(ValidationError::new(endpoint_path, ValidationErrorKind::MissingField));
            None
        }
        Some(Value::String(endpoint)) if endpoint.trim().is_empty() => {
            errors.push(ValidationError::new(endpoint_path, ValidationErrorKind::Empty));
            None
        }
        Some(Value::String(endpoint)) => Some(endpoint.clone()),
        Some(other) => {
            errors.push(ValidationError::wrong_type(endpoint_path, "string", other));
            None
        }
    };

    let params = optional_object(object, "params", path, errors).unwrap_or_default();
    let ttl_ms = optional_millis(object, "ttl_ms", path, errors);
    let timeout_ms = optional_millis(object, "timeout_ms", path, errors);
    let fetcher = optional_string(object, "fetcher", path, errors);
    let bind = optional_string(object, "bind", path, errors);
    let fallback_data = object.get("fallback_data").cloned();

    if errors.len() > before {
        return None;
    }

    Some(HydrationDirective {
        endpoint: endpoint?,
        params,
        ttl_ms,
        timeout_ms,
        fetcher,
        bind,
        fallback_data,
    })
}

fn fallback(raw: &Value, path: &FieldPath, errors: &mut Vec<ValidationError>) -> Option<NodeFallback> {
    let Some(object) = raw.as_object() else {
        errors.push(ValidationError::wrong_type(path.clone(), "object", raw));
        return None;
    };
    let before = errors.len();

    let renderer_path = path.key("renderer");
    let renderer = match object.get("renderer") {
        None => {
            errors.push(ValidationError::new(renderer_path, ValidationErrorKind::MissingField));
            None
        }
        Some(Value::String(name)) if name.trim().is_empty() => {
            errors.push(ValidationError::new(renderer_path, ValidationErrorKind::Empty));
            None
        }
        Some(Value::String(name)) => Some(name.clone()),
        Some(other) => {
            errors.push(ValidationError::wrong_type(renderer_path, "string", other));
            None
        }
    };
    let props = optional_object(object, "props", path, errors).unwrap_or_default();

    if errors.len() > before {
        return None;
    }
    Some(NodeFallback {
        renderer: renderer?,
        props,
    })
}

fn optional_string(
    object: &Map<String, Value>,
    key: &str,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            errors.push(ValidationError::wrong_type(path.key(key), "string", other));
            None
        }
    }
}

fn optional_object(
    object: &Map<String, Value>,
    key: &str,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) -> Option<Props> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(other) => {
            errors.push(ValidationError::wrong_type(path.key(key), "object", other));
            None
        }
    }
}

fn optional_version(
    object: &Map<String, Value>,
    key: &str,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) -> Option<u32> {
    let value = object.get(key)?;
    match value {
        Value::Null => None,
        Value::Number(n) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(version) => Some(version),
            None => {
                errors.push(ValidationError::new(
                    path.key(key),
                    ValidationErrorKind::NotNonNegativeInteger,
                ));
                None
            }
        },
        other => {
            errors.push(ValidationError::wrong_type(path.key(key), "integer", other));
            None
        }
    }
}

fn optional_millis(
    object: &Map<String, Value>,
    key: &str,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) -> Option<u64> {
    let value = object.get(key)?;
    match value {
        Value::Null => None,
        Value::Number(n) => match n.as_u64() {
            Some(ms) => Some(ms),
            None => {
                errors.push(ValidationError::new(
                    path.key(key),
                    ValidationErrorKind::NotNonNegativeInteger,
                ));
                None
            }
        },
        other => {
            errors.push(ValidationError::wrong_type(path.key(key), "integer", other));
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single structural problem in a page definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct ValidationError {
    /// Location of the offending field
    pub path: FieldPath,
    /// What is wrong with it
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Create error at path
    #[inline]
    #[must_use]
    pub fn new(path: FieldPath, kind: ValidationErrorKind) -> Self {
        Self { path, kind }
    }

    fn wrong_type(path: FieldPath, expected: &'static str, found: &Value) -> Self {
        Self::new(
            path,
            ValidationErrorKind::WrongType {
                expected,
                found: json_kind(found),
            },
        )
    }

    /// Human-readable reason
    #[inline]
    #[must_use]
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }
}

/// Classification of validation failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Required field absent
    #[error("missing required field")]
    MissingField,

    /// Field present with the wrong JSON type
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    /// String field present but blank
    #[error("must not be empty")]
    Empty,

    /// Numeric field negative, fractional or out of range
    #[error("must be a non-negative integer")]
    NotNonNegativeInteger,

    /// Children nested deeper than allowed
    #[error("nesting exceeds maximum depth of {max_depth}")]
    TooDeep { max_depth: usize },
}

/// Every validation error found in a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Number of errors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over errors
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Rendered paths of all errors
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.0.iter().map(|e| e.path.to_string()).collect()
    }

    /// Take ownership of the error list
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "page definition has {} validation error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn validate(raw: &Value) -> Result<PageDefinition, ValidationErrors> {
        SchemaValidator::new().validate(raw)
    }

    #[test]
    fn accepts_minimal_page() {
        let page = validate(&json!({ "components": [{ "type": "Card" }] })).unwrap();

        assert_eq!(page.components.len(), 1);
        let card = &page.components[0];
        assert_eq!(card.component_type, "Card");
        assert_eq!(card.version, LATEST_COMPONENT_VERSION);
        assert!(card.props.is_empty());
        assert!(card.children.is_empty());
        assert!(card.hydrate.is_empty());
    }

    #[test]
    fn applies_configured_default_version() {
        let validator = SchemaValidator::new().with_default_version(4);
        let page = validator
            .validate(&json!({ "components": [{ "type": "Card" }, { "type": "Card", "version": 2 }] }))
            .unwrap();
        assert_eq!(page.components[0].version, 4);
        assert_eq!(page.components[1].version, 2);
    }

    #[test]
    fn parses_full_node() {
        let raw = json!({
            "title": "Dashboard",
            "version": 2,
            "components": [{
                "id": "hero",
                "type": "Hero",
                "version": 3,
                "props": { "size": "lg" },
                "children": [{ "type": "Text", "props": { "text": "hi" } }],
                "hydrate": [{
                    "endpoint": "/kpis",
                    "params": { "range": "7d" },
                    "ttl_ms": 500,
                    "timeout_ms": 2000,
                    "fetcher": "graphql",
                    "bind": "kpis",
                    "fallback_data": []
                }],
                "fallback": { "renderer": "ErrorCard", "props": { "tone": "muted" } }
            }]
        });

        let page = validate(&raw).unwrap();
        assert_eq!(page.title.as_deref(), Some("Dashboard"));
        assert_eq!(page.version, Some(2));

        let hero = &page.components[0];
        assert_eq!(hero.id.as_deref(), Some("hero"));
        assert_eq!(hero.version, 3);
        assert_eq!(hero.children[0].component_type, "Text");

        let directive = &hero.hydrate[0];
        assert_eq!(directive.endpoint, "/kpis");
        assert_eq!(directive.params["range"], "7d");
        assert_eq!(directive.ttl_ms, Some(500));
        assert_eq!(directive.timeout_ms, Some(2000));
        assert_eq!(directive.fetcher.as_deref(), Some("graphql"));
        assert_eq!(directive.bind.as_deref(), Some("kpis"));
        assert_eq!(directive.fallback_data, Some(json!([])));

        let fallback = hero.fallback.as_ref().unwrap();
        assert_eq!(fallback.renderer, "ErrorCard");
        assert_eq!(fallback.props["tone"], "muted");
    }

    #[test]
    fn reports_each_missing_type_separately() {
        let raw = json!({
            "components": [
                { "props": {} },
                { "type": "Ok" },
                { "version": 1 }
            ]
        });

        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.paths(),
            vec!["components[0].type", "components[2].type"]
        );
        assert!(errors.iter().all(|e| e.kind == ValidationErrorKind::MissingField));
    }

    #[test]
    fn collects_errors_across_nesting_levels() {
        let raw = json!({
            "components": [{
                "type": "Section",
                "props": [],
                "children": [
                    { "type": "" },
                    { "type": "Card", "version": -1 },
                    { "type": "Card", "hydrate": [{ "endpoint": "" }, { "params": {} }] }
                ]
            }]
        });

        let errors = validate(&raw).unwrap_err();
        assert_eq!(
            errors.paths(),
            vec![
                "components[0].props",
                "components[0].children[0].type",
                "components[0].children[1].version",
                "components[0].children[2].hydrate[0].endpoint",
                "components[0].children[2].hydrate[1].endpoint",
            ]
        );
    }

    #[test]
    fn rejects_non_object_root() {
        let errors = validate(&json!([1, 2])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.paths(), vec!["$"]);
    }

    #[test]
    fn rejects_missing_components() {
        let errors = validate(&json!({ "title": "x" })).unwrap_err();
        assert_eq!(errors.paths(), vec!["components"]);
        assert_eq!(
            errors.iter().next().unwrap().kind,
            ValidationErrorKind::MissingField
        );
    }

    #[test]
    fn wrong_type_reports_found_kind() {
        let errors = validate(&json!({ "components": [{ "type": 7 }] })).unwrap_err();
        let error = errors.iter().next().unwrap();
        assert_eq!(
            error.kind,
            ValidationErrorKind::WrongType {
                expected: "string",
                found: "number"
            }
        );
        assert_eq!(error.to_string(), "components[0].type: expected string, found number");
    }

    #[test]
    fn rejects_fractional_version() {
        let errors = validate(&json!({ "components": [{ "type": "A", "version": 1.5 }] })).unwrap_err();
        assert_eq!(
            errors.iter().next().unwrap().kind,
            ValidationErrorKind::NotNonNegativeInteger
        );
    }

    #[test]
    fn rejects_malformed_fallback() {
        let errors =
            validate(&json!({ "components": [{ "type": "A", "fallback": { "props": {} } }] }))
                .unwrap_err();
        assert_eq!(errors.paths(), vec!["components[0].fallback.renderer"]);
    }

    #[test]
    fn enforces_max_depth() {
        let raw = json!({
            "components": [{
                "type": "L1",
                "children": [{ "type": "L2", "children": [{ "type": "L3" }] }]
            }]
        });

        let validator = SchemaValidator::new().with_max_depth(2);
        let errors = validator.validate(&raw).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.paths(), vec!["components[0].children[0].children"]);
        assert_eq!(
            errors.iter().next().unwrap().kind,
            ValidationErrorKind::TooDeep { max_depth: 2 }
        );

        assert!(SchemaValidator::new().validate(&raw).is_ok());
    }

    #[test]
    fn preserves_child_order() {
        let raw = json!({
            "components": [{
                "type": "List",
                "children": [{ "type": "C" }, { "type": "A" }, { "type": "B" }]
            }]
        });
        let page = validate(&raw).unwrap();
        let order: Vec<&str> = page.components[0]
            .children
            .iter()
            .map(|c| c.component_type.as_str())
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn errors_display_lists_all() {
        let errors = validate(&json!({ "components": [{}, {}] })).unwrap_err();
        let text = errors.to_string();
        assert!(text.starts_with("page definition has 2 validation error(s)"));
        assert!(text.contains("components[1].type: missing required field"));
    }

    #[test]
    fn errors_serialize_with_paths() {
        let errors = validate(&json!({ "components": [{}] })).unwrap_err();
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json[0]["path"], "components[0].type");
        assert_eq!(json[0]["kind"]["kind"], "missing_field");
    }
}
