//! Versioned component registry
//!
//! Provides [`ComponentRegistry`], the runtime map from `(type, version)` to
//! a typed [`RenderCapability`]. Page definitions are data, so lookup stays
//! dynamic; absence is an expected outcome expressed as
//! [`Resolution::NotFound`], never a panic or an error.

use crate::capability::{FallbackRenderer, RenderCapability};
use parking_lot::RwLock;
use sdui_schema::Props;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::debug;

/// One registered component version
pub struct RegistryEntry<O> {
    type_name: String,
    version: u32,
    capability: Arc<dyn RenderCapability<O>>,
    required_props: BTreeSet<String>,
}

impl<O> RegistryEntry<O> {
    /// Create entry
    #[must_use]
    pub fn new<I, S>(
        type_name: impl Into<String>,
        version: u32,
        capability: Arc<dyn RenderCapability<O>>,
        required_props: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            version,
            capability,
            required_props: required_props.into_iter().map(Into::into).collect(),
        }
    }

    /// Component type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Registered version
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Render capability
    #[inline]
    #[must_use]
    pub fn capability(&self) -> &Arc<dyn RenderCapability<O>> {
        &self.capability
    }

    /// Declared required props
    #[inline]
    #[must_use]
    pub fn required_props(&self) -> &BTreeSet<String> {
        &self.required_props
    }

    /// Required props absent (or null) in `props`, in sorted order
    #[must_use]
    pub fn missing_required_props(&self, props: &Props) -> Vec<String> {
        self.required_props
            .iter()
            .filter(|name| props.get(name.as_str()).map_or(true, serde_json::Value::is_null))
            .cloned()
            .collect()
    }

    /// Check that every required prop is present and non-null
    #[inline]
    #[must_use]
    pub fn has_required_props(&self, props: &Props) -> bool {
        self.missing_required_props(props).is_empty()
    }
}

impl<O> Clone for RegistryEntry<O> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            version: self.version,
            capability: Arc::clone(&self.capability),
            required_props: self.required_props.clone(),
        }
    }
}

impl<O> Debug for RegistryEntry<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("type_name", &self.type_name)
            .field("version", &self.version)
            .field("required_props", &self.required_props)
            .finish_non_exhaustive()
    }
}

/// Outcome of a registry lookup
pub enum Resolution<O> {
    /// A matching entry
    Found(RegistryEntry<O>),
    /// No compatible entry
    NotFound,
}

impl<O> Resolution<O> {
    /// Check if an entry was found
    #[inline]
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Borrow the entry, if any
    #[inline]
    #[must_use]
    pub fn entry(&self) -> Option<&RegistryEntry<O>> {
        match self {
            Self::Found(entry) => Some(entry),
            Self::NotFound => None,
        }
    }

    /// Convert into an option
    #[inline]
    #[must_use]
    pub fn into_option(self) -> Option<RegistryEntry<O>> {
        match self {
            Self::Found(entry) => Some(entry),
            Self::NotFound => None,
        }
    }
}

impl<O> Clone for Resolution<O> {
    fn clone(&self) -> Self {
        match self {
            Self::Found(entry) => Self::Found(entry.clone()),
            Self::NotFound => Self::NotFound,
        }
    }
}

impl<O> Debug for Resolution<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(entry) => f.debug_tuple("Found").field(entry).finish(),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

impl<O> From<Option<RegistryEntry<O>>> for Resolution<O> {
    fn from(entry: Option<RegistryEntry<O>>) -> Self {
        entry.map_or(Self::NotFound, Self::Found)
    }
}

/// Runtime registry of component render capabilities
///
/// Shared through `&self`: registration takes a write lock, lookups a read
/// lock, so an engine can keep rendering while components are hot-swapped.
/// Construct one per tenant or test; there is no global instance.
pub struct ComponentRegistry<O> {
    components: RwLock<HashMap<String, BTreeMap<u32, RegistryEntry<O>>>>,
    fallbacks: RwLock<HashMap<String, Arc<dyn FallbackRenderer<O>>>>,
}

impl<O> ComponentRegistry<O> {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: RwLock::new(HashMap::new()),
            fallbacks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a component version
    ///
    /// Overwrites any existing entry for the same `(type_name, version)`.
    /// Returns `true` if an entry was replaced.
    pub fn register<C, I, S>(
        &self,
        type_name: impl Into<String>,
        version: u32,
        capability: C,
        required_props: I,
    ) -> bool
    where
        C: RenderCapability<O> + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_entry(RegistryEntry::new(
            type_name,
            version,
            Arc::new(capability),
            required_props,
        ))
    }

    /// Register a prebuilt entry, overwriting on conflict
    pub fn register_entry(&self, entry: RegistryEntry<O>) -> bool {
        let mut components = self.components.write();
        let versions = components.entry(entry.type_name.clone()).or_default();
        let replaced = versions.insert(entry.version, entry.clone()).is_some();
        if replaced {
            debug!(
                component = %entry.type_name,
                version = entry.version,
                "component registration overwritten"
            );
        }
        replaced
    }

    /// Remove a component version
    pub fn unregister(&self, type_name: &str, version: u32) -> bool {
        let mut components = self.components.write();
        let Some(versions) = components.get_mut(type_name) else {
            return false;
        };
        let removed = versions.remove(&version).is_some();
        if versions.is_empty() {
            components.remove(type_name);
        }
        removed
    }

    /// Exact `(type_name, version)` lookup
    #[must_use]
    pub fn resolve(&self, type_name: &str, version: u32) -> Resolution<O> {
        self.components
            .read()
            .get(type_name)
            .and_then(|versions| versions.get(&version))
            .cloned()
            .into()
    }

    /// Exact lookup, falling back to the highest version `<= requested`
    #[must_use]
    pub fn resolve_latest_compatible(&self, type_name: &str, requested: u32) -> Resolution<O> {
        self.components
            .read()
            .get(type_name)
            .and_then(|versions| versions.range(..=requested).next_back())
            .map(|(_, entry)| entry.clone())
            .into()
    }

    /// Check that `entry`'s required props are all present in `props`
    #[inline]
    #[must_use]
    pub fn has_required_props(entry: &RegistryEntry<O>, props: &Props) -> bool {
        entry.has_required_props(props)
    }

    /// Registered versions of a type, ascending
    #[must_use]
    pub fn versions(&self, type_name: &str) -> Vec<u32> {
        self.components
            .read()
            .get(type_name)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Registered type names, sorted
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Register a named fallback renderer, overwriting on conflict
    pub fn register_fallback<F>(&self, name: impl Into<String>, renderer: F) -> bool
    where
        F: FallbackRenderer<O> + 'static,
    {
        self.fallbacks
            .write()
            .insert(name.into(), Arc::new(renderer))
            .is_some()
    }

    /// Look up a named fallback renderer
    #[must_use]
    pub fn resolve_fallback(&self, name: &str) -> Option<Arc<dyn FallbackRenderer<O>>> {
        self.fallbacks.read().get(name).cloned()
    }

    /// Number of registered `(type, version)` entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.read().values().map(BTreeMap::len).sum()
    }

    /// Check if no components are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }
}

impl<O> Default for ComponentRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Debug for ComponentRegistry<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.type_names())
            .field("entries", &self.len())
            .field("fallbacks", &self.fallbacks.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ErrorInfo, RenderError};
    use serde_json::json;

    fn tagged(tag: &'static str) -> impl RenderCapability<String> {
        move |_: &Props, _: Vec<String>| -> Result<String, RenderError> { Ok(tag.to_string()) }
    }

    fn render(resolution: &Resolution<String>) -> String {
        resolution
            .entry()
            .unwrap()
            .capability()
            .render(&Props::new(), Vec::new())
            .unwrap()
    }

    #[test]
    fn registry_new_empty() {
        let registry = ComponentRegistry::<String>::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(!registry.resolve("Card", 1).is_found());
    }

    #[test]
    fn registry_register_and_resolve() {
        let registry = ComponentRegistry::new();
        registry.register("Card", 1, tagged("card-v1"), ["title"]);

        let resolution = registry.resolve("Card", 1);
        assert!(resolution.is_found());
        assert_eq!(render(&resolution), "card-v1");

        let entry = resolution.entry().unwrap();
        assert_eq!(entry.type_name(), "Card");
        assert_eq!(entry.version(), 1);
        assert!(entry.required_props().contains("title"));
    }

    #[test]
    fn registry_overwrite_last_writer_wins() {
        let registry = ComponentRegistry::new();
        assert!(!registry.register("Card", 1, tagged("first"), Vec::<String>::new()));
        assert!(registry.register("Card", 1, tagged("second"), Vec::<String>::new()));

        assert_eq!(registry.len(), 1);
        assert_eq!(render(&registry.resolve("Card", 1)), "second");
    }

    #[test]
    fn registry_unknown_type_is_not_found() {
        let registry = ComponentRegistry::new();
        registry.register("Card", 1, tagged("card"), Vec::<String>::new());

        assert!(matches!(registry.resolve("Unknown", 1), Resolution::NotFound));
        assert!(matches!(registry.resolve("Card", 2), Resolution::NotFound));
        assert!(registry.resolve_latest_compatible("Unknown", 9).entry().is_none());
    }

    #[test]
    fn registry_latest_compatible_version() {
        let registry = ComponentRegistry::new();
        for version in [1, 3, 5] {
            registry.register("Chart", version, tagged("chart"), Vec::<String>::new());
        }

        let pick = |requested| {
            registry
                .resolve_latest_compatible("Chart", requested)
                .into_option()
                .map(|entry| entry.version())
        };

        assert_eq!(pick(4), Some(3));
        assert_eq!(pick(5), Some(5));
        assert_eq!(pick(9), Some(5));
        assert_eq!(pick(1), Some(1));
        assert_eq!(pick(0), None);
        assert_eq!(registry.versions("Chart"), vec![1, 3, 5]);
    }

    #[test]
    fn registry_required_props() {
        let registry = ComponentRegistry::new();
        registry.register("Card", 1, tagged("card"), ["title", "body"]);
        let entry = registry.resolve("Card", 1).into_option().unwrap();

        let full = json!({ "title": "t", "body": "b", "extra": 1 });
        let partial = json!({ "title": "t", "body": null });

        assert!(ComponentRegistry::has_required_props(
            &entry,
            full.as_object().unwrap()
        ));
        assert!(!entry.has_required_props(partial.as_object().unwrap()));
        assert_eq!(
            entry.missing_required_props(&Props::new()),
            vec!["body".to_string(), "title".to_string()]
        );
    }

    #[test]
    fn registry_unregister() {
        let registry = ComponentRegistry::new();
        registry.register("Card", 1, tagged("card"), Vec::<String>::new());
        registry.register("Card", 2, tagged("card2"), Vec::<String>::new());

        assert!(registry.unregister("Card", 1));
        assert!(!registry.unregister("Card", 1));
        assert_eq!(registry.versions("Card"), vec![2]);

        assert!(registry.unregister("Card", 2));
        assert!(registry.is_empty());
        assert!(registry.type_names().is_empty());
    }

    #[test]
    fn registry_fallbacks() {
        let registry = ComponentRegistry::<String>::new();
        assert!(registry.resolve_fallback("ErrorCard").is_none());

        registry.register_fallback("ErrorCard", |_: &Props, error: &ErrorInfo| {
            format!("error:{}", error.component_type)
        });

        let renderer = registry.resolve_fallback("ErrorCard").unwrap();
        let info = ErrorInfo::new(
            sdui_schema::NodePath::root(0),
            "Chart",
            1,
            crate::FailureKind::RenderFailed,
            "boom",
        );
        assert_eq!(renderer.render_fallback(&Props::new(), &info), "error:Chart");
    }

    #[test]
    fn registry_shared_across_threads() {
        let registry = Arc::new(ComponentRegistry::new());
        let handles: Vec<_> = (0..4u32)
            .map(|version| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register("Card", version, tagged("card"), Vec::<String>::new());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.versions("Card"), vec![0, 1, 2, 3]);
    }
}
