//! File-based engine configuration
//!
//! Durations are written in milliseconds. Every field is optional in the
//! file; missing fields take the library defaults.
//!
//! ```toml
//! default_version = 1
//! max_depth = 32
//! hydration_timeout_ms = 2000
//! cache_ttl_ms = 30000
//! max_retries = 2
//! ```

use crate::error::ConfigError;
use sdui_hydrate::{HydratorConfig, RetryPolicy};
use sdui_schema::{SchemaValidator, DEFAULT_MAX_DEPTH, LATEST_COMPONENT_VERSION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Serializable engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Version assumed for nodes that omit one
    pub default_version: u32,
    /// Deepest allowed node nesting
    pub max_depth: usize,
    /// Default per-directive timeout
    pub hydration_timeout_ms: u64,
    /// Default cache TTL
    pub cache_ttl_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay
    pub retry_base_delay_ms: u64,
    /// Backoff cap
    pub retry_max_delay_ms: u64,
    /// Randomize backoff
    pub retry_jitter: bool,
    /// Cache entry bound
    pub max_cache_entries: u64,
    /// Background sweeper period
    pub sweep_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let hydrator = HydratorConfig::default();
        Self {
            default_version: LATEST_COMPONENT_VERSION,
            max_depth: DEFAULT_MAX_DEPTH,
            hydration_timeout_ms: millis(hydrator.default_timeout),
            cache_ttl_ms: millis(hydrator.default_ttl),
            max_retries: hydrator.retry.max_retries,
            retry_base_delay_ms: millis(hydrator.retry.base_delay),
            retry_max_delay_ms: millis(hydrator.retry.max_delay),
            retry_jitter: hydrator.retry.jitter,
            max_cache_entries: hydrator.max_cache_entries,
            sweep_interval_ms: millis(hydrator.sweep_interval),
        }
    }
}

impl EngineConfig {
    /// Parse TOML
    ///
    /// # Errors
    /// [`ConfigError::Toml`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(s)?.checked()
    }

    /// Parse JSON
    ///
    /// # Errors
    /// [`ConfigError::Json`] or [`ConfigError::Invalid`].
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(s)?.checked()
    }

    /// Parse YAML
    ///
    /// # Errors
    /// [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str::<Self>(s)?.checked()
    }

    /// Load from a `.toml`, `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Any [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "toml" => Self::from_toml_str(&text),
            "json" => Self::from_json_str(&text),
            "yaml" | "yml" => Self::from_yaml_str(&text),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn checked(self) -> Result<Self, ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.max_cache_entries == 0 {
            return Err(ConfigError::Invalid(
                "max_cache_entries must be at least 1".into(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_ms must be at least 1".into(),
            ));
        }
        Ok(self)
    }

    /// Retry policy described by this config
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            jitter: self.retry_jitter,
        }
    }

    /// Hydrator settings described by this config
    #[must_use]
    pub fn hydrator_config(&self) -> HydratorConfig {
        HydratorConfig {
            default_timeout: Duration::from_millis(self.hydration_timeout_ms),
            default_ttl: Duration::from_millis(self.cache_ttl_ms),
            retry: self.retry_policy(),
            max_cache_entries: self.max_cache_entries,
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
        }
    }

    /// Validator described by this config
    #[must_use]
    pub fn validator(&self) -> SchemaValidator {
        SchemaValidator::new()
            .with_default_version(self.default_version)
            .with_max_depth(self.max_depth)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
