//! Error types for SDUI Core
//!
//! Only [`PageError`] ever escapes a render pass. Component, hydration and
//! render failures are recovered at the node boundary and reported through
//! [`RenderMetadata`](crate::RenderMetadata) instead.

use sdui_schema::ValidationErrors;
use std::path::PathBuf;

/// Result type for page rendering
pub type Result<T> = std::result::Result<T, PageError>;

/// Fatal, page-level failure
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// The raw definition is structurally invalid; nothing was rendered
    #[error("invalid page definition: {0}")]
    Validation(#[from] ValidationErrors),
}

impl PageError {
    /// Validation errors, if this is a validation failure
    #[inline]
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
        }
    }

    /// Check if retrying with the same input could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Engine configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse failure
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse failure
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse failure
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File extension is not one of toml, json, yaml, yml
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Values parse but are unusable
    #[error("invalid config value: {0}")]
    Invalid(String),
}
