//! Deterministic cache keys for hydration requests
//!
//! Provides [`CacheKey`], a 32-byte Blake3 digest of
//! `(fetcher, endpoint, normalized params)`. Two directives that would issue
//! the same request always produce the same key, regardless of the order
//! their parameter objects were written in.

use sdui_schema::{HydrationDirective, Props};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Identity of a hydration request
///
/// Used both as the cache key and as the in-flight deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Key for a directive
    #[inline]
    #[must_use]
    pub fn for_directive(directive: &HydrationDirective) -> Self {
        Self::compute(
            directive.fetcher.as_deref(),
            &directive.endpoint,
            &directive.params,
        )
    }

    /// Key for an explicit request
    #[must_use]
    pub fn compute(fetcher: Option<&str>, endpoint: &str, params: &Props) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(fetcher.unwrap_or_default().as_bytes());
        hasher.update(&[0]);
        hasher.update(endpoint.as_bytes());
        hasher.update(&[0]);
        hasher.update(normalize_params(params).as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Key namespaced by `scope`
    #[must_use]
    pub fn scoped(&self, scope: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.0);
        hasher.update(scope.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Canonical JSON text of request params
///
/// Object keys are sorted at every level; arrays keep their order.
#[must_use]
pub fn normalize_params(params: &Props) -> String {
    let mut out = String::new();
    write_object(&mut out, params);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => write_object(out, map),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_object(out: &mut String, map: &Props) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(out, value);
    }
    out.push('}');
}
