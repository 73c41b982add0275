//! Testing utilities for SDUI workspace
//!
//! Shared transports, registries and fallbacks used by the integration
//! tests and the `sdui` developer harness.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sdui_hydrate::{FetchRequest, Transport, TransportError};
use sdui_registry::{ComponentRegistry, ErrorInfo, FallbackRenderer, RenderCapability, RenderError};
use sdui_schema::Props;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted endpoint answers
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok(Value),
    Transient(String),
    Permanent(String),
    /// Never completes
    Hang,
}

#[derive(Debug, Clone)]
struct Route {
    delay: Duration,
    script: VecDeque<Reply>,
    default: Reply,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            script: VecDeque::new(),
            default: Reply::Permanent("no route".into()),
        }
    }
}

/// Transport with per-endpoint scripted replies, delays and call counts
///
/// Each endpoint answers from its script first, then repeats its default
/// reply. Delays use `tokio::time::sleep`, so paused-clock tests control
/// them.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, u64>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(self, endpoint: &str, f: impl FnOnce(&mut Route)) -> Self {
        f(self.routes.lock().entry(endpoint.to_string()).or_default());
        self
    }

    /// Endpoint always succeeds with `value`
    pub fn with_ok(self, endpoint: &str, value: Value) -> Self {
        self.route(endpoint, |r| r.default = Reply::Ok(value))
    }

    /// Endpoint's default reply
    pub fn with_reply(self, endpoint: &str, reply: Reply) -> Self {
        self.route(endpoint, |r| r.default = reply)
    }

    /// Replies served before the default, in order
    pub fn with_script(self, endpoint: &str, replies: Vec<Reply>) -> Self {
        self.route(endpoint, |r| r.script = replies.into())
    }

    /// Delay before every reply from the endpoint
    pub fn with_delay(self, endpoint: &str, delay: Duration) -> Self {
        self.route(endpoint, |r| r.delay = delay)
    }

    /// Calls made to `endpoint`
    pub fn calls(&self, endpoint: &str) -> u64 {
        self.calls.lock().get(endpoint).copied().unwrap_or(0)
    }

    /// Calls made to every endpoint
    pub fn total_calls(&self) -> u64 {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<Value, TransportError> {
        *self.calls.lock().entry(request.endpoint.clone()).or_insert(0) += 1;

        let (delay, reply) = {
            let mut routes = self.routes.lock();
            let route = routes.entry(request.endpoint.clone()).or_default();
            let reply = route.script.pop_front().unwrap_or_else(|| route.default.clone());
            (route.delay, reply)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Transient(message) => Err(TransportError::transient(message)),
            Reply::Permanent(message) => Err(TransportError::permanent(message)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Render capability that echoes its inputs as JSON
///
/// Output: `{"type", "version", "props", "children"}`.
pub fn echo_component(type_name: &str, version: u32) -> impl RenderCapability<Value> {
    let type_name = type_name.to_string();
    move |props: &Props, children: Vec<Value>| -> Result<Value, RenderError> {
        Ok(json!({
            "type": type_name,
            "version": version,
            "props": props,
            "children": children,
        }))
    }
}

/// Render capability that always returns an error
pub fn failing_component(message: &str) -> impl RenderCapability<Value> {
    let message = message.to_string();
    move |_: &Props, _: Vec<Value>| -> Result<Value, RenderError> {
        Err(RenderError::failed(message.clone()))
    }
}

/// Render capability that always panics
pub fn panicking_component(message: &str) -> impl RenderCapability<Value> {
    let message = message.to_string();
    move |_: &Props, _: Vec<Value>| -> Result<Value, RenderError> { panic!("{message}") }
}

/// Fallback producing `{"fallback": kind, "path", "type"}`
pub fn json_fallback() -> Arc<dyn FallbackRenderer<Value>> {
    Arc::new(|_: &Props, error: &ErrorInfo| {
        json!({
            "fallback": error.kind.as_str(),
            "path": error.path.to_string(),
            "type": error.component_type,
        })
    })
}

/// Registry with an echo component for each `(type, version)`
pub fn json_registry(components: &[(&str, u32)]) -> ComponentRegistry<Value> {
    let registry = ComponentRegistry::new();
    for (type_name, version) in components {
        register_echo(&registry, type_name, *version, &[]);
    }
    registry
}

/// Register an echo component declaring `required` props
pub fn register_echo(
    registry: &ComponentRegistry<Value>,
    type_name: &str,
    version: u32,
    required: &[&str],
) {
    registry.register(
        type_name,
        version,
        echo_component(type_name, version),
        required.iter().copied(),
    );
}

/// Echo output for comparisons in tests
pub fn echoed(type_name: &str, version: u32, props: Value, children: Vec<Value>) -> Value {
    json!({
        "type": type_name,
        "version": version,
        "props": props,
        "children": children,
    })
}
