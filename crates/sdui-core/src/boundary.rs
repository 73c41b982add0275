//! Per-node error boundary
//!
//! Render capabilities are host code; a panic inside one must not unwind
//! through the engine. The boundary turns panics into
//! [`RenderError::Panicked`] and picks the fallback renderer for failed
//! nodes.

use sdui_registry::{ErrorInfo, FallbackRenderer, RenderCapability, RenderError};
use sdui_schema::Props;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

/// Failure containment for a single node
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorBoundary;

impl ErrorBoundary {
    /// Run `capability`, converting a panic into an error
    ///
    /// # Errors
    /// The capability's own [`RenderError`], or [`RenderError::Panicked`].
    pub fn render<O>(
        capability: &dyn RenderCapability<O>,
        props: &Props,
        children: Vec<O>,
    ) -> Result<O, RenderError> {
        panic::catch_unwind(AssertUnwindSafe(|| capability.render(props, children)))
            .unwrap_or_else(|payload| Err(RenderError::Panicked(panic_message(payload.as_ref()))))
    }

    /// Produce the substitute output for a failed node
    ///
    /// Tries the node's own fallback renderer with its fallback props first.
    /// If there is none, or it panics, the default fallback gets the node's
    /// props.
    ///
    /// # Panics
    /// If the default fallback panics. See [`FallbackRenderer`].
    pub fn fallback<O>(
        node_fallback: Option<(&Arc<dyn FallbackRenderer<O>>, &Props)>,
        default: &Arc<dyn FallbackRenderer<O>>,
        node_props: &Props,
        error: &ErrorInfo,
    ) -> O {
        if let Some((renderer, props)) = node_fallback {
            match panic::catch_unwind(AssertUnwindSafe(|| renderer.render_fallback(props, error))) {
                Ok(output) => return output,
                Err(payload) => warn!(
                    path = %error.path,
                    panic = %panic_message(payload.as_ref()),
                    "node fallback panicked, using default fallback"
                ),
            }
        }
        match panic::catch_unwind(AssertUnwindSafe(|| default.render_fallback(node_props, error))) {
            Ok(output) => output,
            Err(payload) => {
                error!(
                    path = %error.path,
                    panic = %panic_message(payload.as_ref()),
                    "default fallback panicked"
                );
                panic::resume_unwind(payload)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
