//! Recursion-depth limiting for delegation requests.

use async_trait::async_trait;
use fractal_types::{DispatchError, Event};

use crate::dispatcher::Interceptor;

/// Extension key carrying the current delegation depth.
pub const DEPTH_KEY: &str = "depth";

/// Blocks `node.request` events whose delegation depth has reached the
/// limit, protecting against runaway recursion independent of the
/// orchestrator's own check.
pub struct DepthInterceptor {
    max_depth: u64,
}

impl DepthInterceptor {
    /// Create an interceptor with the given depth limit.
    #[must_use]
    pub fn new(max_depth: u64) -> Self {
        Self { max_depth }
    }
}

#[async_trait]
impl Interceptor for DepthInterceptor {
    fn name(&self) -> &str {
        "depth"
    }

    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
        if event.event_type != "node.request" {
            return Ok(Some(event));
        }
        let depth = event
            .extensions
            .get(DEPTH_KEY)
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        if depth >= self.max_depth {
            tracing::warn!(depth, max = self.max_depth, "delegation depth limit hit");
            return Ok(None);
        }
        Ok(Some(event))
    }

    async fn post(&self, _event: &Event) {}
}
