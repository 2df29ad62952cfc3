//! Distributed-tracing context propagation.

use async_trait::async_trait;
use fractal_types::{DispatchError, Event};

use crate::dispatcher::Interceptor;

/// Attaches a W3C-style traceparent (`00-<32 hex>-<16 hex>-01`) to events
/// that lack one, so every event in a logical operation can be
/// correlated.
pub struct TraceInterceptor;

impl TraceInterceptor {
    /// Create the interceptor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh traceparent.
    #[must_use]
    pub fn generate() -> String {
        let trace_id = uuid::Uuid::new_v4().simple().to_string();
        let span = uuid::Uuid::new_v4().simple().to_string();
        format!("00-{}-{}-01", trace_id, &span[..16])
    }
}

impl Default for TraceInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interceptor for TraceInterceptor {
    fn name(&self) -> &str {
        "trace"
    }

    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
        if event.traceparent.is_some() {
            return Ok(Some(event));
        }
        Ok(Some(event.with_traceparent(Self::generate())))
    }

    async fn post(&self, _event: &Event) {}
}
