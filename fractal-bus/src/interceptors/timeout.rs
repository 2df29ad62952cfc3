//! Deadline attachment. Enforcement lives in the dispatcher itself.

use std::time::Duration;

use async_trait::async_trait;
use fractal_types::{DispatchError, Event};

use crate::dispatcher::Interceptor;

/// Attaches an effective deadline to every event: the minimum of the
/// caller-specified `timeout` extension and the configured ceiling.
pub struct TimeoutInterceptor {
    ceiling: Duration,
}

impl TimeoutInterceptor {
    /// Create an interceptor with the given ceiling.
    #[must_use]
    pub fn new(ceiling: Duration) -> Self {
        Self { ceiling }
    }
}

#[async_trait]
impl Interceptor for TimeoutInterceptor {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
        let requested = event
            .extensions
            .get("timeout")
            .and_then(serde_json::Value::as_f64)
            .map(Duration::from_secs_f64);
        let effective = match requested {
            Some(requested) => requested.min(self.ceiling),
            None => self.ceiling,
        };
        Ok(Some(event.with_extension(
            "timeout",
            serde_json::json!(effective.as_secs_f64()),
        )))
    }

    async fn post(&self, _event: &Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn caps_caller_timeout_at_ceiling() {
        let interceptor = TimeoutInterceptor::new(Duration::from_secs(10));
        let event = Event::new("/a", "node.request", json!({}))
            .with_extension("timeout", json!(60.0));
        let out = interceptor.pre(event).await.unwrap().unwrap();
        assert_eq!(out.extensions["timeout"], json!(10.0));
    }

    #[tokio::test]
    async fn keeps_shorter_caller_timeout() {
        let interceptor = TimeoutInterceptor::new(Duration::from_secs(10));
        let event = Event::new("/a", "node.request", json!({}))
            .with_extension("timeout", json!(2.0));
        let out = interceptor.pre(event).await.unwrap().unwrap();
        assert_eq!(out.extensions["timeout"], json!(2.0));
    }

    #[tokio::test]
    async fn attaches_default_when_absent() {
        let interceptor = TimeoutInterceptor::new(Duration::from_secs(10));
        let event = Event::new("/a", "node.request", json!({}));
        let out = interceptor.pre(event).await.unwrap().unwrap();
        assert_eq!(out.extensions["timeout"], json!(10.0));
    }
}
