//! Source-prefix authorization.

use std::collections::HashSet;

use async_trait::async_trait;
use fractal_types::{DispatchError, Event};

use crate::dispatcher::Interceptor;

/// Blocks events whose `source` does not start with an allowed path
/// prefix. `/agent/researcher` authorizes under the prefix `agent`.
pub struct AuthInterceptor {
    allowed_prefixes: HashSet<String>,
}

impl AuthInterceptor {
    /// Create an interceptor allowing the given first-segment prefixes.
    #[must_use]
    pub fn new(allowed_prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_prefixes: allowed_prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
        let prefix = event
            .source
            .trim_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();
        if prefix.is_empty() || !self.allowed_prefixes.contains(prefix) {
            tracing::warn!(source = %event.source, "unauthorized event source");
            return Ok(None);
        }
        Ok(Some(event))
    }

    async fn post(&self, _event: &Event) {}
}
