//! The dispatcher: an interceptor chain wrapped around every publication.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fractal_types::{DispatchError, Event};

use crate::bus::EventBus;

/// Default per-dispatch deadline when the event carries no `timeout`
/// extension.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A pre/post hook pair applied around every dispatch.
///
/// `pre` runs in registration order and may rewrite the event (the
/// rewritten event is the one delivered to all subsequent interceptors
/// and to subscribers), block it by returning `Ok(None)`, or fail the
/// dispatch with an error. `post` runs in reverse registration order for
/// exactly the interceptors whose `pre` succeeded.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Stable name for diagnostics.
    fn name(&self) -> &str;

    /// Inspect/rewrite the event before publication. `Ok(None)` blocks
    /// the dispatch.
    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError>;

    /// Observe the event after publication.
    async fn post(&self, event: &Event);
}

/// How a dispatch ended when no error was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event was published to the bus.
    Delivered,
    /// An interceptor blocked the dispatch; no event was published.
    Blocked {
        /// Name of the blocking interceptor.
        by: String,
    },
}

/// Wraps an [`EventBus`] with an ordered interceptor chain and a
/// per-dispatch deadline.
///
/// The chain is immutable after construction — build it once with
/// [`Dispatcher::builder`] and share the dispatcher behind an `Arc`.
pub struct Dispatcher {
    bus: Arc<EventBus>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    default_timeout: Duration,
}

impl Dispatcher {
    /// Start building a dispatcher over the given bus.
    #[must_use]
    pub fn builder(bus: Arc<EventBus>) -> DispatcherBuilder {
        DispatcherBuilder {
            bus,
            interceptors: Vec::new(),
            default_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    /// The underlying bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Dispatch an event: run the pre chain, publish under the deadline,
    /// run the post chain in reverse.
    ///
    /// The deadline comes from the event's `timeout` extension (seconds)
    /// or the configured default. When it fires, the pending fan-out is
    /// cancelled and the caller receives [`DispatchError::Timeout`]; post
    /// hooks do not run for a timed-out dispatch.
    ///
    /// # Errors
    ///
    /// Propagates interceptor failures (e.g. budget exhaustion) and the
    /// dispatch timeout.
    pub async fn dispatch(&self, event: Event) -> Result<DispatchOutcome, DispatchError> {
        let mut current = event;
        let mut succeeded: Vec<&Arc<dyn Interceptor>> = Vec::new();

        for interceptor in &self.interceptors {
            match interceptor.pre(current.clone()).await {
                Ok(Some(next)) => {
                    succeeded.push(interceptor);
                    current = next;
                }
                Ok(None) => {
                    tracing::debug!(
                        interceptor = interceptor.name(),
                        event_type = %current.event_type,
                        "dispatch blocked"
                    );
                    let blocked_by = interceptor.name().to_string();
                    self.run_posts(&succeeded, &current).await;
                    return Ok(DispatchOutcome::Blocked { by: blocked_by });
                }
                Err(err) => {
                    self.run_posts(&succeeded, &current).await;
                    return Err(err);
                }
            }
        }

        let timeout = current
            .extensions
            .get("timeout")
            .and_then(serde_json::Value::as_f64)
            .map_or(self.default_timeout, Duration::from_secs_f64);

        match tokio::time::timeout(timeout, self.bus.publish(current.clone())).await {
            Ok(()) => {}
            Err(_) => {
                tracing::warn!(
                    event_type = %current.event_type,
                    ?timeout,
                    "dispatch timed out, fan-out cancelled"
                );
                return Err(DispatchError::Timeout(timeout));
            }
        }

        self.run_posts(&succeeded, &current).await;
        Ok(DispatchOutcome::Delivered)
    }

    async fn run_posts(&self, succeeded: &[&Arc<dyn Interceptor>], event: &Event) {
        for interceptor in succeeded.iter().rev() {
            interceptor.post(event).await;
        }
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    bus: Arc<EventBus>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    default_timeout: Duration,
}

impl DispatcherBuilder {
    /// Append an interceptor to the chain.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Set the default per-dispatch deadline.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Finish the chain.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            bus: self.bus,
            interceptors: self.interceptors,
            default_timeout: self.default_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records pre/post invocations into a shared log.
    struct Probe {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        block: bool,
    }

    impl Probe {
        fn new(name: &str, log: Arc<Mutex<Vec<String>>>, block: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                log,
                block,
            })
        }
    }

    #[async_trait]
    impl Interceptor for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
            self.log.lock().unwrap().push(format!("{}.pre", self.name));
            if self.block {
                Ok(None)
            } else {
                Ok(Some(event))
            }
        }

        async fn post(&self, _event: &Event) {
            self.log.lock().unwrap().push(format!("{}.post", self.name));
        }
    }

    #[tokio::test]
    async fn blocked_chain_runs_posts_for_succeeded_prefix() {
        // Register A, B, C; B blocks. Expected: A.pre, B.pre, A.post —
        // nothing else, and no event is published.
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::builder(bus.clone())
            .interceptor(Probe::new("A", log.clone(), false))
            .interceptor(Probe::new("B", log.clone(), true))
            .interceptor(Probe::new("C", log.clone(), false))
            .build();

        let outcome = dispatcher
            .dispatch(Event::new("/agent/a", "node.request", json!({})))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Blocked { by: "B".into() });
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A.pre", "B.pre", "A.post"]
        );
        assert!(bus.records().is_empty());
    }

    #[tokio::test]
    async fn posts_run_in_reverse_order() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::builder(bus)
            .interceptor(Probe::new("A", log.clone(), false))
            .interceptor(Probe::new("B", log.clone(), false))
            .build();

        dispatcher
            .dispatch(Event::new("/agent/a", "node.request", json!({})))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A.pre", "B.pre", "B.post", "A.post"]
        );
    }

    /// An interceptor that rewrites the event's timeout extension.
    struct Rewriter;

    #[async_trait]
    impl Interceptor for Rewriter {
        fn name(&self) -> &str {
            "rewriter"
        }

        async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
            Ok(Some(event.with_extension("timeout", json!(0.01))))
        }

        async fn post(&self, _event: &Event) {}
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        use crate::bus::{EventHandler, HandlerError};

        struct Sleeper;

        #[async_trait]
        impl EventHandler for Sleeper {
            async fn handle(&self, _event: &Event) -> Result<(), HandlerError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }

        let bus = Arc::new(EventBus::new());
        bus.subscribe("**", Arc::new(Sleeper));
        let dispatcher = Dispatcher::builder(bus)
            .interceptor(Arc::new(Rewriter))
            .build();

        let err = dispatcher
            .dispatch(Event::new("/agent/a", "node.request", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(_)));
    }
}
