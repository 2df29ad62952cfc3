//! The topic-routed pub/sub substrate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::sync::Arc;

use async_trait::async_trait;
use fractal_types::{Event, EventQuery};

use crate::pattern::TopicPattern;

/// Default diagnostic ring-buffer capacity.
pub const DEFAULT_RING_CAPACITY: usize = 1_000;

/// Error from a subscriber's handler. Captured on the event record and
/// surfaced through telemetry, never propagated to the publisher.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(
    /// What went wrong.
    pub String,
);

/// A subscriber's event handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one published event.
    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Handle returned by [`EventBus::subscribe`]; pass to
/// [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    pattern: TopicPattern,
    handler: Arc<dyn EventHandler>,
}

/// A retained event plus any per-handler failures observed while
/// delivering it.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// The delivered event.
    pub event: Event,
    /// `(pattern, error)` for each handler that failed.
    pub handler_errors: Vec<(String, String)>,
}

/// Topic-routed pub/sub with a bounded diagnostic ring buffer.
///
/// The subscriber map is read-mostly: publication takes a read lock,
/// subscribe/unsubscribe a short exclusive lock. There is no queue
/// between publisher and subscribers — a slow handler slows its
/// publisher, which is intentional backpressure.
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    ring: Mutex<VecDeque<EventRecord>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a bus with the default ring capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RING_CAPACITY)
    }

    /// Create a bus retaining the last `capacity` events for diagnostics.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            ring: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            next_id: AtomicU64::new(0),
        }
    }

    /// Subscribe a handler to a topic pattern.
    pub fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subs = self.subscriptions.write().expect("subscriber lock poisoned");
        subs.push(Subscription {
            id,
            pattern: TopicPattern::parse(pattern),
            handler,
        });
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write().expect("subscriber lock poisoned");
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Handlers run concurrently, but their dispatch start order is the
    /// subscription-registration order. A failing handler is recorded on
    /// the event record and logged; the other handlers still run and the
    /// publisher never sees the failure.
    pub async fn publish(&self, event: Event) {
        let topic = event.topic();
        let matching: Vec<(String, Arc<dyn EventHandler>)> = {
            let subs = self.subscriptions.read().expect("subscriber lock poisoned");
            subs.iter()
                .filter(|s| s.pattern.matches(&topic))
                .map(|s| (s.pattern.as_str().to_string(), s.handler.clone()))
                .collect()
        };

        let handler_futures = matching
            .iter()
            .map(|(_, handler)| handler.handle(&event));
        let results = futures::future::join_all(handler_futures).await;

        let mut handler_errors = Vec::new();
        for ((pattern, _), result) in matching.iter().zip(results) {
            if let Err(err) = result {
                tracing::error!(
                    topic = %topic,
                    pattern = %pattern,
                    error = %err,
                    "event handler failed"
                );
                handler_errors.push((pattern.clone(), err.to_string()));
            }
        }

        let mut ring = self.ring.lock().expect("ring lock poisoned");
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(EventRecord {
            event,
            handler_errors,
        });
    }

    /// Query the diagnostic ring buffer, most recent events first.
    #[must_use]
    pub fn query(&self, query: &EventQuery) -> Vec<Event> {
        let ring = self.ring.lock().expect("ring lock poisoned");
        ring.iter()
            .rev()
            .filter(|record| query.matches(&record.event))
            .take(if query.limit == 0 { usize::MAX } else { query.limit })
            .map(|record| record.event.clone())
            .collect()
    }

    /// The retained records, oldest first (diagnostics).
    #[must_use]
    pub fn records(&self) -> Vec<EventRecord> {
        self.ring.lock().expect("ring lock poisoned").iter().cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
