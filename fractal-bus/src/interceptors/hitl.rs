//! Human-in-the-loop approval gating.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fractal_types::{DispatchError, Event};
use tokio::sync::oneshot;

use crate::dispatcher::Interceptor;
use crate::pattern::TopicPattern;

/// Suspends dispatch of events matching a configured pattern set until an
/// external approval is recorded.
///
/// The suspension is cooperative: the dispatching task awaits a oneshot
/// channel keyed by event id, and [`HitlInterceptor::approve`] /
/// [`HitlInterceptor::deny`] from any other task unblocks it. A denied
/// (or dropped) approval blocks the dispatch.
pub struct HitlInterceptor {
    patterns: Vec<TopicPattern>,
    pending: Mutex<HashMap<String, oneshot::Sender<bool>>>,
}

impl HitlInterceptor {
    /// Create an interceptor gating topics matching any of the patterns
    /// (e.g. `tool.execute/shell/**`).
    #[must_use]
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| TopicPattern::parse(p.as_ref()))
                .collect(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Event ids currently awaiting a decision.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        self.pending
            .lock()
            .expect("hitl lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Approve a pending event. Returns whether it was pending.
    pub fn approve(&self, event_id: &str) -> bool {
        self.decide(event_id, true)
    }

    /// Deny a pending event. Returns whether it was pending.
    pub fn deny(&self, event_id: &str) -> bool {
        self.decide(event_id, false)
    }

    fn decide(&self, event_id: &str, approved: bool) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("hitl lock poisoned")
            .remove(event_id);
        match sender {
            Some(sender) => sender.send(approved).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Interceptor for HitlInterceptor {
    fn name(&self) -> &str {
        "hitl"
    }

    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
        let topic = event.topic();
        if !self.patterns.iter().any(|p| p.matches(&topic)) {
            return Ok(Some(event));
        }
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("hitl lock poisoned");
            pending.insert(event.id.clone(), sender);
        }
        tracing::info!(event_id = %event.id, topic = %topic, "awaiting human approval");
        match receiver.await {
            Ok(true) => Ok(Some(event)),
            // Denied, or the sender was dropped without a decision.
            Ok(false) | Err(_) => {
                tracing::info!(event_id = %event.id, "approval denied");
                Ok(None)
            }
        }
    }

    async fn post(&self, _event: &Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn shell_event() -> Event {
        Event::new("/agent/a", "tool.execute", json!({})).with_subject("/shell/rm")
    }

    #[tokio::test]
    async fn approved_events_pass() {
        let hitl = Arc::new(HitlInterceptor::new(["tool.execute/shell/**"]));
        let event = shell_event();
        let id = event.id.clone();

        let hitl_bg = hitl.clone();
        let pre = tokio::spawn(async move { hitl_bg.pre(event).await });

        // Wait until the dispatch registers, then approve.
        loop {
            if hitl.pending_ids().contains(&id) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(hitl.approve(&id));
        let out = pre.await.unwrap().unwrap();
        assert!(out.is_some());
    }

    #[tokio::test]
    async fn denied_events_block() {
        let hitl = Arc::new(HitlInterceptor::new(["tool.execute/shell/**"]));
        let event = shell_event();
        let id = event.id.clone();

        let hitl_bg = hitl.clone();
        let pre = tokio::spawn(async move { hitl_bg.pre(event).await });
        loop {
            if hitl.pending_ids().contains(&id) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(hitl.deny(&id));
        let out = pre.await.unwrap().unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn unmatched_topics_pass_through() {
        let hitl = HitlInterceptor::new(["tool.execute/shell/**"]);
        let event = Event::new("/agent/a", "node.thinking", json!({}));
        assert!(hitl.pre(event).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deciding_an_unknown_id_is_false() {
        let hitl = HitlInterceptor::new(["tool.execute/shell/**"]);
        assert!(!hitl.approve("nope"));
        assert!(!hitl.deny("nope"));
    }
}
