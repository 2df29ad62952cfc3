//! Session-wide token budget enforcement.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use fractal_types::{BudgetExceeded, DispatchError, Event};

use crate::bus::EventBus;
use crate::dispatcher::Interceptor;

/// Extension key carrying an event's estimated token cost.
pub const ESTIMATED_TOKENS_KEY: &str = "estimated_tokens";

/// Tracks tokens spent across the session and blocks dispatches that
/// would exceed the ceiling.
///
/// Pre: events carrying an `estimated_tokens` extension are checked
/// against `spent + estimate`; over the ceiling, a `budget.exceeded`
/// event is published and the dispatch fails with [`BudgetExceeded`].
/// Post: actual consumption is read from the event payload's
/// `token_usage.total_tokens` when present.
pub struct BudgetInterceptor {
    max_tokens: u64,
    spent: Mutex<u64>,
    bus: Arc<EventBus>,
}

impl BudgetInterceptor {
    /// Create an interceptor with the given token ceiling.
    #[must_use]
    pub fn new(max_tokens: u64, bus: Arc<EventBus>) -> Self {
        Self {
            max_tokens,
            spent: Mutex::new(0),
            bus,
        }
    }

    /// Tokens spent so far.
    #[must_use]
    pub fn spent(&self) -> u64 {
        *self.spent.lock().expect("budget lock poisoned")
    }
}

#[async_trait]
impl Interceptor for BudgetInterceptor {
    fn name(&self) -> &str {
        "budget"
    }

    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
        let Some(estimated) = event
            .extensions
            .get(ESTIMATED_TOKENS_KEY)
            .and_then(serde_json::Value::as_u64)
        else {
            return Ok(Some(event));
        };
        let spent = self.spent();
        if spent + estimated > self.max_tokens {
            let exceeded = BudgetExceeded {
                used: spent + estimated,
                limit: self.max_tokens,
            };
            self.bus
                .publish(
                    Event::new(
                        "/kernel/budget",
                        "budget.exceeded",
                        serde_json::json!({
                            "used": exceeded.used,
                            "limit": exceeded.limit,
                            "blocked_event": event.id,
                        }),
                    )
                    .with_parent(event.id.clone()),
                )
                .await;
            return Err(exceeded.into());
        }
        Ok(Some(event))
    }

    async fn post(&self, event: &Event) {
        let actual = event
            .data
            .get("token_usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(serde_json::Value::as_u64);
        if let Some(actual) = actual {
            let mut spent = self.spent.lock().expect("budget lock poisoned");
            *spent += actual;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractal_types::EventQuery;
    use serde_json::json;

    fn usage_event(total: u64) -> Event {
        Event::new(
            "/agent/a",
            "node.complete",
            json!({"token_usage": {"total_tokens": total}}),
        )
    }

    #[tokio::test]
    async fn post_accumulates_actual_usage() {
        let bus = Arc::new(EventBus::new());
        let budget = BudgetInterceptor::new(1_000, bus);
        budget.post(&usage_event(300)).await;
        budget.post(&usage_event(200)).await;
        assert_eq!(budget.spent(), 500);
    }

    #[tokio::test]
    async fn pre_blocks_over_budget_and_emits_event() {
        let bus = Arc::new(EventBus::new());
        let budget = BudgetInterceptor::new(400, bus.clone());
        budget.post(&usage_event(350)).await;

        let request = Event::new("/agent/a", "node.request", json!({}))
            .with_extension(ESTIMATED_TOKENS_KEY, json!(100));
        let err = budget.pre(request).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Budget(BudgetExceeded { used: 450, limit: 400 })
        ));

        let exceeded = bus.query(&EventQuery {
            event_type: Some("budget.exceeded".into()),
            limit: 10,
            ..EventQuery::default()
        });
        assert_eq!(exceeded.len(), 1);
        assert_eq!(exceeded[0].data["limit"], 400);
    }

    #[tokio::test]
    async fn events_without_estimate_pass() {
        let bus = Arc::new(EventBus::new());
        let budget = BudgetInterceptor::new(10, bus);
        let event = Event::new("/agent/a", "node.thinking", json!({}));
        assert!(budget.pre(event).await.unwrap().is_some());
    }
}
