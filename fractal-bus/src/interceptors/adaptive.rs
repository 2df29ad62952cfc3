//! Anomaly-driven recovery rewrites.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use fractal_types::{DispatchError, Event};

use crate::dispatcher::Interceptor;

/// Extension key the interceptor writes its recovery action under.
pub const RECOVERY_KEY: &str = "recovery";

/// Tuning for [`AdaptiveInterceptor`].
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    /// How many recent outcomes to keep.
    pub window: usize,
    /// Failures within the window that trigger recovery.
    pub failure_threshold: usize,
    /// Token total within the window that triggers batch reduction.
    pub token_spike_threshold: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            window: 20,
            failure_threshold: 5,
            token_spike_threshold: 100_000,
        }
    }
}

#[derive(Default)]
struct Signals {
    outcomes: VecDeque<bool>,
    tokens: VecDeque<u64>,
}

/// Watches recent anomaly signals (provider failures, token-rate spikes)
/// and rewrites event extensions to apply a recovery action: repeated
/// failures request a provider switch, token spikes request a reduced
/// batch size.
pub struct AdaptiveInterceptor {
    config: AdaptiveConfig,
    signals: Mutex<Signals>,
}

impl AdaptiveInterceptor {
    /// Create an interceptor with the given tuning.
    #[must_use]
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            config,
            signals: Mutex::new(Signals::default()),
        }
    }

    fn recent_failures(&self) -> usize {
        let signals = self.signals.lock().expect("signals lock poisoned");
        signals.outcomes.iter().filter(|failed| **failed).count()
    }

    fn recent_tokens(&self) -> u64 {
        let signals = self.signals.lock().expect("signals lock poisoned");
        signals.tokens.iter().sum()
    }
}

impl Default for AdaptiveInterceptor {
    fn default() -> Self {
        Self::new(AdaptiveConfig::default())
    }
}

#[async_trait]
impl Interceptor for AdaptiveInterceptor {
    fn name(&self) -> &str {
        "adaptive"
    }

    async fn pre(&self, event: Event) -> Result<Option<Event>, DispatchError> {
        if event.event_type != "node.request" {
            return Ok(Some(event));
        }
        if self.recent_failures() >= self.config.failure_threshold {
            tracing::warn!("repeated provider failures, requesting provider switch");
            return Ok(Some(event.with_extension(RECOVERY_KEY, "switch_provider".into())));
        }
        if self.recent_tokens() >= self.config.token_spike_threshold {
            tracing::warn!("token-rate spike, requesting reduced batch size");
            return Ok(Some(event.with_extension(RECOVERY_KEY, "reduce_batch".into())));
        }
        Ok(Some(event))
    }

    async fn post(&self, event: &Event) {
        let failed = event.event_type.ends_with(".error")
            || event
                .data
                .get("error")
                .is_some_and(|e| !e.is_null());
        let tokens = event
            .data
            .get("token_usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);

        let mut signals = self.signals.lock().expect("signals lock poisoned");
        signals.outcomes.push_back(failed);
        while signals.outcomes.len() > self.config.window {
            signals.outcomes.pop_front();
        }
        signals.tokens.push_back(tokens);
        while signals.tokens.len() > self.config.window {
            signals.tokens.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn failures_trigger_provider_switch() {
        let adaptive = AdaptiveInterceptor::new(AdaptiveConfig {
            window: 10,
            failure_threshold: 3,
            token_spike_threshold: u64::MAX,
        });
        for _ in 0..3 {
            adaptive
                .post(&Event::new("/agent/a", "provider.error", json!({})))
                .await;
        }
        let out = adaptive
            .pre(Event::new("/agent/a", "node.request", json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.extensions[RECOVERY_KEY], "switch_provider");
    }

    #[tokio::test]
    async fn token_spike_triggers_batch_reduction() {
        let adaptive = AdaptiveInterceptor::new(AdaptiveConfig {
            window: 10,
            failure_threshold: 100,
            token_spike_threshold: 1_000,
        });
        adaptive
            .post(&Event::new(
                "/agent/a",
                "node.complete",
                json!({"token_usage": {"total_tokens": 1_500}}),
            ))
            .await;
        let out = adaptive
            .pre(Event::new("/agent/a", "node.request", json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.extensions[RECOVERY_KEY], "reduce_batch");
    }

    #[tokio::test]
    async fn quiet_signals_pass_events_untouched() {
        let adaptive = AdaptiveInterceptor::default();
        let out = adaptive
            .pre(Event::new("/agent/a", "node.request", json!({})))
            .await
            .unwrap()
            .unwrap();
        assert!(!out.extensions.contains_key(RECOVERY_KEY));
    }

    #[tokio::test]
    async fn window_slides() {
        let adaptive = AdaptiveInterceptor::new(AdaptiveConfig {
            window: 2,
            failure_threshold: 2,
            token_spike_threshold: u64::MAX,
        });
        adaptive.post(&Event::new("/a", "provider.error", json!({}))).await;
        adaptive.post(&Event::new("/a", "provider.error", json!({}))).await;
        // Two successes push the failures out of the window.
        adaptive.post(&Event::new("/a", "node.complete", json!({}))).await;
        adaptive.post(&Event::new("/a", "node.complete", json!({}))).await;
        let out = adaptive
            .pre(Event::new("/a", "node.request", json!({})))
            .await
            .unwrap()
            .unwrap();
        assert!(!out.extensions.contains_key(RECOVERY_KEY));
    }
}
