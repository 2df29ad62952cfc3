//! The universal message: every agent action crosses the bus as an [`Event`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The universal message routed through the bus and dispatcher.
///
/// Events are immutable after publication. Interceptors that need to alter
/// one produce a new event (see [`Event::with_extension`] and friends —
/// every mutator consumes `self` and returns the rewritten event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Stable opaque identifier.
    pub id: String,
    /// Dotted action name, e.g. `node.request`, `node.tool_call`.
    pub event_type: String,
    /// URI-like origin, e.g. `/agent/researcher`.
    pub source: String,
    /// Optional routing target.
    pub subject: Option<String>,
    /// Payload.
    pub data: serde_json::Value,
    /// W3C-style trace context: `00-<32 hex>-<16 hex>-01`.
    pub traceparent: Option<String>,
    /// Id of the event that caused this one, if any.
    pub parent_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Sparse extension map (e.g. `timeout`, `depth`, `estimated_tokens`).
    #[serde(default)]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event with a generated id and the current timestamp.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            source: source.into(),
            subject: None,
            data,
            traceparent: None,
            parent_id: None,
            created_at: Utc::now(),
            extensions: HashMap::new(),
        }
    }

    /// Set the routing subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the trace context.
    #[must_use]
    pub fn with_traceparent(mut self, traceparent: impl Into<String>) -> Self {
        self.traceparent = Some(traceparent.into());
        self
    }

    /// Set the causing event's id.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Attach an extension value.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// The topic this event is routed on.
    ///
    /// The dotted `event_type` is the first segment; the subject's path
    /// segments follow. `tool.execute` with subject `/shell/rm` routes on
    /// `tool.execute/shell/rm`.
    #[must_use]
    pub fn topic(&self) -> String {
        match &self.subject {
            Some(subject) => {
                let trimmed = subject.trim_matches('/');
                if trimmed.is_empty() {
                    self.event_type.clone()
                } else {
                    format!("{}/{}", self.event_type, trimmed)
                }
            }
            None => self.event_type.clone(),
        }
    }

    /// The task id carried in the payload, if any.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.data.get("task_id").and_then(|v| v.as_str())
    }
}

/// A query against the bus's diagnostic ring buffer.
///
/// All fields are conjunctive; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Match on `event_type`.
    pub event_type: Option<String>,
    /// Match on `source`.
    pub source: Option<String>,
    /// Match on `subject`.
    pub target: Option<String>,
    /// Match on the payload's `task_id`.
    pub task_id: Option<String>,
    /// Maximum number of events to return (most recent first).
    pub limit: usize,
}

impl EventQuery {
    /// A query returning the `limit` most recent events.
    #[must_use]
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Whether this query matches the given event.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(t) = &self.event_type
            && t != &event.event_type
        {
            return false;
        }
        if let Some(s) = &self.source
            && s != &event.source
        {
            return false;
        }
        if let Some(target) = &self.target
            && event.subject.as_deref() != Some(target.as_str())
        {
            return false;
        }
        if let Some(task_id) = &self.task_id
            && event.task_id() != Some(task_id.as_str())
        {
            return false;
        }
        true
    }
}
