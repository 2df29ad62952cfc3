//! Tasks — the semantically rich event variant driven through the agent loop.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task. Terminal states are `Completed`, `Failed`,
/// and `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not picked up yet.
    Pending,
    /// An agent loop is processing it.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Stable lowercase name, used when auto-deriving summary tags.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Memory-relevant metadata attached to every task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Importance in `[0, 1]`. Drives the L2 eviction ordering.
    pub importance: f64,
    /// Exact token count of the task's textual form. Derived at insert.
    pub token_count: usize,
    /// Free-form tags. When empty, summaries auto-derive `[action, status]`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// How many times the task has been read back from memory.
    #[serde(default)]
    pub access_count: u32,
    /// When the task was last read back from memory.
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
}

impl Default for TaskMetadata {
    fn default() -> Self {
        Self {
            importance: 0.5,
            token_count: 0,
            tags: Vec::new(),
            access_count: 0,
            last_accessed: None,
        }
    }
}

/// A unit of agent work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub task_id: String,
    /// Node id of the agent that created the task.
    pub source_agent: String,
    /// Node id of the agent the task is addressed to, if routed.
    pub target_agent: Option<String>,
    /// Id of the task that spawned this one (delegation chains).
    pub parent_task_id: Option<String>,
    /// Session the task belongs to.
    pub session_id: Option<String>,
    /// Dotted action name, e.g. `agent.execute`.
    pub action: String,
    /// Input parameters.
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Output, once the task reaches a terminal state.
    pub result: Option<serde_json::Value>,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Error description when `status == Failed`.
    pub error: Option<String>,
    /// Memory-relevant metadata.
    #[serde(default)]
    pub metadata: TaskMetadata,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task.
    #[must_use]
    pub fn new(source_agent: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            source_agent: source_agent.into(),
            target_agent: None,
            parent_task_id: None,
            session_id: None,
            action: action.into(),
            parameters: HashMap::new(),
            result: None,
            status: TaskStatus::Pending,
            error: None,
            metadata: TaskMetadata::default(),
            created_at: Utc::now(),
        }
    }

    /// Address the task to a target agent.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_agent = Some(target.into());
        self
    }

    /// Attach the task to a session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Link to the spawning task.
    #[must_use]
    pub fn with_parent(mut self, parent_task_id: impl Into<String>) -> Self {
        self.parent_task_id = Some(parent_task_id.into());
        self
    }

    /// Set a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set the importance used for L2 ranking. Clamped to `[0, 1]`.
    #[must_use]
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.metadata.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// The textual form used for token counting and embedding.
    #[must_use]
    pub fn text_form(&self) -> String {
        let params = serde_json::to_string(&self.parameters).unwrap_or_default();
        let result = self
            .result
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "null".to_string());
        format!("{}: {} -> {}", self.action, params, result)
    }
}
