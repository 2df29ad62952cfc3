//! Item types stored in the memory tiers.

use chrono::{DateTime, Utc};
use fractal_types::{MessageItem, Role};
use serde::{Deserialize, Serialize};

/// Classification of an L2 working-set entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// A standalone fact.
    Fact,
    /// A decision the agent committed to.
    Decision,
    /// A plan or intended course of action.
    Plan,
    /// A tool-result or environmental observation.
    Observation,
    /// Anything else.
    Other,
}

impl EntryType {
    /// Classify by the role that produced the content.
    #[must_use]
    pub fn from_role(role: Role) -> Self {
        match role {
            Role::Tool => Self::Observation,
            Role::Assistant => Self::Decision,
            _ => Self::Other,
        }
    }
}

/// An entry in the L2 working set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingEntry {
    /// The content.
    pub content: String,
    /// Importance in `[0, 1]` — the eviction key.
    pub importance: f64,
    /// Exact token count of the content.
    pub token_count: usize,
    /// Entry classification.
    pub entry_type: EntryType,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Task the entry derives from, if any.
    pub task_id: Option<String>,
    /// Session the entry belongs to.
    pub session_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A compressed task record in the L3 summary tier.
///
/// Summaries are lossy: they may reference task ids that no longer exist
/// in L1/L2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Id of the summarized task.
    pub task_id: String,
    /// The task's action.
    pub action: String,
    /// Parameter repr truncated to 200 chars.
    pub param_summary: String,
    /// Result repr truncated to 200 chars.
    pub result_summary: String,
    /// Tags; auto-derived as `[action, status]` when none were given.
    pub tags: Vec<String>,
    /// Importance inherited from the task.
    pub importance: f64,
    /// Session the task belonged to.
    pub session_id: Option<String>,
    /// When the summarized task was created.
    pub created_at: DateTime<Utc>,
    /// How many times the summary has been read back.
    #[serde(default)]
    pub access_count: u32,
}

impl TaskSummary {
    /// The textual form used for token counting and embedding.
    #[must_use]
    pub fn text_form(&self) -> String {
        format!(
            "{}: {} -> {}",
            self.action, self.param_summary, self.result_summary
        )
    }

    /// Metadata stored alongside the summary's L4 vector. The summary is
    /// fully reconstructible from it.
    #[must_use]
    pub fn vector_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "task_id": self.task_id,
            "action": self.action,
            "param_summary": self.param_summary,
            "result_summary": self.result_summary,
            "tags": self.tags,
            "importance": self.importance,
            "session_id": self.session_id,
            "created_at": self.created_at.to_rfc3339(),
        })
    }

    /// Rebuild a summary from L4 vector metadata. Returns `None` when the
    /// metadata is not summary-shaped.
    #[must_use]
    pub fn from_vector_metadata(metadata: &serde_json::Value) -> Option<Self> {
        let created_at = metadata
            .get("created_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));
        Some(Self {
            task_id: metadata.get("task_id")?.as_str()?.to_string(),
            action: metadata
                .get("action")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            param_summary: metadata
                .get("param_summary")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            result_summary: metadata
                .get("result_summary")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            tags: metadata
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|t| t.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
            importance: metadata
                .get("importance")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.5),
            session_id: metadata
                .get("session_id")
                .and_then(|v| v.as_str())
                .map(String::from),
            created_at,
            access_count: 0,
        })
    }
}

/// Truncate a repr to at most 200 chars, appending an ellipsis marker.
#[must_use]
pub fn truncate_repr(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(LIMIT).collect();
        format!("{truncated}...")
    }
}

/// A message record in the L1 working window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRecord {
    /// The stored message.
    pub message: MessageItem,
    /// Task the message belongs to, if any.
    pub task_id: Option<String>,
    /// Session the message belongs to.
    pub session_id: Option<String>,
    /// Importance hint for L1→L2 extraction, when the caller supplied one.
    pub importance: Option<f64>,
}

/// A point-in-time snapshot of the memory system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    /// L1 token usage.
    pub l1_token_usage: usize,
    /// L1 token budget.
    pub l1_token_budget: usize,
    /// L1 item count.
    pub l1_item_count: usize,
    /// L2 token usage.
    pub l2_token_usage: usize,
    /// L2 token budget.
    pub l2_token_budget: usize,
    /// L2 item count.
    pub l2_item_count: usize,
    /// L3 token usage.
    pub l3_token_usage: usize,
    /// L3 token budget.
    pub l3_token_budget: usize,
    /// L3 item count.
    pub l3_item_count: usize,
    /// Number of vectors in L4.
    pub l4_vector_count: usize,
    /// Vectors removed by pruning over the memory's lifetime.
    pub l4_pruned_count: usize,
    /// When L4 was last pruned.
    pub l4_last_pruned_at: Option<DateTime<Utc>>,
    /// Number of indexed tasks.
    pub task_index_size: usize,
    /// Whether L4 vectorization is operational.
    pub l4_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_repr_caps_at_200() {
        let long = "x".repeat(500);
        let truncated = truncate_repr(&long);
        assert_eq!(truncated.chars().count(), 203); // 200 + "..."
        assert!(truncated.ends_with("..."));

        let short = "short";
        assert_eq!(truncate_repr(short), "short");
    }

    #[test]
    fn summary_round_trips_through_vector_metadata() {
        let summary = TaskSummary {
            task_id: "t-1".into(),
            action: "search".into(),
            param_summary: "{\"q\": \"rust\"}".into(),
            result_summary: "3 hits".into(),
            tags: vec!["search".into(), "completed".into()],
            importance: 0.7,
            session_id: Some("s-1".into()),
            created_at: Utc::now(),
            access_count: 2,
        };
        let metadata = summary.vector_metadata();
        let rebuilt = TaskSummary::from_vector_metadata(&metadata).unwrap();
        assert_eq!(rebuilt.task_id, summary.task_id);
        assert_eq!(rebuilt.action, summary.action);
        assert_eq!(rebuilt.tags, summary.tags);
        assert_eq!(rebuilt.session_id, summary.session_id);
    }

    #[test]
    fn entry_type_from_role() {
        assert_eq!(EntryType::from_role(Role::Tool), EntryType::Observation);
        assert_eq!(EntryType::from_role(Role::Assistant), EntryType::Decision);
        assert_eq!(EntryType::from_role(Role::User), EntryType::Other);
    }
}
