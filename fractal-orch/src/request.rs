//! Delegation request types.

use fractal_types::DelegationError;
use serde::{Deserialize, Serialize};

/// One subtask to hand to a child agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskSpec {
    /// What the child should do.
    pub description: String,
    /// Role label for the child.
    #[serde(default)]
    pub role: Option<String>,
    /// Tool allowlist intersected with the parent's tool set.
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    /// Cap on the child's output tokens per provider call.
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

impl SubtaskSpec {
    /// A spec with just a description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            role: None,
            tools: None,
            max_tokens: None,
        }
    }

    /// Set the child's role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Restrict the child's tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// How children execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One child at a time; stop on the first fatal failure.
    #[default]
    Sequential,
    /// All children concurrently; wait for every outcome.
    Parallel,
}

/// How child results combine into one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    /// Join result strings with separators.
    Concatenate,
    /// Render a markdown document with per-subtask status.
    Structured,
    /// Ask the parent's own provider to synthesize.
    Llm,
    /// `Llm` when a provider is available and any child succeeded,
    /// otherwise `Structured`.
    #[default]
    Auto,
}

/// A request to split work across child agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRequest {
    /// The subtasks, in order.
    pub subtasks: Vec<SubtaskSpec>,
    /// Execution mode.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Synthesis strategy.
    #[serde(default)]
    pub synthesis_strategy: SynthesisStrategy,
}

impl DelegationRequest {
    /// A sequential, auto-synthesized request.
    #[must_use]
    pub fn new(subtasks: Vec<SubtaskSpec>) -> Self {
        Self {
            subtasks,
            execution_mode: ExecutionMode::default(),
            synthesis_strategy: SynthesisStrategy::default(),
        }
    }

    /// Parse a request from the `delegate_subtasks` tool arguments.
    ///
    /// # Errors
    ///
    /// [`DelegationError::InvalidRequest`] on malformed arguments.
    pub fn from_args(
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, DelegationError> {
        serde_json::from_value(serde_json::Value::Object(args.clone()))
            .map_err(|e| DelegationError::InvalidRequest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parses_minimal_request() {
        let request = DelegationRequest::from_args(&args(json!({
            "subtasks": [{"description": "research topic A"}]
        })))
        .unwrap();
        assert_eq!(request.subtasks.len(), 1);
        assert_eq!(request.execution_mode, ExecutionMode::Sequential);
        assert_eq!(request.synthesis_strategy, SynthesisStrategy::Auto);
    }

    #[test]
    fn parses_full_request() {
        let request = DelegationRequest::from_args(&args(json!({
            "subtasks": [
                {"description": "a", "role": "researcher", "tools": ["search"], "max_tokens": 500},
                {"description": "b"}
            ],
            "execution_mode": "parallel",
            "synthesis_strategy": "structured"
        })))
        .unwrap();
        assert_eq!(request.execution_mode, ExecutionMode::Parallel);
        assert_eq!(request.synthesis_strategy, SynthesisStrategy::Structured);
        assert_eq!(request.subtasks[0].tools.as_deref().unwrap(), ["search"]);
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let err = DelegationRequest::from_args(&args(json!({"subtasks": "not a list"})))
            .unwrap_err();
        assert!(matches!(err, DelegationError::InvalidRequest(_)));
    }
}
