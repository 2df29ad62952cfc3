//! Tool definitions and calls as exchanged with the model.

use serde::{Deserialize, Serialize};

/// What a tool executor is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolScope {
    /// Unrestricted filesystem/network access.
    System,
    /// Bound to a sandbox descriptor (root dir, timeout, op allowlist).
    Sandboxed,
}

/// Definition of a tool available to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// What the tool does, phrased for the model.
    pub description: String,
    /// JSON-Schema-style parameter specification.
    pub parameters: serde_json::Value,
    /// Execution scope.
    pub scope: ToolScope,
}

impl ToolDefinition {
    /// A system-scoped tool definition.
    #[must_use]
    pub fn system(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            scope: ToolScope::System,
        }
    }

    /// A sandbox-scoped tool definition.
    #[must_use]
    pub fn sandboxed(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            scope: ToolScope::Sandboxed,
        }
    }
}

/// A fully aggregated tool call from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: serde_json::Value,
}
