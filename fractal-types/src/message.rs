//! Conversation messages as stored in the L1 working window and sent to
//! providers.

use serde::{Deserialize, Serialize};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A system instruction.
    System,
    /// A human user or upstream agent.
    User,
    /// The model.
    Assistant,
    /// A tool-result observation.
    Tool,
}

/// A single message in a conversation.
///
/// `token_count` is filled in by the memory layer at insert time; a zero
/// value means "not yet counted".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageItem {
    /// Who authored the message.
    pub role: Role,
    /// The text content.
    pub content: String,
    /// For `Tool` messages: the id of the tool call this answers.
    pub tool_call_id: Option<String>,
    /// For `Tool` messages: the name of the tool that produced it.
    pub tool_name: Option<String>,
    /// Exact token count of the content.
    #[serde(default)]
    pub token_count: usize,
}

impl MessageItem {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// An assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// A tool-result message keyed by the originating tool call.
    #[must_use]
    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            token_count: 0,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            token_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_message_carries_call_id_and_name() {
        let msg = MessageItem::tool("ok", "call-1", "search");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(msg.tool_name.as_deref(), Some("search"));
    }

    #[test]
    fn roles_serialize_snake_case() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
