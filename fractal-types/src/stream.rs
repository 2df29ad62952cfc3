//! Streaming chunk types for incremental LLM responses.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::provider::TokenUsage;

/// Why a stream finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the response.
    Stop,
    /// The model emitted tool calls.
    ToolCalls,
    /// The output token limit was hit.
    Length,
    /// The stream aborted with an error.
    Error,
    /// Provider-specific reason.
    Other(String),
}

/// A chunk emitted by a provider's streaming entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Incremental text content.
    Text {
        /// The text fragment.
        content: String,
    },
    /// A tool call block has started.
    ToolCallStart {
        /// Tool call identifier.
        id: String,
        /// Tool name.
        name: String,
        /// Position of this call within the response.
        index: usize,
    },
    /// An incremental fragment of a tool call's JSON arguments.
    ToolCallDelta {
        /// Position of the call this fragment belongs to.
        index: usize,
        /// The raw arguments fragment.
        arguments_fragment: String,
    },
    /// A tool call block has ended.
    ///
    /// `arguments` is present when the provider parsed the arguments
    /// itself; otherwise the aggregator assembles them from the deltas.
    ToolCallComplete {
        /// Tool call identifier.
        id: String,
        /// Tool name.
        name: String,
        /// Parsed arguments, if the provider supplied them.
        arguments: Option<serde_json::Value>,
    },
    /// The stream finished.
    Done {
        /// Why generation stopped.
        finish_reason: FinishReason,
        /// Token usage, if the provider reports it.
        usage: Option<TokenUsage>,
    },
    /// The stream failed.
    Error {
        /// Machine-readable error kind (e.g. `rate_limit`).
        kind: String,
        /// Human-readable message.
        message: String,
    },
}

/// A stream of [`StreamChunk`]s from a provider.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_tag_by_type() {
        let chunk = StreamChunk::Text {
            content: "hi".into(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "text");

        let chunk = StreamChunk::ToolCallDelta {
            index: 0,
            arguments_fragment: "{\"x\":".into(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "tool_call_delta");
    }
}
