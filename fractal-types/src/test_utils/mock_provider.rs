//! A scripted LLM provider for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::error::ProviderError;
use crate::provider::{ChatRequest, ChatResponse, Provider, TokenUsage};
use crate::stream::{ChunkStream, FinishReason, StreamChunk};
use crate::tool::ToolCall;

/// One scripted turn of a [`MockProvider`].
#[derive(Debug, Clone)]
pub enum MockTurn {
    /// A complete response; `stream_chat` synthesizes chunks from it.
    Response(ChatResponse),
    /// A literal chunk sequence; `chat` aggregates text and completed
    /// tool calls from it.
    Chunks(Vec<StreamChunk>),
    /// A provider failure. Retryable kinds exercise the backoff path.
    Failure {
        /// Whether the error should classify as retryable.
        retryable: bool,
        /// The error message.
        message: String,
    },
}

impl MockTurn {
    /// A text-only response turn.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Response(ChatResponse {
            content: content.into(),
            tool_calls: vec![],
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 10,
            }),
        })
    }

    /// A turn that calls a single tool.
    #[must_use]
    pub fn tool_call(
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        let name = name.into();
        Self::Response(ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call-{}", uuid::Uuid::new_v4().simple()),
                name,
                arguments,
            }],
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 10,
            }),
        })
    }
}

/// A provider that replays pre-configured turns in order.
///
/// Panics when asked for more turns than were scripted — a test that
/// over-consumes its script is a broken test.
pub struct MockProvider {
    script: Mutex<VecDeque<MockTurn>>,
}

impl MockProvider {
    /// Create a provider with the given script.
    #[must_use]
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
        }
    }

    fn next_turn(&self) -> MockTurn {
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .pop_front()
            .expect("MockProvider: no more turns configured")
    }

    fn failure_error(retryable: bool, message: &str) -> ProviderError {
        if retryable {
            ProviderError::Network(message.to_string())
        } else {
            ProviderError::InvalidRequest(message.to_string())
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        match self.next_turn() {
            MockTurn::Response(response) => Ok(response),
            MockTurn::Chunks(chunks) => Ok(aggregate_chunks(chunks)),
            MockTurn::Failure { retryable, message } => {
                Err(Self::failure_error(retryable, &message))
            }
        }
    }

    async fn stream_chat(&self, _request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        match self.next_turn() {
            MockTurn::Response(response) => {
                let chunks = synthesize_chunks(response);
                Ok(Box::pin(stream::iter(chunks)))
            }
            MockTurn::Chunks(chunks) => Ok(Box::pin(stream::iter(chunks))),
            MockTurn::Failure { retryable, message } => {
                Err(Self::failure_error(retryable, &message))
            }
        }
    }
}

/// Turn a full response into the chunk sequence a real provider would
/// stream for it.
fn synthesize_chunks(response: ChatResponse) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    if !response.content.is_empty() {
        chunks.push(StreamChunk::Text {
            content: response.content.clone(),
        });
    }
    let had_tools = !response.tool_calls.is_empty();
    for (index, call) in response.tool_calls.into_iter().enumerate() {
        chunks.push(StreamChunk::ToolCallStart {
            id: call.id.clone(),
            name: call.name.clone(),
            index,
        });
        chunks.push(StreamChunk::ToolCallDelta {
            index,
            arguments_fragment: call.arguments.to_string(),
        });
        chunks.push(StreamChunk::ToolCallComplete {
            id: call.id,
            name: call.name,
            arguments: None,
        });
    }
    chunks.push(StreamChunk::Done {
        finish_reason: if had_tools {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        },
        usage: response.usage,
    });
    chunks
}

/// Assemble a response from a literal chunk script (text + completed
/// calls with provider-parsed arguments only).
fn aggregate_chunks(chunks: Vec<StreamChunk>) -> ChatResponse {
    let mut response = ChatResponse::default();
    for chunk in chunks {
        match chunk {
            StreamChunk::Text { content } => response.content.push_str(&content),
            StreamChunk::ToolCallComplete {
                id,
                name,
                arguments: Some(arguments),
            } => response.tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            }),
            StreamChunk::Done { usage, .. } => response.usage = usage,
            _ => {}
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn replays_turns_in_order() {
        let provider = MockProvider::new(vec![
            MockTurn::text("first"),
            MockTurn::text("second"),
        ]);
        let a = provider.chat(ChatRequest::default()).await.unwrap();
        let b = provider.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
    }

    #[tokio::test]
    async fn synthesized_stream_ends_with_done() {
        let provider = MockProvider::new(vec![MockTurn::tool_call("calc", json!({"x": 1}))]);
        let mut stream = provider.stream_chat(ChatRequest::default()).await.unwrap();
        let mut kinds = Vec::new();
        while let Some(chunk) = stream.next().await {
            kinds.push(match chunk {
                StreamChunk::Text { .. } => "text",
                StreamChunk::ToolCallStart { .. } => "start",
                StreamChunk::ToolCallDelta { .. } => "delta",
                StreamChunk::ToolCallComplete { .. } => "complete",
                StreamChunk::Done { .. } => "done",
                StreamChunk::Error { .. } => "error",
            });
        }
        assert_eq!(kinds, vec!["start", "delta", "complete", "done"]);
    }

    #[tokio::test]
    async fn retryable_failure_classifies() {
        let provider = MockProvider::new(vec![MockTurn::Failure {
            retryable: true,
            message: "connection reset".into(),
        }]);
        let err = provider.chat(ChatRequest::default()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
