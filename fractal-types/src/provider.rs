//! Provider contracts — the LLM and embedding capability boundaries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, ProviderError};
use crate::message::MessageItem;
use crate::stream::ChunkStream;
use crate::tool::{ToolCall, ToolDefinition};

/// Token usage statistics for one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the input/prompt.
    pub input_tokens: usize,
    /// Tokens in the output/completion.
    pub output_tokens: usize,
}

impl TokenUsage {
    /// Total tokens consumed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Sampling parameters for a chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatParams {
    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// A chat request to an LLM provider.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation, system prompt first.
    pub messages: Vec<MessageItem>,
    /// Tool definitions available to the model.
    pub tools: Vec<ToolDefinition>,
    /// Sampling parameters.
    pub params: ChatParams,
}

/// A chat response from an LLM provider.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// The text content of the response.
    pub content: String,
    /// Tool calls the model wants executed, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage, if the provider reports it.
    pub usage: Option<TokenUsage>,
}

/// The LLM capability. Implemented per provider backend.
///
/// Object-safe: agents hold `Arc<dyn Provider>`, so a whole tree of
/// agents can share one connection-pooled client.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a chat request and get the full response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Send a chat request and get a stream of chunks.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError>;
}

/// The embedding capability.
///
/// Implementations must be idempotent: embedding the same text twice from
/// the same instance yields bit-identical vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of texts, one vector per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimension of the produced vectors.
    fn dimension(&self) -> usize;
}

/// Registry mapping stable keys to capability-satisfying implementations.
///
/// There is no provider inheritance hierarchy: an implementation registers
/// under the capability contracts it satisfies, nothing more.
#[derive(Default)]
pub struct ProviderRegistry {
    llms: HashMap<String, Arc<dyn Provider>>,
    embedders: HashMap<String, Arc<dyn Embedder>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an LLM provider under a stable key.
    pub fn register_llm(&mut self, key: impl Into<String>, provider: Arc<dyn Provider>) {
        self.llms.insert(key.into(), provider);
    }

    /// Register an embedder under a stable key.
    pub fn register_embedder(&mut self, key: impl Into<String>, embedder: Arc<dyn Embedder>) {
        self.embedders.insert(key.into(), embedder);
    }

    /// Look up an LLM provider.
    #[must_use]
    pub fn llm(&self, key: &str) -> Option<Arc<dyn Provider>> {
        self.llms.get(key).cloned()
    }

    /// Look up an embedder.
    #[must_use]
    pub fn embedder(&self, key: &str) -> Option<Arc<dyn Embedder>> {
        self.embedders.get(key).cloned()
    }
}
