#![deny(missing_docs)]
//! # fractal-types — Core types for fractal agent trees
//!
//! This crate defines the data model and protocol boundaries shared by
//! every other fractal crate:
//!
//! | Concern | Types |
//! |---------|-------|
//! | Events | [`Event`], [`EventQuery`] |
//! | Tasks | [`Task`], [`TaskStatus`], [`TaskMetadata`] |
//! | Conversation | [`MessageItem`], [`Role`] |
//! | Streaming | [`StreamChunk`], [`ChunkStream`], [`FinishReason`] |
//! | Providers | [`Provider`], [`Embedder`], [`ProviderRegistry`] |
//! | Vectors | [`VectorStore`], [`VectorHit`], [`MetadataFilter`] |
//! | Tools | [`ToolDefinition`], [`ToolScope`], [`ToolCall`] |
//! | Errors | [`ProviderError`], [`ToolError`], [`LoopError`], ... |
//!
//! ## Design notes
//!
//! Providers are expressed as capability sets, not an inheritance
//! hierarchy: an implementation satisfies the LLM contract ([`Provider`])
//! or the embedding contract ([`Embedder`]), and [`ProviderRegistry`] maps
//! stable keys to capability-satisfying implementations.
//!
//! Extension data uses `serde_json::Value` throughout. JSON is the
//! universal interchange format for agentic systems and `Value` is the
//! de facto standard in the Rust ecosystem; generic `T: Serialize` would
//! complicate trait-object safety without practical benefit.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod stream;
pub mod task;
pub mod tool;
pub mod vector;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::{
    BudgetExceeded, DelegationError, DispatchError, EmbeddingError, FailureReport, LoopError,
    MemoryError, ProviderError, ToolError,
};
pub use event::{Event, EventQuery};
pub use message::{MessageItem, Role};
pub use provider::{ChatParams, ChatRequest, ChatResponse, Embedder, Provider, ProviderRegistry, TokenUsage};
pub use stream::{ChunkStream, FinishReason, StreamChunk};
pub use task::{Task, TaskMetadata, TaskStatus};
pub use tool::{ToolCall, ToolDefinition, ToolScope};
pub use vector::{MetadataFilter, VectorHit, VectorStore};
