#![deny(missing_docs)]
//! # fractal — a runtime for recursive agent trees
//!
//! One node looks like the whole: every agent owns a four-tier memory,
//! a tool router, and a bounded reason/act loop, and may delegate
//! subtasks to child agents that look exactly the same. Everything the
//! tree does crosses one event bus, mediated by an interceptor chain.
//!
//! | Crate | Concern |
//! |-------|---------|
//! | `fractal-types` | data model, provider contracts, errors |
//! | `fractal-token` | token counting (BPE + estimator) |
//! | `fractal-memory` | L1–L4 tiers, promotion, cross-session sharing |
//! | `fractal-bus` | pub/sub, dispatcher, interceptors |
//! | `fractal-tool` | registry, router, sandbox, dynamic tools |
//! | `fractal-loop` | the agent loop |
//! | `fractal-orch` | delegation and synthesis |
//!
//! This crate re-exports the public surface and adds [`AgentFactory`],
//! the one-stop assembly point for a fully wired agent tree.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fractal::{AgentFactory, EventBus, Dispatcher, ToolRegistry};
//! # use fractal::Provider;
//! # async fn run(provider: Arc<dyn Provider>) {
//! let bus = Arc::new(EventBus::new());
//! let dispatcher = Arc::new(Dispatcher::builder(bus).build());
//! let factory = AgentFactory::new(provider, dispatcher);
//! let mut agent = factory.create_agent(
//!     "researcher",
//!     "Researcher",
//!     "You research questions and report findings via done().",
//!     ToolRegistry::new(),
//! );
//! # }
//! ```

mod factory;

pub use factory::AgentFactory;

pub use fractal_bus::{
    interceptors, Dispatcher, DispatcherBuilder, DispatchOutcome, EventBus, EventHandler,
    EventRecord, HandlerError, Interceptor, SubscriptionId, TopicPattern,
};
pub use fractal_loop::{
    build_context, Agent, AgentBuilder, AgentConfig, AgentStats, AggregatedCall,
    DelegationContext, DelegationHandler, RetryConfig, TaskResult, ToolCallAggregator,
};
pub use fractal_memory::{
    AgentMemory, EntryType, MemoryConfig, MemoryController, MemoryStats, MemoryVectorStore,
    PromotionStrategy, TaskSummary, WorkingEntry,
};
pub use fractal_orch::{
    ChildOutcome, DelegationRequest, ExecutionMode, FractalOrchestrator, OrchestratorConfig,
    SubtaskSpec, SynthesisStrategy,
};
pub use fractal_token::{BpeCounter, EstimateCounter, TokenCounter};
pub use fractal_tool::{
    builtin, DynamicToolExecutor, ExecutorFn, SandboxDescriptor, SandboxManager, SandboxOp,
    ToolExecutor, ToolPolicy, ToolRegistry, ToolRouter, DELEGATE_TOOL, DONE_TOOL,
};
pub use fractal_types::{
    BudgetExceeded, ChatParams, ChatRequest, ChatResponse, ChunkStream, DelegationError,
    DispatchError, Embedder, EmbeddingError, Event, EventQuery, FailureReport, FinishReason,
    LoopError, MemoryError, MessageItem, MetadataFilter, Provider, ProviderError,
    ProviderRegistry, Role, StreamChunk, Task, TaskMetadata, TaskStatus, TokenUsage, ToolCall,
    ToolDefinition, ToolError, ToolScope, VectorHit, VectorStore,
};

#[cfg(feature = "test-utils")]
pub use fractal_types::test_utils;
