#![deny(missing_docs)]
//! The reason/act agent loop for fractal.
//!
//! An [`Agent`] owns a four-tier memory, a tool router, and a streaming
//! provider, and drives one task at a time through a bounded loop:
//!
//! 1. Build context from memory under the window budget.
//! 2. Stream the provider, republishing chunks as `node.thinking` /
//!    `node.tool_call` events so observers see partial output.
//! 3. Aggregate tool-call fragments; invalid JSON becomes an error
//!    observation, never an execution.
//! 4. Execute calls sequentially in stream order; `done` terminates,
//!    `delegate_subtasks` hands off to the orchestrator.
//! 5. Terminate on `done`, bare text (unless `require_done_tool`), or
//!    the iteration budget.
//!
//! Retryable provider failures back off exponentially; terminal failures
//! fail the task and preserve memory for debugging.

pub mod agent;
pub mod aggregate;
pub mod config;
pub mod context;
pub mod retry;

pub use agent::{
    Agent, AgentBuilder, AgentStats, DelegationContext, DelegationHandler, TaskResult,
    DONE_REMINDER,
};
pub use aggregate::{AggregatedCall, ToolCallAggregator};
pub use config::{AgentConfig, RetryConfig};
pub use context::build_context;
pub use retry::with_retry;
