//! Error types for all fractal crates.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors from LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    // Retryable errors
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(String),
    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if provided by the API.
        retry_after: Option<Duration>,
    },
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // Terminal errors
    /// Authentication/authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Error during streaming.
    #[error("stream error: {0}")]
    Stream(String),
    /// Any other provider error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether this error is likely transient and the request can be
    /// retried with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimit { .. } | Self::Timeout(_)
        )
    }
}

/// Errors from embedding provider operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if provided by the API.
        retry_after: Option<Duration>,
    },
    /// Network-level error.
    #[error("network error: {0}")]
    Network(String),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Any other embedding error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl EmbeddingError {
    /// Whether this error is likely transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Network(_))
    }
}

/// Errors from tool resolution and execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool not found in any registry, with up to five name suggestions.
    #[error("tool not found: {name}{}", format_suggestions(.suggestions))]
    NotFound {
        /// The requested tool name.
        name: String,
        /// Closest known tool names, at most five.
        suggestions: Vec<String>,
    },
    /// Tool call denied by the attached policy.
    #[error("permission denied for tool '{tool}': {reason}")]
    PermissionDenied {
        /// The denied tool.
        tool: String,
        /// Why the policy denied it.
        reason: String,
    },
    /// Tool execution failed at the logic level.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// Invalid input for the tool.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A sandboxed executor attempted to escape its root.
    #[error("sandbox violation: {0}")]
    SandboxViolation(String),
    /// Dynamic tool creation rejected the implementation.
    #[error("tool creation rejected: {0}")]
    CreationRejected(String),
    /// Tool execution exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Tool execution was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// The `done` tool fired — a control-flow signal, not a failure.
    ///
    /// Terminates the agent loop with success. Modeled as an error so it
    /// propagates out of the executor chain without a side channel.
    #[error("task completed: {message}")]
    TaskComplete {
        /// Brief summary of what was accomplished.
        message: String,
        /// Optional structured output for downstream nodes.
        output: Option<serde_json::Value>,
    },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

/// Errors from memory tier operations.
///
/// A full tier is never an error: eviction always makes room. These cover
/// the embedding/vector edge of the memory system only.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Vector dimension disagrees with the store.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The store's dimension.
        expected: usize,
        /// The offered vector's dimension.
        actual: usize,
    },
    /// The embedder failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// The token budget enforced by the budget interceptor was exceeded.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("token budget exceeded: used {used} of {limit}")]
pub struct BudgetExceeded {
    /// Tokens spent so far plus the blocked request's estimate.
    pub used: u64,
    /// The configured ceiling.
    pub limit: u64,
}

/// Errors from event dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The dispatch deadline fired; pending fan-out was cancelled.
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),
    /// An interceptor's pre hook failed.
    #[error("interceptor '{interceptor}' failed: {message}")]
    Interceptor {
        /// Name of the failing interceptor.
        interceptor: String,
        /// What went wrong.
        message: String,
    },
    /// The session token budget was exceeded.
    #[error(transparent)]
    Budget(#[from] BudgetExceeded),
}

/// Errors from the agent loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// Provider call failed after retries.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Context assembly failed for every source.
    #[error("context build failed: {0}")]
    ContextBuild(String),
    /// The iteration budget was exhausted.
    #[error("max iterations exceeded ({0})")]
    MaxIterationsExceeded(usize),
    /// Delegation failed.
    #[error("delegation error: {0}")]
    Delegation(#[from] DelegationError),
    /// Event dispatch failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    /// The loop was cancelled via its token.
    #[error("cancelled")]
    Cancelled,
}

/// Errors from the fractal orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    /// `subtasks` was empty.
    #[error("subtasks non-empty required")]
    EmptySubtasks,
    /// The delegation request was malformed.
    #[error("invalid delegation request: {0}")]
    InvalidRequest(String),
    /// More subtasks than the concurrency ceiling allows.
    #[error("too many subtasks: {given} > max {max}")]
    TooManySubtasks {
        /// Number of requested subtasks.
        given: usize,
        /// The configured ceiling.
        max: usize,
    },
    /// Delegating would exceed the recursion depth limit.
    #[error("recursion depth {depth} reached limit {max}")]
    DepthExceeded {
        /// Current delegation depth.
        depth: usize,
        /// The configured limit.
        max: usize,
    },
    /// A child failed with a non-recoverable error; partial results are
    /// preserved in the message.
    #[error("child '{child}' failed: {message}")]
    ChildFailed {
        /// Node id of the failed child.
        child: String,
        /// The child's failure, plus any partial results collected.
        message: String,
    },
}

/// Structured context attached to terminal task failures.
///
/// Carried in the failed task's `error` field and the `node.complete`
/// event payload. Stack-level detail stays in telemetry — it would only
/// pollute the model's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    /// Error kind name from the taxonomy (e.g. `MaxIterationsExceeded`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// The agent the failure originated in.
    pub agent_id: String,
    /// The loop iteration at failure time.
    pub iteration: usize,
    /// The originating component (e.g. `agent_loop`, `orchestrator`).
    pub component: String,
    /// A short hint for the operator.
    pub suggested_fix: String,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (agent={}, iteration={}, component={}; {})",
            self.kind, self.message, self.agent_id, self.iteration, self.component,
            self.suggested_fix
        )
    }
}
