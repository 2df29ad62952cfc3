//! Loop configuration.

use std::time::Duration;

/// Retry policy for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub base: f64,
    /// Upper bound on the delay.
    pub cap: Duration,
    /// Total attempts, the first call included.
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            base: 2.0,
            cap: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

/// Per-agent loop configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum reason/act iterations per task.
    pub max_iterations: usize,
    /// When true, only an explicit `done` call completes the task; a
    /// text-only response earns a reminder instead.
    pub require_done_tool: bool,
    /// The model's context window, in tokens.
    pub context_window: usize,
    /// Fraction of the window reserved for the model's output.
    pub output_reserve: f64,
    /// How many recent L1 messages the context builder considers.
    pub recent_limit: usize,
    /// Cap on output tokens per provider call, forwarded to the model.
    pub max_output_tokens: Option<usize>,
    /// Retry policy for the provider edge.
    pub retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            require_done_tool: false,
            context_window: 128_000,
            output_reserve: 0.25,
            recent_limit: 20,
            max_output_tokens: None,
            retry: RetryConfig::default(),
        }
    }
}

impl AgentConfig {
    /// The token budget available for input context.
    #[must_use]
    pub fn context_budget(&self) -> usize {
        let reserve = self.output_reserve.clamp(0.0, 0.95);
        (self.context_window as f64 * (1.0 - reserve)) as usize
    }

    /// Set the iteration ceiling.
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Require the explicit `done` tool for completion.
    #[must_use]
    pub fn with_require_done_tool(mut self, require: bool) -> Self {
        self.require_done_tool = require;
        self
    }
}
