//! The agent: a bounded reason/act loop over a streaming provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fractal_bus::{DispatchOutcome, Dispatcher};
use fractal_memory::AgentMemory;
use fractal_token::TokenCounter;
use fractal_tool::{builtin, ToolRouter, DELEGATE_TOOL, DONE_TOOL};
use fractal_types::{
    ChatParams, ChatRequest, DelegationError, DispatchError, Event, FailureReport, LoopError,
    MessageItem, Provider, ProviderError, StreamChunk, Task, TaskStatus, TokenUsage, ToolError,
};
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{AggregatedCall, ToolCallAggregator};
use crate::config::AgentConfig;
use crate::context::build_context;
use crate::retry::with_retry;

/// Reminder injected when `require_done_tool` is set and the model
/// answered with bare text.
pub const DONE_REMINDER: &str = "Call `done` with your final answer to complete the task.";

/// Per-agent execution counters.
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    /// Tasks this agent has processed.
    pub execution_count: u64,
    /// Tasks that completed successfully.
    pub success_count: u64,
    /// Total input tokens consumed.
    pub tokens_in: u64,
    /// Total output tokens generated.
    pub tokens_out: u64,
}

/// The terminal outcome of one task execution.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Terminal status (always `Completed` on the `Ok` path).
    pub status: TaskStatus,
    /// The completion message or final text.
    pub response: String,
    /// Structured output passed via `done`, if any.
    pub output: Option<serde_json::Value>,
    /// Iterations consumed.
    pub iterations: usize,
    /// Token usage across all iterations.
    pub usage: TokenUsage,
}

/// Everything the orchestrator needs to spawn children for a parent.
pub struct DelegationContext {
    /// The delegating agent's node id.
    pub parent_id: String,
    /// The delegating agent's depth in the tree.
    pub depth: usize,
    /// Session carried into the children.
    pub session_id: Option<String>,
    /// The task being delegated.
    pub task: Task,
    /// The parent's router; children inherit a filtered view of its
    /// registry.
    pub router: ToolRouter,
}

/// Handles `delegate_subtasks` on behalf of the loop. Implemented by the
/// fractal orchestrator.
#[async_trait]
pub trait DelegationHandler: Send + Sync {
    /// Run the delegation synchronously and return the synthesized
    /// result text.
    async fn delegate(
        &self,
        ctx: DelegationContext,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, DelegationError>;
}

struct StreamTurn {
    text: String,
    calls: Vec<AggregatedCall>,
    usage: Option<TokenUsage>,
}

/// A node in the fractal: one agent with its own memory, tools, and
/// reason/act loop. Processes exactly one task at a time.
pub struct Agent {
    node_id: String,
    role: String,
    system_prompt: String,
    provider: Arc<dyn Provider>,
    router: ToolRouter,
    memory: Arc<Mutex<AgentMemory>>,
    dispatcher: Arc<Dispatcher>,
    counter: Arc<dyn TokenCounter>,
    config: AgentConfig,
    depth: usize,
    stats: AgentStats,
    delegation: Option<Arc<dyn DelegationHandler>>,
}

impl Agent {
    /// Start building an agent.
    #[must_use]
    pub fn builder(
        node_id: impl Into<String>,
        provider: Arc<dyn Provider>,
        dispatcher: Arc<Dispatcher>,
        memory: AgentMemory,
        counter: Arc<dyn TokenCounter>,
    ) -> AgentBuilder {
        AgentBuilder {
            node_id: node_id.into(),
            role: "Assistant".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            provider,
            dispatcher,
            memory,
            counter,
            router: None,
            config: AgentConfig::default(),
            depth: 0,
            delegation: None,
        }
    }

    /// The agent's node id.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The agent's role label.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The agent's delegation depth (0 at the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Execution counters.
    #[must_use]
    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// The router (tool set) in force.
    #[must_use]
    pub fn router(&self) -> &ToolRouter {
        &self.router
    }

    /// Shared handle to this agent's memory.
    #[must_use]
    pub fn memory(&self) -> Arc<Mutex<AgentMemory>> {
        self.memory.clone()
    }

    fn source_uri(&self) -> String {
        format!("/agent/{}", self.node_id)
    }

    /// Process one task to a terminal state.
    ///
    /// Records the incoming task in L1, then iterates: build context,
    /// stream the provider, aggregate and execute tool calls, and
    /// terminate on `done`, bare text (unless `require_done_tool`), or
    /// the iteration budget.
    ///
    /// # Errors
    ///
    /// [`LoopError::MaxIterationsExceeded`] when the budget runs out
    /// (memory is preserved), [`LoopError::Provider`] after retries are
    /// exhausted, [`LoopError::Cancelled`] on cooperative cancellation.
    pub async fn execute(
        &mut self,
        mut task: Task,
        cancellation: &CancellationToken,
    ) -> Result<TaskResult, LoopError> {
        self.stats.execution_count += 1;
        task.status = TaskStatus::Running;

        let content = task
            .parameters
            .get("content")
            .or_else(|| task.parameters.get("task"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| task.text_form());
        {
            let mut memory = self.memory.lock().await;
            memory.update_task(task.clone());
            memory.add_message_with(
                MessageItem::user(&content),
                task.session_id.as_deref(),
                Some(&task.task_id),
                Some(task.metadata.importance),
            );
        }

        let mut iterations = 0usize;
        let mut usage = TokenUsage::default();
        let outcome = self
            .run_loop(&task, &content, cancellation, &mut iterations, &mut usage)
            .await;
        self.stats.tokens_in += usage.input_tokens as u64;
        self.stats.tokens_out += usage.output_tokens as u64;

        match outcome {
            Ok((response, output)) => {
                self.stats.success_count += 1;
                task.status = TaskStatus::Completed;
                task.result = Some(json!({"message": response, "output": output}));
                self.memory.lock().await.update_task(task.clone());
                self.publish_complete(&task, &usage, None).await;
                Ok(TaskResult {
                    status: TaskStatus::Completed,
                    response,
                    output,
                    iterations,
                    usage,
                })
            }
            Err(err) => {
                let report = self.failure_report(&err, iterations);
                task.status = TaskStatus::Failed;
                task.error = Some(report.to_string());
                self.memory.lock().await.update_task(task.clone());
                self.publish_complete(&task, &usage, Some(&report)).await;
                Err(err)
            }
        }
    }

    async fn run_loop(
        &mut self,
        task: &Task,
        content: &str,
        cancellation: &CancellationToken,
        iterations: &mut usize,
        usage: &mut TokenUsage,
    ) -> Result<(String, Option<serde_json::Value>), LoopError> {
        let session = task.session_id.clone();
        loop {
            if cancellation.is_cancelled() {
                return Err(LoopError::Cancelled);
            }
            if *iterations >= self.config.max_iterations {
                return Err(LoopError::MaxIterationsExceeded(self.config.max_iterations));
            }
            *iterations += 1;

            // Build the message list and gate the provider call on the
            // interceptor chain (budget, adaptive, ...).
            let messages = {
                let mut memory = self.memory.lock().await;
                build_context(
                    &mut memory,
                    &self.system_prompt,
                    session.as_deref(),
                    Some(content),
                    self.config.context_budget(),
                    self.config.recent_limit,
                )
                .await
            };
            let estimated: usize = messages
                .iter()
                .map(|m| {
                    if m.token_count > 0 {
                        m.token_count
                    } else {
                        self.counter.count_message(&m.content)
                    }
                })
                .sum();
            let gate = Event::new(self.source_uri(), "provider.request", json!({
                "task_id": task.task_id,
                "iteration": *iterations,
            }))
            .with_extension("estimated_tokens", json!(estimated as u64));
            match self.dispatcher.dispatch(gate).await {
                Ok(DispatchOutcome::Delivered) => {}
                Ok(DispatchOutcome::Blocked { by }) => {
                    return Err(LoopError::Dispatch(DispatchError::Interceptor {
                        interceptor: by,
                        message: "provider request blocked".into(),
                    }));
                }
                Err(err) => return Err(LoopError::Dispatch(err)),
            }

            let request = ChatRequest {
                messages,
                tools: self.router.definitions(),
                params: ChatParams {
                    max_tokens: self.config.max_output_tokens,
                    temperature: None,
                },
            };
            let turn = with_retry(&self.config.retry, || {
                self.stream_turn(request.clone(), task)
            })
            .await?;

            if let Some(turn_usage) = &turn.usage {
                usage.input_tokens += turn_usage.input_tokens;
                usage.output_tokens += turn_usage.output_tokens;
            }

            // Record the assistant message, even when the text is empty
            // but tool calls are present.
            if !turn.text.is_empty() || !turn.calls.is_empty() {
                let mut memory = self.memory.lock().await;
                memory.add_message_with(
                    MessageItem::assistant(&turn.text),
                    session.as_deref(),
                    Some(&task.task_id),
                    None,
                );
            }

            if turn.calls.is_empty() {
                if !self.config.require_done_tool {
                    return Ok((turn.text, None));
                }
                tracing::debug!(agent = %self.node_id, "text-only turn, reminding about done");
                let mut memory = self.memory.lock().await;
                memory.add_message_with(
                    MessageItem::user(DONE_REMINDER),
                    session.as_deref(),
                    Some(&task.task_id),
                    None,
                );
                continue;
            }

            // Execute tool calls sequentially, in stream order.
            for call in turn.calls {
                if cancellation.is_cancelled() {
                    return Err(LoopError::Cancelled);
                }
                match call {
                    AggregatedCall::Invalid { id, name, error } => {
                        tracing::debug!(tool = %name, error = %error, "invalid tool arguments");
                        self.record_tool_result(
                            task,
                            &id,
                            &name,
                            &format!("error: invalid tool arguments: {error}"),
                        )
                        .await;
                    }
                    AggregatedCall::Call(call) => {
                        if call.name == DONE_TOOL {
                            let args = ToolRouter::parse_args(&call.arguments);
                            let message = args
                                .get("message")
                                .and_then(|v| v.as_str())
                                .unwrap_or("Task completed")
                                .to_string();
                            let output = args.get("output").cloned();
                            self.record_tool_result(
                                task,
                                &call.id,
                                DONE_TOOL,
                                &format!("Task completed: {message}"),
                            )
                            .await;
                            return Ok((message, output));
                        }

                        let is_delegate =
                            call.name == DELEGATE_TOOL || call.name == "delegate_task";
                        if is_delegate
                            && self.router.registry().contains(DELEGATE_TOOL)
                            && let Some(handler) = self.delegation.clone()
                        {
                            let ctx = DelegationContext {
                                parent_id: self.node_id.clone(),
                                depth: self.depth,
                                session_id: session.clone(),
                                task: task.clone(),
                                router: self.router.clone(),
                            };
                            let args = ToolRouter::parse_args(&call.arguments);
                            let observation = match handler.delegate(ctx, args).await {
                                Ok(result) => result,
                                Err(err) => format!("error: {err}"),
                            };
                            self.record_tool_result(task, &call.id, DELEGATE_TOOL, &observation)
                                .await;
                            continue;
                        }

                        let observation =
                            match self.router.route(&call.name, &call.arguments).await {
                                Ok(observation) => observation,
                                Err(ToolError::TaskComplete { message, output }) => {
                                    self.record_tool_result(
                                        task,
                                        &call.id,
                                        &call.name,
                                        &format!("Task completed: {message}"),
                                    )
                                    .await;
                                    return Ok((message, output));
                                }
                                // Surfaced to the model as an observation;
                                // the loop continues.
                                Err(err @ ToolError::PermissionDenied { .. }) => {
                                    format!("error: {err}")
                                }
                                Err(err) => format!("error: {err}"),
                            };
                        self.record_tool_result(task, &call.id, &call.name, &observation)
                            .await;
                    }
                }
            }

            // Async memory upkeep between iterations.
            if let Err(err) = self.memory.lock().await.maintain().await {
                tracing::warn!(agent = %self.node_id, error = %err, "memory maintenance failed");
            }
        }
    }

    /// One streaming provider call: forward chunks to the bus, aggregate
    /// tool calls, collect usage.
    async fn stream_turn(
        &self,
        request: ChatRequest,
        task: &Task,
    ) -> Result<StreamTurn, ProviderError> {
        let mut stream = self.provider.stream_chat(request).await?;
        let mut aggregator = ToolCallAggregator::new();
        let mut text = String::new();
        let mut usage = None;

        while let Some(chunk) = stream.next().await {
            match &chunk {
                StreamChunk::Text { content } => {
                    text.push_str(content);
                    self.publish_chunk(
                        "node.thinking",
                        json!({"task_id": task.task_id, "content": content}),
                    )
                    .await;
                }
                StreamChunk::ToolCallStart { id, name, .. } => {
                    self.publish_chunk(
                        "node.tool_call",
                        json!({
                            "task_id": task.task_id,
                            "id": id,
                            "tool": name,
                            "phase": "start",
                        }),
                    )
                    .await;
                }
                StreamChunk::ToolCallComplete { id, name, .. } => {
                    self.publish_chunk(
                        "node.tool_call",
                        json!({
                            "task_id": task.task_id,
                            "id": id,
                            "tool": name,
                            "phase": "complete",
                        }),
                    )
                    .await;
                }
                StreamChunk::Done { usage: u, .. } => {
                    usage = u.clone();
                }
                StreamChunk::Error { kind, message } => {
                    return Err(stream_error(kind, message));
                }
                StreamChunk::ToolCallDelta { .. } => {}
            }
            aggregator.absorb(&chunk);
        }

        Ok(StreamTurn {
            text,
            calls: aggregator.finish(),
            usage,
        })
    }

    async fn publish_chunk(&self, event_type: &str, data: serde_json::Value) {
        let event = Event::new(self.source_uri(), event_type, data);
        if let Err(err) = self.dispatcher.dispatch(event).await {
            tracing::debug!(error = %err, event_type, "chunk dispatch failed");
        }
    }

    async fn record_tool_result(&self, task: &Task, call_id: &str, name: &str, content: &str) {
        let mut memory = self.memory.lock().await;
        memory.add_message_with(
            MessageItem::tool(content, call_id, name),
            task.session_id.as_deref(),
            Some(&task.task_id),
            None,
        );
    }

    async fn publish_complete(
        &self,
        task: &Task,
        usage: &TokenUsage,
        failure: Option<&FailureReport>,
    ) {
        let mut data = json!({
            "task_id": task.task_id,
            "status": task.status.as_str(),
            "result": task.result,
            "token_usage": {
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "total_tokens": usage.total(),
            },
        });
        if let (Some(object), Some(report)) = (data.as_object_mut(), failure) {
            object.insert(
                "error".into(),
                serde_json::to_value(report).unwrap_or_default(),
            );
        }
        let event = Event::new(self.source_uri(), "node.complete", data);
        if let Err(err) = self.dispatcher.dispatch(event).await {
            tracing::debug!(error = %err, "node.complete dispatch failed");
        }
    }

    fn failure_report(&self, err: &LoopError, iteration: usize) -> FailureReport {
        let (kind, suggested_fix) = match err {
            LoopError::MaxIterationsExceeded(_) => (
                "MaxIterationsExceeded",
                "raise max_iterations or simplify the task",
            ),
            LoopError::Provider(_) => (
                "LLMProviderError",
                "check provider connectivity and credentials",
            ),
            LoopError::Dispatch(DispatchError::Budget(_)) => (
                "BudgetExceeded",
                "raise the session token budget or abort",
            ),
            LoopError::Dispatch(_) => ("DispatchError", "inspect the interceptor chain"),
            LoopError::ContextBuild(_) => ("ContextBuildError", "reduce memory budgets"),
            LoopError::Delegation(_) => ("DelegationError", "inspect the subtask specs"),
            LoopError::Cancelled => ("Cancelled", "the caller cancelled the task"),
        };
        FailureReport {
            kind: kind.to_string(),
            message: err.to_string(),
            agent_id: self.node_id.clone(),
            iteration,
            component: "agent_loop".to_string(),
            suggested_fix: suggested_fix.to_string(),
        }
    }
}

fn stream_error(kind: &str, message: &str) -> ProviderError {
    match kind {
        "rate_limit" => ProviderError::RateLimit { retry_after: None },
        "timeout" => ProviderError::Timeout(Duration::from_secs(30)),
        "network" | "connection" | "transient" => ProviderError::Network(message.to_string()),
        _ => ProviderError::Stream(message.to_string()),
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    node_id: String,
    role: String,
    system_prompt: String,
    provider: Arc<dyn Provider>,
    dispatcher: Arc<Dispatcher>,
    memory: AgentMemory,
    counter: Arc<dyn TokenCounter>,
    router: Option<ToolRouter>,
    config: AgentConfig,
    depth: usize,
    delegation: Option<Arc<dyn DelegationHandler>>,
}

impl AgentBuilder {
    /// Set the role label.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the tool router. The agent's memory and bus are attached on
    /// build.
    #[must_use]
    pub fn router(mut self, router: ToolRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Set the loop configuration.
    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the delegation depth (0 at the root).
    #[must_use]
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Attach the delegation handler (the orchestrator).
    #[must_use]
    pub fn delegation(mut self, handler: Arc<dyn DelegationHandler>) -> Self {
        self.delegation = Some(handler);
        self
    }

    /// Build the agent. The `done` tool is always registered; the
    /// agent's memory and the dispatcher's bus are attached to the
    /// router for the unified tools.
    #[must_use]
    pub fn build(self) -> Agent {
        let memory = Arc::new(Mutex::new(self.memory));
        let mut router = self
            .router
            .unwrap_or_else(|| ToolRouter::new(fractal_tool::ToolRegistry::new()));
        if !router.registry().contains(DONE_TOOL) {
            router.registry_mut().register(
                builtin::done_definition(),
                Arc::new(fractal_tool::ExecutorFn(
                    |args: serde_json::Map<String, serde_json::Value>| async move {
                        builtin::execute_done(&args)
                    },
                )),
            );
        }
        if self.delegation.is_some() && !router.registry().contains(DELEGATE_TOOL) {
            router.registry_mut().register(
                builtin::delegate_definition(),
                Arc::new(fractal_tool::ExecutorFn(
                    |_args: serde_json::Map<String, serde_json::Value>| async move {
                        Err::<String, _>(ToolError::ExecutionFailed(
                            "delegation is handled by the agent loop".into(),
                        ))
                    },
                )),
            );
        }
        let router = router
            .with_memory(memory.clone())
            .with_bus(self.dispatcher.bus().clone());
        Agent {
            node_id: self.node_id,
            role: self.role,
            system_prompt: self.system_prompt,
            provider: self.provider,
            router,
            memory,
            dispatcher: self.dispatcher,
            counter: self.counter,
            config: self.config,
            depth: self.depth,
            stats: AgentStats::default(),
            delegation: self.delegation,
        }
    }
}
