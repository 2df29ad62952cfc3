//! Child spawning, tool inheritance, and delegation execution.

use std::sync::Arc;

use async_trait::async_trait;
use fractal_bus::Dispatcher;
use fractal_loop::{Agent, AgentConfig, DelegationContext, DelegationHandler};
use fractal_memory::{AgentMemory, MemoryConfig};
use fractal_token::TokenCounter;
use fractal_tool::{ToolRegistry, DELEGATE_TOOL};
use fractal_types::{DelegationError, Provider, Task};
use tokio_util::sync::CancellationToken;

use crate::request::{DelegationRequest, ExecutionMode, SubtaskSpec};
use crate::synthesizer::{structured, synthesize, ChildOutcome};

/// Orchestrator limits and defaults.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum children per delegation.
    pub max_concurrent_children: usize,
    /// Maximum delegation depth; a request at this depth fails fast.
    pub max_recursive_depth: usize,
    /// Iteration budget handed to each child.
    pub child_max_iterations: usize,
    /// Token cap for LLM synthesis.
    pub max_synthesis_tokens: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_children: 8,
            max_recursive_depth: 3,
            child_max_iterations: 8,
            max_synthesis_tokens: 2_000,
        }
    }
}

/// Spawns child agents for `delegate_subtasks`, enforces depth and tool
/// inheritance rules, runs the children, and synthesizes their results.
///
/// Children are torn down when the delegation returns — they live only
/// for the duration of one call.
#[derive(Clone)]
pub struct FractalOrchestrator {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<Dispatcher>,
    counter: Arc<dyn TokenCounter>,
    memory_config: MemoryConfig,
    config: OrchestratorConfig,
}

impl FractalOrchestrator {
    /// Create an orchestrator with default limits.
    #[must_use]
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: Arc<Dispatcher>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            counter,
            memory_config: MemoryConfig::default(),
            config: OrchestratorConfig::default(),
        }
    }

    /// Set the orchestrator limits.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the memory configuration handed to children.
    #[must_use]
    pub fn with_memory_config(mut self, memory_config: MemoryConfig) -> Self {
        self.memory_config = memory_config;
        self
    }

    /// The limits in force.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run a delegation request on behalf of a parent agent.
    ///
    /// # Errors
    ///
    /// Fails fast on validation ([`DelegationError::EmptySubtasks`],
    /// [`DelegationError::TooManySubtasks`],
    /// [`DelegationError::DepthExceeded`]) before any child is created.
    /// Sequential execution stops on the first fatal child failure and
    /// surfaces the partial results in the error.
    pub async fn delegate_request(
        &self,
        ctx: DelegationContext,
        request: DelegationRequest,
    ) -> Result<String, DelegationError> {
        if request.subtasks.is_empty() {
            return Err(DelegationError::EmptySubtasks);
        }
        if request.subtasks.len() > self.config.max_concurrent_children {
            return Err(DelegationError::TooManySubtasks {
                given: request.subtasks.len(),
                max: self.config.max_concurrent_children,
            });
        }
        if ctx.depth >= self.config.max_recursive_depth {
            return Err(DelegationError::DepthExceeded {
                depth: ctx.depth,
                max: self.config.max_recursive_depth,
            });
        }

        tracing::info!(
            parent = %ctx.parent_id,
            subtasks = request.subtasks.len(),
            mode = ?request.execution_mode,
            "delegating"
        );

        let original_task = ctx
            .task
            .parameters
            .get("content")
            .or_else(|| ctx.task.parameters.get("task"))
            .and_then(|v| v.as_str())
            .unwrap_or(&ctx.task.action)
            .to_string();

        let outcomes = match request.execution_mode {
            ExecutionMode::Sequential => self.run_sequential(&ctx, &request.subtasks).await?,
            ExecutionMode::Parallel => self.run_parallel(&ctx, &request.subtasks).await,
        };

        // All children are gone by now; only their outcomes remain.
        Ok(synthesize(
            request.synthesis_strategy,
            &original_task,
            &outcomes,
            Some(&self.provider),
            self.config.max_synthesis_tokens,
        )
        .await)
    }

    /// The child's effective tool set: the parent's registry, intersected
    /// with the spec's allowlist, minus `delegate_subtasks` at the depth
    /// boundary.
    fn inherit_tools(
        &self,
        parent: &ToolRegistry,
        spec: &SubtaskSpec,
        child_depth: usize,
    ) -> ToolRegistry {
        let mut registry = parent.clone();
        if let Some(allowed) = &spec.tools {
            registry = registry.filtered(allowed);
        }
        if child_depth >= self.config.max_recursive_depth {
            registry = registry.without(DELEGATE_TOOL);
        }
        registry
    }

    fn build_child(
        &self,
        ctx: &DelegationContext,
        index: usize,
        spec: &SubtaskSpec,
    ) -> (Agent, Task) {
        let child_depth = ctx.depth + 1;
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let node_id = format!("{}:worker-{}-{}", ctx.parent_id, index, &suffix[..8]);

        let registry = self.inherit_tools(ctx.router.registry(), spec, child_depth);
        let router = ctx.router.clone().with_registry(registry);

        let role = spec.role.clone().unwrap_or_else(|| "Worker".to_string());
        let system_prompt = format!(
            "You are a {role}. Complete the assigned subtask and call `done` \
             with a brief result summary."
        );
        let mut config = AgentConfig::default()
            .with_max_iterations(self.config.child_max_iterations);
        config.max_output_tokens = spec.max_tokens;

        let memory = AgentMemory::new(&node_id, self.memory_config.clone(), self.counter.clone());
        let agent = Agent::builder(
            &node_id,
            self.provider.clone(),
            self.dispatcher.clone(),
            memory,
            self.counter.clone(),
        )
        .role(role)
        .system_prompt(system_prompt)
        .router(router)
        .config(config)
        .depth(child_depth)
        .delegation(Arc::new(self.clone()))
        .build();

        let mut task = Task::new(&ctx.parent_id, "agent.execute")
            .with_target(&node_id)
            .with_parent(ctx.task.task_id.clone())
            .with_parameter("content", serde_json::Value::String(spec.description.clone()));
        if let Some(session) = &ctx.session_id {
            task = task.with_session(session.clone());
        }
        (agent, task)
    }

    async fn run_sequential(
        &self,
        ctx: &DelegationContext,
        subtasks: &[SubtaskSpec],
    ) -> Result<Vec<ChildOutcome>, DelegationError> {
        let mut outcomes: Vec<ChildOutcome> = Vec::with_capacity(subtasks.len());
        for (index, spec) in subtasks.iter().enumerate() {
            let (mut agent, task) = self.build_child(ctx, index, spec);
            let node_id = agent.node_id().to_string();
            match agent.execute(task, &CancellationToken::new()).await {
                Ok(result) => outcomes.push(ChildOutcome {
                    node_id,
                    description: spec.description.clone(),
                    success: true,
                    result: result.response,
                    error: None,
                }),
                Err(err) => {
                    let partial = structured(&outcomes);
                    return Err(DelegationError::ChildFailed {
                        child: node_id,
                        message: format!("{err}\n\nPartial results:\n{partial}"),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    async fn run_parallel(
        &self,
        ctx: &DelegationContext,
        subtasks: &[SubtaskSpec],
    ) -> Vec<ChildOutcome> {
        let children: Vec<(Agent, Task, String)> = subtasks
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let (agent, task) = self.build_child(ctx, index, spec);
                (agent, task, spec.description.clone())
            })
            .collect();

        let child_futures = children.into_iter().map(|(mut agent, task, description)| {
            async move {
                let node_id = agent.node_id().to_string();
                match agent.execute(task, &CancellationToken::new()).await {
                    Ok(result) => ChildOutcome {
                        node_id,
                        description,
                        success: true,
                        result: result.response,
                        error: None,
                    },
                    Err(err) => ChildOutcome {
                        node_id,
                        description,
                        success: false,
                        result: String::new(),
                        error: Some(err.to_string()),
                    },
                }
            }
        });
        futures::future::join_all(child_futures).await
    }
}

#[async_trait]
impl DelegationHandler for FractalOrchestrator {
    async fn delegate(
        &self,
        ctx: DelegationContext,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, DelegationError> {
        let request = DelegationRequest::from_args(&args)?;
        self.delegate_request(ctx, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractal_bus::EventBus;
    use fractal_token::EstimateCounter;
    use fractal_tool::{builtin, ExecutorFn};
    use fractal_types::test_utils::MockProvider;
    use serde_json::json;

    fn orchestrator(max_depth: usize) -> FractalOrchestrator {
        let provider = Arc::new(MockProvider::new(vec![]));
        let bus = Arc::new(EventBus::new());
        let dispatcher = Arc::new(Dispatcher::builder(bus).build());
        FractalOrchestrator::new(provider, dispatcher, Arc::new(EstimateCounter::new()))
            .with_config(OrchestratorConfig {
                max_recursive_depth: max_depth,
                ..OrchestratorConfig::default()
            })
    }

    fn parent_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in ["search", "shell"] {
            registry.register(
                fractal_types::ToolDefinition::system(name, "", json!({"type": "object"})),
                Arc::new(ExecutorFn(
                    |_args: serde_json::Map<String, serde_json::Value>| async move {
                        Ok(String::new())
                    },
                )),
            );
        }
        registry.register(
            builtin::delegate_definition(),
            Arc::new(ExecutorFn(
                |_args: serde_json::Map<String, serde_json::Value>| async move {
                    Ok(String::new())
                },
            )),
        );
        registry
    }

    #[test]
    fn inheritance_intersects_allowlist() {
        let orch = orchestrator(3);
        let spec = SubtaskSpec::new("x").with_tools(vec!["search".into(), "ghost".into()]);
        let registry = orch.inherit_tools(&parent_registry(), &spec, 1);
        assert_eq!(registry.names(), vec!["search"]);
    }

    #[test]
    fn inheritance_keeps_delegate_below_the_boundary() {
        let orch = orchestrator(2);
        let spec = SubtaskSpec::new("x");
        let registry = orch.inherit_tools(&parent_registry(), &spec, 1);
        assert!(registry.contains(DELEGATE_TOOL));
    }

    #[test]
    fn inheritance_strips_delegate_at_the_boundary() {
        let orch = orchestrator(2);
        let spec = SubtaskSpec::new("x");
        let registry = orch.inherit_tools(&parent_registry(), &spec, 2);
        assert!(!registry.contains(DELEGATE_TOOL));
        assert!(registry.contains("search"));
    }
}
