//! One-stop assembly of fully wired agents.

use std::sync::Arc;

use fractal_bus::Dispatcher;
use fractal_loop::{Agent, AgentConfig};
use fractal_memory::{AgentMemory, MemoryConfig, MemoryVectorStore};
use fractal_orch::{FractalOrchestrator, OrchestratorConfig};
use fractal_token::{BpeCounter, TokenCounter};
use fractal_tool::{DynamicToolExecutor, SandboxDescriptor, SandboxManager, ToolRegistry, ToolRouter};
use fractal_types::{Embedder, Provider};

/// Builds agents with a consistent provider, dispatcher, memory
/// configuration, and orchestrator.
///
/// Every agent the factory creates shares the dispatcher (and therefore
/// the bus and interceptor chain) and the delegation orchestrator, but
/// owns its memory exclusively.
pub struct AgentFactory {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<Dispatcher>,
    counter: Arc<dyn TokenCounter>,
    embedder: Option<Arc<dyn Embedder>>,
    memory_config: MemoryConfig,
    agent_config: AgentConfig,
    orchestrator: FractalOrchestrator,
    sandbox: Option<Arc<SandboxManager>>,
    dynamic_tools: bool,
}

impl AgentFactory {
    /// Create a factory with default configuration and the exact BPE
    /// token counter.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, dispatcher: Arc<Dispatcher>) -> Self {
        let counter: Arc<dyn TokenCounter> = Arc::new(BpeCounter::new());
        let orchestrator =
            FractalOrchestrator::new(provider.clone(), dispatcher.clone(), counter.clone());
        Self {
            provider,
            dispatcher,
            counter,
            embedder: None,
            memory_config: MemoryConfig::default(),
            agent_config: AgentConfig::default(),
            orchestrator,
            sandbox: None,
            dynamic_tools: false,
        }
    }

    /// Use a different token counter (e.g. the estimator, in tests).
    ///
    /// Rebuilds the orchestrator, so call this before
    /// [`with_orchestrator_config`](Self::with_orchestrator_config).
    #[must_use]
    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter.clone();
        self.orchestrator = FractalOrchestrator::new(
            self.provider.clone(),
            self.dispatcher.clone(),
            counter,
        )
        .with_memory_config(self.memory_config.clone());
        self
    }

    /// Attach an embedder; agents get an L4 vector tier sized to its
    /// dimension.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the memory configuration for new agents.
    #[must_use]
    pub fn with_memory_config(mut self, config: MemoryConfig) -> Self {
        self.memory_config = config.clone();
        self.orchestrator = self.orchestrator.with_memory_config(config);
        self
    }

    /// Set the loop configuration for new agents.
    #[must_use]
    pub fn with_agent_config(mut self, config: AgentConfig) -> Self {
        self.agent_config = config;
        self
    }

    /// Set the orchestrator limits.
    #[must_use]
    pub fn with_orchestrator_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator = self.orchestrator.with_config(config);
        self
    }

    /// Give agents sandboxed file tools under the descriptor.
    #[must_use]
    pub fn with_sandbox(mut self, descriptor: SandboxDescriptor) -> Self {
        self.sandbox = Some(Arc::new(SandboxManager::new(descriptor)));
        self
    }

    /// Enable dynamic tool creation (`create_tool`).
    #[must_use]
    pub fn with_dynamic_tools(mut self) -> Self {
        self.dynamic_tools = true;
        self
    }

    /// Build a root agent with the given identity and extra tools.
    ///
    /// The agent always carries the `done` tool and the delegation
    /// handler; the unified memory/event tools attach automatically.
    #[must_use]
    pub fn create_agent(
        &self,
        node_id: &str,
        role: &str,
        system_prompt: &str,
        tools: ToolRegistry,
    ) -> Agent {
        let mut memory = AgentMemory::new(node_id, self.memory_config.clone(), self.counter.clone());
        if let Some(embedder) = &self.embedder {
            let store = Arc::new(MemoryVectorStore::new(embedder.dimension()));
            memory = memory.with_vector_tier(store, embedder.clone());
        }

        let mut router = ToolRouter::new(tools);
        if let Some(sandbox) = &self.sandbox {
            router = router.with_sandbox(sandbox.clone());
        }
        if self.dynamic_tools {
            router = router.with_dynamic(Arc::new(DynamicToolExecutor::new()));
        }

        Agent::builder(
            node_id,
            self.provider.clone(),
            self.dispatcher.clone(),
            memory,
            self.counter.clone(),
        )
        .role(role)
        .system_prompt(system_prompt)
        .router(router)
        .config(self.agent_config.clone())
        .depth(0)
        .delegation(Arc::new(self.orchestrator.clone()))
        .build()
    }
}
