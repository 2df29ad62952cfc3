//! The tool router: permission check, argument parsing, and dispatch to
//! the right executor family.

use std::sync::Arc;

use fractal_bus::EventBus;
use fractal_memory::AgentMemory;
use fractal_types::{ToolDefinition, ToolError};
use tokio::sync::Mutex;

use crate::builtin;
use crate::dynamic::DynamicToolExecutor;
use crate::registry::ToolRegistry;
use crate::sandbox::SandboxManager;

/// Policy consulted before any tool executes.
pub trait ToolPolicy: Send + Sync {
    /// `Ok` to allow; `Err(reason)` to deny.
    fn allowed(
        &self,
        tool_name: &str,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), String>;
}

/// Routes `(tool_name, tool_args)` to the correct executor family, in a
/// fixed precedence order: dynamic tool creation, created dynamic tools,
/// the built-in unified tools, sandboxed tools, then the registry.
///
/// Logic-level executor failures come back as `"error: ..."` observation
/// strings for the model; only [`ToolError::PermissionDenied`] and the
/// [`ToolError::TaskComplete`] control-flow signal propagate as errors.
#[derive(Clone)]
pub struct ToolRouter {
    registry: ToolRegistry,
    policy: Option<Arc<dyn ToolPolicy>>,
    dynamic: Option<Arc<DynamicToolExecutor>>,
    sandbox: Option<Arc<SandboxManager>>,
    memory: Option<Arc<Mutex<AgentMemory>>>,
    bus: Option<Arc<EventBus>>,
}

impl ToolRouter {
    /// Create a router over a registry.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            policy: None,
            dynamic: None,
            sandbox: None,
            memory: None,
            bus: None,
        }
    }

    /// Attach a permission policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ToolPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Attach the dynamic-tool executor (enables `create_tool`).
    #[must_use]
    pub fn with_dynamic(mut self, dynamic: Arc<DynamicToolExecutor>) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    /// Attach a sandbox manager.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: Arc<SandboxManager>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Attach the agent's memory (enables the unified memory tools).
    #[must_use]
    pub fn with_memory(mut self, memory: Arc<Mutex<AgentMemory>>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach the event bus (enables `query_events`).
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The registry behind this router.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// A mutable handle to the registry.
    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// Replace the registry, keeping every attachment. Used to derive a
    /// child router with a filtered tool set.
    #[must_use]
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Every tool definition visible through this router.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs = self.registry.definitions();
        if let Some(dynamic) = &self.dynamic {
            defs.push(DynamicToolExecutor::create_tool_definition());
            defs.extend(dynamic.definitions());
        }
        if self.memory.is_some() || self.bus.is_some() {
            for def in builtin::unified_definitions() {
                let wants_memory = def.name != "query_events";
                if wants_memory && self.memory.is_some() {
                    defs.push(def);
                } else if !wants_memory && self.bus.is_some() {
                    defs.push(def);
                }
            }
        }
        if let Some(sandbox) = &self.sandbox {
            defs.extend(sandbox.definitions());
        }
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs.dedup_by(|a, b| a.name == b.name);
        defs
    }

    /// Parse tool arguments: a structured object passes through, a JSON
    /// string is parsed, anything else yields an empty map.
    #[must_use]
    pub fn parse_args(raw: &serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match raw {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::String(text) => serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default(),
            _ => serde_json::Map::new(),
        }
    }

    /// Route and execute a tool call.
    ///
    /// # Errors
    ///
    /// [`ToolError::PermissionDenied`] when the policy denies the call;
    /// [`ToolError::TaskComplete`] when the `done` tool fires. All other
    /// failures are folded into `"error: ..."` observation strings.
    pub async fn route(
        &self,
        tool_name: &str,
        tool_args: &serde_json::Value,
    ) -> Result<String, ToolError> {
        let args = Self::parse_args(tool_args);

        if let Some(policy) = &self.policy {
            if let Err(reason) = policy.allowed(tool_name, &args) {
                return Err(ToolError::PermissionDenied {
                    tool: tool_name.to_string(),
                    reason,
                });
            }
        }

        // Dynamic tool creation.
        if tool_name == "create_tool" {
            if let Some(dynamic) = &self.dynamic {
                let name = args
                    .get("tool_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let description = args
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let parameters = args
                    .get("parameters")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                let implementation = args
                    .get("implementation")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                return Ok(observation(dynamic.create_tool(
                    name,
                    description,
                    parameters,
                    implementation,
                )));
            }
        }

        // Previously created dynamic tools.
        if let Some(dynamic) = &self.dynamic {
            if dynamic.contains(tool_name) {
                return Ok(observation(dynamic.execute(tool_name, &args).await));
            }
        }

        // Built-in unified tools.
        match tool_name {
            "query" => {
                if let Some(memory) = &self.memory {
                    let mut memory = memory.lock().await;
                    return Ok(observation(builtin::execute_query(&args, &mut memory).await));
                }
            }
            "browse_memory" => {
                if let Some(memory) = &self.memory {
                    let mut memory = memory.lock().await;
                    return Ok(observation(builtin::execute_browse(&args, &mut memory).await));
                }
            }
            "manage_memory" => {
                if let Some(memory) = &self.memory {
                    let mut memory = memory.lock().await;
                    return Ok(observation(builtin::execute_manage(&args, &mut memory).await));
                }
            }
            "query_events" => {
                if let Some(bus) = &self.bus {
                    return Ok(observation(builtin::execute_query_events(&args, bus)));
                }
            }
            _ => {}
        }

        // Sandboxed tools.
        if let Some(sandbox) = &self.sandbox {
            if sandbox.contains(tool_name) {
                return Ok(observation(sandbox.execute(tool_name, &args).await));
            }
        }

        // Registry tools.
        match self.registry.executor(tool_name) {
            Some(executor) => match executor.execute(args).await {
                Ok(result) => Ok(result),
                Err(err @ ToolError::TaskComplete { .. }) => Err(err),
                Err(err) => {
                    tracing::debug!(tool = tool_name, error = %err, "tool execution failed");
                    Ok(format!("error: {err}"))
                }
            },
            None => Ok(format!("error: {}", self.registry.not_found(tool_name))),
        }
    }
}

/// Fold a tool result into the observation string handed to the model.
fn observation(result: Result<String, ToolError>) -> String {
    match result {
        Ok(text) => text,
        Err(err) => format!("error: {err}"),
    }
}
