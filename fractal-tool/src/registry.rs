//! The tool registry: name → (definition, executor).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fractal_types::{ToolDefinition, ToolError};

/// An executable tool body. Receives the parsed argument object and
/// returns the observation text handed back to the model.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute with the given arguments.
    async fn execute(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError>;
}

/// Wrap an async closure as a [`ToolExecutor`].
pub struct ExecutorFn<F>(
    /// The wrapped closure.
    pub F,
);

#[async_trait]
impl<F, Fut> ToolExecutor for ExecutorFn<F>
where
    F: Fn(serde_json::Map<String, serde_json::Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<String, ToolError>> + Send,
{
    async fn execute(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError> {
        (self.0)(args).await
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    executor: Arc<dyn ToolExecutor>,
}

/// Registry mapping tool names to their definition and executor.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, definition: ToolDefinition, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                executor,
            },
        );
    }

    /// Remove a tool. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Whether a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Look up a tool's executor.
    #[must_use]
    pub fn executor(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).map(|t| t.executor.clone())
    }

    /// Look up a tool's definition.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// All definitions, sorted by name for deterministic prompts.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A registry containing only the named tools (whitelist
    /// intersection). Unknown names are ignored.
    #[must_use]
    pub fn filtered(&self, allowed: &[String]) -> Self {
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| allowed.contains(name))
            .map(|(name, tool)| {
                (
                    name.clone(),
                    RegisteredTool {
                        definition: tool.definition.clone(),
                        executor: tool.executor.clone(),
                    },
                )
            })
            .collect();
        Self { tools }
    }

    /// A copy of this registry without the named tool.
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        let tools = self
            .tools
            .iter()
            .filter(|(n, _)| n.as_str() != name)
            .map(|(n, tool)| {
                (
                    n.clone(),
                    RegisteredTool {
                        definition: tool.definition.clone(),
                        executor: tool.executor.clone(),
                    },
                )
            })
            .collect();
        Self { tools }
    }

    /// Up to five known names closest to `query`, for "did you mean"
    /// suggestions on [`ToolError::NotFound`].
    #[must_use]
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let query_lower = query.to_lowercase();
        let mut scored: Vec<(usize, &String)> = self
            .tools
            .keys()
            .filter_map(|name| {
                let name_lower = name.to_lowercase();
                let prefix = common_prefix_len(&name_lower, &query_lower);
                let contains =
                    name_lower.contains(&query_lower) || query_lower.contains(&name_lower);
                if prefix >= 2 || contains {
                    Some((prefix + usize::from(contains) * 3, name))
                } else {
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.into_iter().take(5).map(|(_, n)| n.clone()).collect()
    }

    /// The `NotFound` error for a name, with suggestions attached.
    #[must_use]
    pub fn not_found(&self, name: &str) -> ToolError {
        ToolError::NotFound {
            name: name.to_string(),
            suggestions: self.suggestions(name),
        }
    }
}

impl Clone for ToolRegistry {
    fn clone(&self) -> Self {
        let tools = self
            .tools
            .iter()
            .map(|(name, tool)| {
                (
                    name.clone(),
                    RegisteredTool {
                        definition: tool.definition.clone(),
                        executor: tool.executor.clone(),
                    },
                )
            })
            .collect();
        Self { tools }
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool(name: &str) -> (ToolDefinition, Arc<dyn ToolExecutor>) {
        (
            ToolDefinition::system(name, "echoes", json!({"type": "object"})),
            Arc::new(ExecutorFn(|args: serde_json::Map<String, serde_json::Value>| async move {
                Ok(serde_json::Value::Object(args).to_string())
            })),
        )
    }

    #[test]
    fn register_and_look_up() {
        let mut registry = ToolRegistry::new();
        let (def, exec) = echo_tool("echo");
        registry.register(def, exec);
        assert!(registry.contains("echo"));
        assert!(registry.executor("echo").is_some());
        assert!(registry.executor("nope").is_none());
    }

    #[test]
    fn filtered_intersects() {
        let mut registry = ToolRegistry::new();
        for name in ["a", "b", "c"] {
            let (def, exec) = echo_tool(name);
            registry.register(def, exec);
        }
        let filtered = registry.filtered(&["a".into(), "c".into(), "ghost".into()]);
        assert_eq!(filtered.names(), vec!["a", "c"]);
    }

    #[test]
    fn without_removes_one() {
        let mut registry = ToolRegistry::new();
        for name in ["delegate_subtasks", "search"] {
            let (def, exec) = echo_tool(name);
            registry.register(def, exec);
        }
        let trimmed = registry.without("delegate_subtasks");
        assert_eq!(trimmed.names(), vec!["search"]);
    }

    #[test]
    fn suggestions_rank_close_names() {
        let mut registry = ToolRegistry::new();
        for name in ["search", "search_web", "shell", "done", "browse_memory"] {
            let (def, exec) = echo_tool(name);
            registry.register(def, exec);
        }
        let suggestions = registry.suggestions("searc");
        assert!(suggestions.contains(&"search".to_string()));
        assert!(suggestions.len() <= 5);
        assert!(!suggestions.contains(&"done".to_string()));
    }

    #[tokio::test]
    async fn executor_fn_runs() {
        let (_, exec) = echo_tool("echo");
        let mut args = serde_json::Map::new();
        args.insert("x".into(), json!(1));
        let out = exec.execute(args).await.unwrap();
        assert_eq!(out, "{\"x\":1}");
    }
}
