//! Dynamic tool creation on a restricted expression runtime.
//!
//! The model may define new tools at runtime via `create_tool`. The
//! implementation is an `evalexpr` expression evaluated in a context
//! that contains only the call's parameters — safe arithmetic, string,
//! and boolean/tuple primitives, no I/O, no imports, no host access.
//! Execution runs under a hard timeout.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use evalexpr::ContextWithMutableVariables;
use fractal_types::{ToolDefinition, ToolError};
use serde_json::json;

/// Default execution timeout for dynamic tools.
pub const DEFAULT_DYNAMIC_TIMEOUT: Duration = Duration::from_secs(30);

/// Substrings rejected in tool implementations. The runtime cannot
/// express these anyway; rejecting them at creation gives the model a
/// clear signal instead of a confusing evaluation error.
const FORBIDDEN: &[&str] = &[
    "import", "eval(", "exec(", "open(", "system(", "subprocess", "__", "file://", "std::fs",
    "include!",
];

#[derive(Clone)]
struct DynamicTool {
    definition: ToolDefinition,
    implementation: String,
}

/// Creates and executes model-defined tools.
pub struct DynamicToolExecutor {
    timeout: Duration,
    created: Mutex<HashMap<String, DynamicTool>>,
}

impl DynamicToolExecutor {
    /// Create an executor with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_DYNAMIC_TIMEOUT)
    }

    /// Create an executor with a custom timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            created: Mutex::new(HashMap::new()),
        }
    }

    /// The definition of the `create_tool` meta-tool itself.
    #[must_use]
    pub fn create_tool_definition() -> ToolDefinition {
        ToolDefinition::sandboxed(
            "create_tool",
            "Define a new tool from an expression over its parameters. \
             The implementation may use arithmetic, comparison, string \
             and boolean operations on the declared parameters.",
            json!({
                "type": "object",
                "properties": {
                    "tool_name": {"type": "string"},
                    "description": {"type": "string"},
                    "parameters": {"type": "object"},
                    "implementation": {"type": "string"}
                },
                "required": ["tool_name", "implementation"]
            }),
        )
    }

    /// Whether a dynamic tool with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.created.lock().expect("dynamic lock poisoned").contains_key(name)
    }

    /// Definitions of all created tools.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let created = self.created.lock().expect("dynamic lock poisoned");
        let mut defs: Vec<ToolDefinition> =
            created.values().map(|t| t.definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate and register a new tool.
    ///
    /// # Errors
    ///
    /// [`ToolError::CreationRejected`] for empty names or forbidden
    /// constructs in the implementation.
    pub fn create_tool(
        &self,
        tool_name: &str,
        description: &str,
        parameters: serde_json::Value,
        implementation: &str,
    ) -> Result<String, ToolError> {
        if tool_name.trim().is_empty() {
            return Err(ToolError::CreationRejected("tool name is empty".into()));
        }
        if implementation.trim().is_empty() {
            return Err(ToolError::CreationRejected("implementation is empty".into()));
        }
        let lowered = implementation.to_lowercase();
        for forbidden in FORBIDDEN {
            if lowered.contains(forbidden) {
                return Err(ToolError::CreationRejected(format!(
                    "implementation contains forbidden construct '{forbidden}'"
                )));
            }
        }
        let definition = ToolDefinition::sandboxed(
            tool_name,
            description,
            if parameters.is_object() {
                parameters
            } else {
                json!({"type": "object", "properties": {}})
            },
        );
        let mut created = self.created.lock().expect("dynamic lock poisoned");
        created.insert(
            tool_name.to_string(),
            DynamicTool {
                definition,
                implementation: implementation.to_string(),
            },
        );
        tracing::info!(tool = tool_name, "dynamic tool created");
        Ok(format!("tool '{tool_name}' created"))
    }

    /// Execute a created tool with the given arguments.
    ///
    /// # Errors
    ///
    /// [`ToolError::NotFound`] for unknown tools, [`ToolError::Timeout`]
    /// past the deadline, [`ToolError::ExecutionFailed`] on evaluation
    /// errors.
    pub async fn execute(
        &self,
        name: &str,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError> {
        let tool = {
            let created = self.created.lock().expect("dynamic lock poisoned");
            created.get(name).cloned()
        };
        let Some(tool) = tool else {
            return Err(ToolError::NotFound {
                name: name.to_string(),
                suggestions: vec![],
            });
        };

        let implementation = tool.implementation;
        let args = args.clone();
        let evaluation = tokio::task::spawn_blocking(move || {
            let mut context: evalexpr::HashMapContext = evalexpr::HashMapContext::new();
            for (key, value) in &args {
                let value = json_to_eval(value);
                context
                    .set_value(key.clone(), value)
                    .map_err(|e| format!("binding '{key}': {e}"))?;
            }
            evalexpr::eval_with_context(&implementation, &context)
                .map_err(|e| format!("evaluation error: {e}"))
        });

        match tokio::time::timeout(self.timeout, evaluation).await {
            Err(_) => Err(ToolError::Timeout(self.timeout)),
            Ok(Err(join_err)) => Err(ToolError::ExecutionFailed(join_err.to_string())),
            Ok(Ok(Err(message))) => Err(ToolError::ExecutionFailed(message)),
            Ok(Ok(Ok(value))) => Ok(eval_to_string(&value)),
        }
    }
}

impl Default for DynamicToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn json_to_eval(value: &serde_json::Value) -> evalexpr::Value {
    use serde_json::Value as Json;
    match value {
        Json::Bool(b) => evalexpr::Value::Boolean(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                evalexpr::Value::Int(i)
            } else {
                evalexpr::Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => evalexpr::Value::String(s.clone()),
        Json::Array(items) => {
            evalexpr::Value::Tuple(items.iter().map(json_to_eval).collect())
        }
        Json::Null => evalexpr::Value::Empty,
        // Objects have no evalexpr form; bind their JSON text.
        Json::Object(_) => evalexpr::Value::String(value.to_string()),
    }
}

fn eval_to_string(value: &evalexpr::Value) -> String {
    match value {
        evalexpr::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn create_and_execute_arithmetic_tool() {
        let dynamic = DynamicToolExecutor::new();
        dynamic
            .create_tool("double", "doubles x", json!({}), "x * 2")
            .unwrap();
        assert!(dynamic.contains("double"));
        let out = dynamic.execute("double", &args(&[("x", json!(21))])).await.unwrap();
        assert_eq!(out, "42");
    }

    #[tokio::test]
    async fn string_tools_work() {
        let dynamic = DynamicToolExecutor::new();
        dynamic
            .create_tool("greet", "greets", json!({}), "\"hello, \" + name")
            .unwrap();
        let out = dynamic
            .execute("greet", &args(&[("name", json!("world"))]))
            .await
            .unwrap();
        assert_eq!(out, "hello, world");
    }

    #[test]
    fn forbidden_constructs_are_rejected() {
        let dynamic = DynamicToolExecutor::new();
        for implementation in [
            "import os",
            "eval(x)",
            "exec(code)",
            "open(\"/etc/passwd\")",
            "x__class",
        ] {
            let err = dynamic
                .create_tool("bad", "", json!({}), implementation)
                .unwrap_err();
            assert!(matches!(err, ToolError::CreationRejected(_)), "{implementation}");
        }
        assert!(!dynamic.contains("bad"));
    }

    #[test]
    fn empty_name_is_rejected() {
        let dynamic = DynamicToolExecutor::new();
        assert!(matches!(
            dynamic.create_tool(" ", "", json!({}), "1 + 1"),
            Err(ToolError::CreationRejected(_))
        ));
    }

    #[tokio::test]
    async fn evaluation_errors_surface_as_execution_failures() {
        let dynamic = DynamicToolExecutor::new();
        dynamic
            .create_tool("broken", "", json!({}), "x +")
            .unwrap();
        let err = dynamic.execute("broken", &args(&[("x", json!(1))])).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let dynamic = DynamicToolExecutor::new();
        let err = dynamic.execute("ghost", &args(&[])).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }
}
