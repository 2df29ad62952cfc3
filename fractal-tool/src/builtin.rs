//! Built-in tools: the `done` termination signal, delegation definitions,
//! and the unified memory/event introspection tools.

use fractal_bus::EventBus;
use fractal_memory::AgentMemory;
use fractal_types::{EventQuery, ToolDefinition, ToolError};
use serde_json::json;

/// Name of the explicit termination tool.
pub const DONE_TOOL: &str = "done";

/// Name of the delegation tool handled by the orchestrator.
pub const DELEGATE_TOOL: &str = "delegate_subtasks";

/// Definition of the `done` tool.
#[must_use]
pub fn done_definition() -> ToolDefinition {
    ToolDefinition::system(
        DONE_TOOL,
        "Signal task completion. IMPORTANT: first output your full response \
         as text, then call this tool with a brief summary. Do NOT put your \
         full response in the message parameter - the message should only be \
         a short summary (1-2 sentences).",
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Brief summary (1-2 sentences) of what was accomplished."
                },
                "output": {
                    "type": "object",
                    "description": "Optional structured data to pass to downstream nodes."
                }
            },
            "required": ["message"]
        }),
    )
}

/// Execute the `done` tool: always signals completion.
///
/// # Errors
///
/// Always returns [`ToolError::TaskComplete`] — the loop's termination
/// signal, not a failure.
pub fn execute_done(args: &serde_json::Map<String, serde_json::Value>) -> Result<String, ToolError> {
    let message = args
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("Task completed")
        .to_string();
    let output = args.get("output").cloned();
    Err(ToolError::TaskComplete { message, output })
}

/// Definition of the `delegate_subtasks` tool. Execution is handled by
/// the agent loop handing off to the orchestrator, never by a plain
/// executor.
#[must_use]
pub fn delegate_definition() -> ToolDefinition {
    ToolDefinition::system(
        DELEGATE_TOOL,
        "Split the current task into subtasks executed by child agents, \
         then synthesize their results.",
        json!({
            "type": "object",
            "properties": {
                "subtasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "description": {"type": "string"},
                            "role": {"type": "string"},
                            "tools": {"type": "array", "items": {"type": "string"}},
                            "max_tokens": {"type": "integer"}
                        },
                        "required": ["description"]
                    }
                },
                "execution_mode": {"type": "string", "enum": ["sequential", "parallel"]},
                "synthesis_strategy": {
                    "type": "string",
                    "enum": ["concatenate", "structured", "llm", "auto"]
                }
            },
            "required": ["subtasks"]
        }),
    )
}

/// Definitions of the unified memory/event tools.
#[must_use]
pub fn unified_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::system(
            "query",
            "Retrieve relevant context from memory across all tiers.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer"},
                    "session_id": {"type": "string"}
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::system(
            "browse_memory",
            "Inspect a memory tier: recent messages, the working set, or summaries.",
            json!({
                "type": "object",
                "properties": {
                    "tier": {"type": "string", "enum": ["recent", "working", "summaries", "stats"]},
                    "limit": {"type": "integer"},
                    "session_id": {"type": "string"}
                },
                "required": ["tier"]
            }),
        ),
        ToolDefinition::system(
            "manage_memory",
            "Mutate memory: remove a task or clear everything.",
            json!({
                "type": "object",
                "properties": {
                    "op": {"type": "string", "enum": ["remove_task", "clear"]},
                    "task_id": {"type": "string"}
                },
                "required": ["op"]
            }),
        ),
        ToolDefinition::system(
            "query_events",
            "Query the most recent events on the bus.",
            json!({
                "type": "object",
                "properties": {
                    "event_type": {"type": "string"},
                    "source": {"type": "string"},
                    "target": {"type": "string"},
                    "task_id": {"type": "string"},
                    "limit": {"type": "integer"}
                },
                "required": []
            }),
        ),
    ]
}

fn arg_str<'a>(
    args: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

fn arg_limit(args: &serde_json::Map<String, serde_json::Value>, default: usize) -> usize {
    args.get("limit")
        .and_then(serde_json::Value::as_u64)
        .map_or(default, |v| v as usize)
}

/// Execute the cross-tier `query` tool.
pub async fn execute_query(
    args: &serde_json::Map<String, serde_json::Value>,
    memory: &mut AgentMemory,
) -> Result<String, ToolError> {
    let query = arg_str(args, "query")
        .ok_or_else(|| ToolError::InvalidInput("query is required".into()))?;
    let limit = arg_limit(args, 5);
    let session = arg_str(args, "session_id");
    let hits = memory.semantic_search(query, limit, session).await;
    if hits.is_empty() {
        return Ok("no matching context found".to_string());
    }
    let rendered: Vec<serde_json::Value> = hits
        .iter()
        .map(|s| {
            json!({
                "task_id": s.task_id,
                "action": s.action,
                "summary": s.param_summary,
                "result": s.result_summary,
                "tags": s.tags,
                "importance": s.importance,
            })
        })
        .collect();
    Ok(serde_json::to_string(&rendered).unwrap_or_default())
}

/// Execute the `browse_memory` tool.
pub async fn execute_browse(
    args: &serde_json::Map<String, serde_json::Value>,
    memory: &mut AgentMemory,
) -> Result<String, ToolError> {
    let tier = arg_str(args, "tier").unwrap_or("stats");
    let limit = arg_limit(args, 10);
    let session = arg_str(args, "session_id");
    let rendered = match tier {
        "recent" => {
            let items = memory.recent(limit, session);
            json!(items
                .iter()
                .map(|m| json!({"role": format!("{:?}", m.role), "content": m.content}))
                .collect::<Vec<_>>())
        }
        "working" => {
            let entries = memory.important(limit, session);
            json!(entries
                .iter()
                .map(|e| json!({
                    "content": e.content,
                    "importance": e.importance,
                    "tags": e.tags,
                }))
                .collect::<Vec<_>>())
        }
        "summaries" => {
            let summaries = memory.summaries(limit, session);
            json!(summaries
                .iter()
                .map(|s| json!({
                    "task_id": s.task_id,
                    "action": s.action,
                    "summary": s.param_summary,
                }))
                .collect::<Vec<_>>())
        }
        "stats" => serde_json::to_value(memory.stats()).unwrap_or_default(),
        other => {
            return Err(ToolError::InvalidInput(format!("unknown tier '{other}'")));
        }
    };
    Ok(rendered.to_string())
}

/// Execute the `manage_memory` tool.
pub async fn execute_manage(
    args: &serde_json::Map<String, serde_json::Value>,
    memory: &mut AgentMemory,
) -> Result<String, ToolError> {
    match arg_str(args, "op") {
        Some("remove_task") => {
            let task_id = arg_str(args, "task_id")
                .ok_or_else(|| ToolError::InvalidInput("task_id is required".into()))?;
            let removed = memory.remove_task(task_id);
            Ok(json!({"removed": removed}).to_string())
        }
        Some("clear") => {
            memory.clear_all().await;
            Ok(json!({"cleared": true}).to_string())
        }
        Some(other) => Err(ToolError::InvalidInput(format!("unknown op '{other}'"))),
        None => Err(ToolError::InvalidInput("op is required".into())),
    }
}

/// Execute the `query_events` tool against the bus's ring buffer.
pub fn execute_query_events(
    args: &serde_json::Map<String, serde_json::Value>,
    bus: &EventBus,
) -> Result<String, ToolError> {
    let query = EventQuery {
        event_type: arg_str(args, "event_type").map(String::from),
        source: arg_str(args, "source").map(String::from),
        target: arg_str(args, "target").map(String::from),
        task_id: arg_str(args, "task_id").map(String::from),
        limit: arg_limit(args, 20),
    };
    let events = bus.query(&query);
    let rendered: Vec<serde_json::Value> = events
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "type": e.event_type,
                "source": e.source,
                "subject": e.subject,
                "traceparent": e.traceparent,
                "created_at": e.created_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(serde_json::to_string(&rendered).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_signals_completion() {
        let mut args = serde_json::Map::new();
        args.insert("message".into(), json!("all set"));
        args.insert("output".into(), json!({"answer": 42}));
        let err = execute_done(&args).unwrap_err();
        match err {
            ToolError::TaskComplete { message, output } => {
                assert_eq!(message, "all set");
                assert_eq!(output.unwrap()["answer"], 42);
            }
            other => panic!("expected TaskComplete, got {other}"),
        }
    }

    #[test]
    fn done_defaults_its_message() {
        let err = execute_done(&serde_json::Map::new()).unwrap_err();
        assert!(matches!(err, ToolError::TaskComplete { message, .. } if message == "Task completed"));
    }
}
