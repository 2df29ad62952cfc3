//! Sandboxed tool execution: a filesystem root, an operation allowlist,
//! and a per-call timeout.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fractal_types::{ToolDefinition, ToolError};
use serde_json::json;

/// Operations a sandbox may permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxOp {
    /// Read file contents.
    Read,
    /// Create or overwrite files.
    Write,
    /// List directory entries.
    List,
    /// Remove files.
    Delete,
}

/// The sandbox boundary handed to sandboxed executors: a root directory,
/// a timeout, and the permitted operations.
#[derive(Debug, Clone)]
pub struct SandboxDescriptor {
    root: PathBuf,
    timeout: Duration,
    allowed_ops: HashSet<SandboxOp>,
}

impl SandboxDescriptor {
    /// Create a descriptor rooted at `root` with a 30-second timeout and
    /// all operations permitted.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(30),
            allowed_ops: [
                SandboxOp::Read,
                SandboxOp::Write,
                SandboxOp::List,
                SandboxOp::Delete,
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Restrict the permitted operations.
    #[must_use]
    pub fn with_ops(mut self, ops: impl IntoIterator<Item = SandboxOp>) -> Self {
        self.allowed_ops = ops.into_iter().collect();
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The sandbox root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether an operation is permitted.
    #[must_use]
    pub fn allows(&self, op: SandboxOp) -> bool {
        self.allowed_ops.contains(&op)
    }

    /// Resolve a path inside the sandbox. Relative paths resolve against
    /// the root; `..` components are normalized lexically before the
    /// containment check, so no traversal sequence can escape.
    ///
    /// # Errors
    ///
    /// [`ToolError::SandboxViolation`] when the normalized path falls
    /// outside the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, ToolError> {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let normalized = normalize(&joined);
        if normalized.starts_with(&self.root) {
            Ok(normalized)
        } else {
            Err(ToolError::SandboxViolation(format!(
                "path '{}' escapes the sandbox root",
                path.display()
            )))
        }
    }
}

/// Lexically normalize a path: resolve `.` and `..` without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Render a result the way sandboxed executors report: a JSON object
/// with a `success` flag, so violations reach the model as data rather
/// than framework errors.
fn structured_error(message: &str) -> String {
    json!({"success": false, "error": message}).to_string()
}

fn structured_ok(value: serde_json::Value) -> String {
    let mut object = json!({"success": true});
    if let (Some(target), Some(extra)) = (object.as_object_mut(), value.as_object()) {
        for (k, v) in extra {
            target.insert(k.clone(), v.clone());
        }
    }
    object.to_string()
}

/// Manages the sandboxed file tools bound to one descriptor.
pub struct SandboxManager {
    descriptor: Arc<SandboxDescriptor>,
}

impl SandboxManager {
    /// Create a manager over the given descriptor.
    #[must_use]
    pub fn new(descriptor: SandboxDescriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
        }
    }

    /// The descriptor in force.
    #[must_use]
    pub fn descriptor(&self) -> &SandboxDescriptor {
        &self.descriptor
    }

    /// Whether this manager owns the named tool.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        matches!(name, "read_file" | "write_file" | "list_dir" | "delete_file")
    }

    /// Definitions of the sandboxed tools.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::sandboxed(
                "read_file",
                "Read a text file inside the workspace.",
                json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
            ),
            ToolDefinition::sandboxed(
                "write_file",
                "Write a text file inside the workspace.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["path", "content"]
                }),
            ),
            ToolDefinition::sandboxed(
                "list_dir",
                "List entries of a workspace directory.",
                json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": []
                }),
            ),
            ToolDefinition::sandboxed(
                "delete_file",
                "Delete a file inside the workspace.",
                json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
            ),
        ]
    }

    /// Execute a sandboxed tool under the descriptor's timeout.
    ///
    /// Violations and I/O failures are reported as structured results,
    /// not errors — they are logic-level observations for the model.
    ///
    /// # Errors
    ///
    /// [`ToolError::Timeout`] when the call exceeds the sandbox timeout,
    /// [`ToolError::NotFound`] for unknown tool names.
    pub async fn execute(
        &self,
        name: &str,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError> {
        let timeout = self.descriptor.timeout();
        let run = self.execute_inner(name, args);
        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(timeout)),
        }
    }

    async fn execute_inner(
        &self,
        name: &str,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError> {
        let path_arg = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        match name {
            "read_file" => {
                if !self.descriptor.allows(SandboxOp::Read) {
                    return Ok(structured_error("read operations are not permitted"));
                }
                let path = match self.descriptor.resolve(path_arg) {
                    Ok(path) => path,
                    Err(err) => return Ok(structured_error(&err.to_string())),
                };
                match tokio::fs::read_to_string(&path).await {
                    Ok(content) => Ok(structured_ok(json!({"content": content}))),
                    Err(err) => Ok(structured_error(&format!("read failed: {err}"))),
                }
            }
            "write_file" => {
                if !self.descriptor.allows(SandboxOp::Write) {
                    return Ok(structured_error("write operations are not permitted"));
                }
                let path = match self.descriptor.resolve(path_arg) {
                    Ok(path) => path,
                    Err(err) => return Ok(structured_error(&err.to_string())),
                };
                let content = args
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if let Some(parent) = path.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                match tokio::fs::write(&path, content).await {
                    Ok(()) => Ok(structured_ok(json!({"bytes": content.len()}))),
                    Err(err) => Ok(structured_error(&format!("write failed: {err}"))),
                }
            }
            "list_dir" => {
                if !self.descriptor.allows(SandboxOp::List) {
                    return Ok(structured_error("list operations are not permitted"));
                }
                let path = match self.descriptor.resolve(path_arg) {
                    Ok(path) => path,
                    Err(err) => return Ok(structured_error(&err.to_string())),
                };
                let mut entries = Vec::new();
                match tokio::fs::read_dir(&path).await {
                    Ok(mut dir) => {
                        while let Ok(Some(entry)) = dir.next_entry().await {
                            entries.push(entry.file_name().to_string_lossy().to_string());
                        }
                        entries.sort();
                        Ok(structured_ok(json!({"entries": entries})))
                    }
                    Err(err) => Ok(structured_error(&format!("list failed: {err}"))),
                }
            }
            "delete_file" => {
                if !self.descriptor.allows(SandboxOp::Delete) {
                    return Ok(structured_error("delete operations are not permitted"));
                }
                let path = match self.descriptor.resolve(path_arg) {
                    Ok(path) => path,
                    Err(err) => return Ok(structured_error(&err.to_string())),
                };
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => Ok(structured_ok(json!({}))),
                    Err(err) => Ok(structured_error(&format!("delete failed: {err}"))),
                }
            }
            other => Err(ToolError::NotFound {
                name: other.to_string(),
                suggestions: vec![],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_traversal() {
        let descriptor = SandboxDescriptor::new("/srv/sandbox");
        assert!(descriptor.resolve("notes.txt").is_ok());
        assert!(descriptor.resolve("sub/notes.txt").is_ok());
        let err = descriptor.resolve("../outside.txt").unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
        assert!(descriptor.resolve("sub/../../outside.txt").is_err());
        assert!(descriptor.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn resolve_normalizes_inside() {
        let descriptor = SandboxDescriptor::new("/srv/sandbox");
        let resolved = descriptor.resolve("a/./b/../c.txt").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/sandbox/a/c.txt"));
    }

    #[tokio::test]
    async fn write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SandboxManager::new(SandboxDescriptor::new(dir.path()));
        let mut args = serde_json::Map::new();
        args.insert("path".into(), json!("notes.txt"));
        args.insert("content".into(), json!("hello"));
        let out = manager.execute("write_file", &args).await.unwrap();
        assert!(out.contains("\"success\":true"));

        let mut args = serde_json::Map::new();
        args.insert("path".into(), json!("notes.txt"));
        let out = manager.execute("read_file", &args).await.unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn escape_attempt_returns_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SandboxManager::new(SandboxDescriptor::new(dir.path()));
        let mut args = serde_json::Map::new();
        args.insert("path".into(), json!("../../etc/passwd"));
        let out = manager.execute("read_file", &args).await.unwrap();
        assert!(out.contains("\"success\":false"));
        assert!(out.contains("sandbox"));
    }

    #[tokio::test]
    async fn disallowed_op_is_refused_without_running() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = SandboxDescriptor::new(dir.path()).with_ops([SandboxOp::Read]);
        let manager = SandboxManager::new(descriptor);
        let mut args = serde_json::Map::new();
        args.insert("path".into(), json!("x.txt"));
        args.insert("content".into(), json!("data"));
        let out = manager.execute("write_file", &args).await.unwrap();
        assert!(out.contains("\"success\":false"));
        assert!(!dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn list_dir_sorts_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let manager = SandboxManager::new(SandboxDescriptor::new(dir.path()));
        let out = manager
            .execute("list_dir", &serde_json::Map::new())
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["entries"], json!(["a.txt", "b.txt"]));
    }
}
