//! Cross-session memory coordination.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::memory::AgentMemory;

/// Coordinates multiple per-agent memories in one process and supports
/// copying recent context between sessions.
///
/// Each memory sits behind its own async mutex; [`share_context`]
/// (`MemoryController::share_context`) takes the source lock briefly to
/// clone the records, then each destination lock exclusively for the
/// bulk insert. In-flight writers simply wait on the mutex and proceed
/// after the copy.
#[derive(Default)]
pub struct MemoryController {
    memories: HashMap<String, Arc<Mutex<AgentMemory>>>,
}

impl MemoryController {
    /// Create an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared memory handle under a session id (e.g. an
    /// agent's own memory).
    pub fn register(&mut self, session_id: impl Into<String>, memory: Arc<Mutex<AgentMemory>>) {
        self.memories.insert(session_id.into(), memory);
    }

    /// Wrap an owned memory and register it. Returns the shared handle.
    pub fn register_owned(
        &mut self,
        session_id: impl Into<String>,
        memory: AgentMemory,
    ) -> Arc<Mutex<AgentMemory>> {
        let handle = Arc::new(Mutex::new(memory));
        self.register(session_id, handle.clone());
        handle
    }

    /// Look up a registered memory.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<AgentMemory>>> {
        self.memories.get(session_id).cloned()
    }

    /// Copy the `task_limit` most recent L1 items from the source session
    /// into each destination. Copies are independent items thereafter.
    ///
    /// Returns the number of destinations actually written.
    pub async fn share_context(
        &self,
        src_session_id: &str,
        dst_session_ids: &[&str],
        task_limit: usize,
    ) -> usize {
        let Some(source) = self.get(src_session_id) else {
            tracing::warn!(session = src_session_id, "share_context: unknown source session");
            return 0;
        };
        let records = {
            let source = source.lock().await;
            source.export_recent(task_limit)
        };
        let mut written = 0;
        for dst in dst_session_ids {
            if *dst == src_session_id {
                continue;
            }
            let Some(target) = self.get(dst) else {
                tracing::warn!(session = dst, "share_context: unknown destination session");
                continue;
            };
            let mut target = target.lock().await;
            target.import_records(records.clone());
            written += 1;
        }
        written
    }
}
