//! The per-agent memory façade wiring the four tiers together.
//!
//! The tiers form a DAG (L1 → L2 → L3 → L4) with cascading eviction:
//! messages evicted from the L1 window are offered to the L2 working set
//! by an extractor strategy, L2 compression summarizes the least
//! important entries into L3, and L3 overflow queues vectorization jobs
//! for L4. The task-id index is the single authoritative map, owned here.
//!
//! The agent owns its memory exclusively — every method takes `&mut self`
//! and tier mutations are serialized by construction. Only the L4 edge
//! (embedding, vector I/O) is async.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fractal_token::TokenCounter;
use fractal_types::{Embedder, MemoryError, MessageItem, Role, Task, VectorStore};

use crate::config::{MemoryConfig, PromotionStrategy};
use crate::layers::{RankedAdd, RankedItem, TokenItem, WindowLayer, RankedLayer};
use crate::types::{
    truncate_repr, EntryType, MemoryStats, TaskSummary, WindowRecord, WorkingEntry,
};

/// The L4 attachment: a vector store plus the embedder feeding it.
struct VectorTier {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    /// id → creation time, for age-ordered pruning.
    index: HashMap<String, DateTime<Utc>>,
    pruned_count: usize,
    last_pruned_at: Option<DateTime<Utc>>,
    /// Set after the first embedder failure so the degradation is logged
    /// once, not per item.
    degraded_logged: bool,
}

/// Hierarchical memory for one agent.
pub struct AgentMemory {
    node_id: String,
    config: MemoryConfig,
    counter: Arc<dyn TokenCounter>,
    l1: WindowLayer<WindowRecord>,
    l2: RankedLayer<WorkingEntry>,
    l3: WindowLayer<TaskSummary>,
    l4: Option<VectorTier>,
    task_index: HashMap<String, Task>,
    /// Summaries awaiting vectorization (L3 overflow + promotion picks).
    pending_l4: Vec<TaskSummary>,
}

impl AgentMemory {
    /// Create a memory for the given agent node.
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        config: MemoryConfig,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        let l1 = WindowLayer::new(config.l1_token_budget);
        let l2 = RankedLayer::new(config.l2_token_budget);
        let l3 = WindowLayer::new(config.l3_token_budget);
        Self {
            node_id: node_id.into(),
            config,
            counter,
            l1,
            l2,
            l3,
            l4: None,
            task_index: HashMap::new(),
            pending_l4: Vec::new(),
        }
    }

    /// Attach the L4 vector tier.
    #[must_use]
    pub fn with_vector_tier(
        mut self,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        self.l4 = Some(VectorTier {
            store,
            embedder,
            index: HashMap::new(),
            pruned_count: 0,
            last_pruned_at: None,
            degraded_logged: false,
        });
        self
    }

    /// The owning agent's node id.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    // ---- inserts ----

    /// Record a conversation message in L1. Returns the messages evicted
    /// from the window (they have already been offered downstream).
    pub fn add_message(
        &mut self,
        message: MessageItem,
        session_id: Option<&str>,
    ) -> Vec<MessageItem> {
        self.add_message_with(message, session_id, None, None)
    }

    /// Record a message with an owning task and an importance hint for
    /// the L1→L2 extractor.
    pub fn add_message_with(
        &mut self,
        mut message: MessageItem,
        session_id: Option<&str>,
        task_id: Option<&str>,
        importance: Option<f64>,
    ) -> Vec<MessageItem> {
        self.apply_retention();
        if message.token_count == 0 {
            message.token_count = self.counter.count_message(&message.content);
        }
        let token_count = message.token_count;
        let record = WindowRecord {
            message,
            task_id: task_id.map(String::from),
            session_id: session_id.map(String::from),
            importance,
        };
        let evicted = self.l1.add(record, token_count);
        let evicted_messages = evicted.iter().map(|e| e.item.message.clone()).collect();
        for item in evicted {
            self.extract_to_l2(item);
        }
        self.promote();
        evicted_messages
    }

    /// Record a task: index it, drop its textual form into L1, and offer
    /// it to L2 when the strategy calls for it.
    pub fn add_task(&mut self, mut task: Task) {
        self.apply_retention();
        let text = task.text_form();
        let token_count = self.counter.count(&text);
        task.metadata.token_count = token_count;
        let importance = task.metadata.importance;
        let task_id = task.task_id.clone();
        let session_id = task.session_id.clone();
        self.task_index.insert(task_id.clone(), task);
        if self.task_index.len() > self.config.max_task_index {
            self.cleanup_task_index();
        }

        let record = WindowRecord {
            message: MessageItem {
                role: Role::User,
                content: text.clone(),
                tool_call_id: None,
                tool_name: None,
                token_count,
            },
            task_id: Some(task_id.clone()),
            session_id: session_id.clone(),
            importance: Some(importance),
        };
        for item in self.l1.add(record, token_count) {
            self.extract_to_l2(item);
        }

        if self.config.strategy == PromotionStrategy::ImportanceBased
            && importance > self.config.importance_threshold
        {
            let entry = WorkingEntry {
                content: text,
                importance,
                token_count,
                entry_type: EntryType::Fact,
                tags: Vec::new(),
                task_id: Some(task_id),
                session_id,
                created_at: Utc::now(),
            };
            self.offer_to_l2(entry);
        }
        self.promote();
    }

    // ---- the cascade ----

    /// L1→L2 extraction, applied to each evicted window record. Items the
    /// strategy declines are still offered to the L3 summarizer so no
    /// information is silently lost; the time-based strategy flushes
    /// instead.
    fn extract_to_l2(&mut self, evicted: TokenItem<WindowRecord>) {
        let record = evicted.item;
        match self.config.strategy {
            PromotionStrategy::ImportanceBased => {
                let importance = record.importance.unwrap_or(0.5);
                if importance >= self.config.importance_threshold {
                    self.offer_to_l2(entry_from_record(&record, importance, evicted.token_count));
                } else {
                    let summary = self.summarize_record(&record, importance);
                    self.add_to_l3(summary);
                    self.index_remove_if_absent(record.task_id.as_deref());
                }
            }
            PromotionStrategy::AccessCount => {
                let access_count = record
                    .task_id
                    .as_deref()
                    .and_then(|id| self.task_index.get(id))
                    .map_or(0, |t| t.metadata.access_count);
                let importance = record.importance.unwrap_or(0.5);
                if access_count >= self.config.access_promote_threshold {
                    self.offer_to_l2(entry_from_record(&record, importance, evicted.token_count));
                } else {
                    let summary = self.summarize_record(&record, importance);
                    self.add_to_l3(summary);
                    self.index_remove_if_absent(record.task_id.as_deref());
                }
            }
            PromotionStrategy::TimeBased => {
                let promote = self.config.l1_retention.is_some_and(|retention| {
                    let age = Utc::now() - evicted.created_at;
                    age.to_std().map_or(false, |age| age >= retention)
                });
                if promote {
                    let importance = record.importance.unwrap_or(0.5);
                    self.offer_to_l2(entry_from_record(&record, importance, evicted.token_count));
                } else {
                    // The window just flushes.
                    self.index_remove_if_absent(record.task_id.as_deref());
                }
            }
        }
    }

    /// Offer an entry to L2; layer-level evictions and rejections cascade
    /// to the L3 summarizer.
    fn offer_to_l2(&mut self, entry: WorkingEntry) {
        let importance = entry.importance;
        let token_count = entry.token_count;
        match self.l2.add(entry, importance, token_count) {
            RankedAdd::Inserted { evicted } => {
                for victim in evicted {
                    self.summarize_l2_entry(victim);
                }
            }
            RankedAdd::Rejected(rejected) => {
                // Not important enough to displace the minimum — still
                // worth a summary.
                self.summarize_l2_entry(rejected);
            }
        }
    }

    fn summarize_l2_entry(&mut self, item: RankedItem<WorkingEntry>) {
        let entry = item.item;
        let task_id = entry.task_id.clone();
        let summary = match task_id.as_deref().and_then(|id| self.task_index.get(id)) {
            Some(task) => summarize_task(task),
            None => TaskSummary {
                task_id: task_id
                    .clone()
                    .unwrap_or_else(|| format!("entry-{}", uuid::Uuid::new_v4().simple())),
                action: "note".to_string(),
                param_summary: truncate_repr(&entry.content),
                result_summary: String::new(),
                tags: entry.tags.clone(),
                importance: entry.importance,
                session_id: entry.session_id.clone(),
                created_at: entry.created_at,
                access_count: 0,
            },
        };
        self.add_to_l3(summary);
        self.index_remove_if_absent(task_id.as_deref());
    }

    fn summarize_record(&self, record: &WindowRecord, importance: f64) -> TaskSummary {
        match record.task_id.as_deref().and_then(|id| self.task_index.get(id)) {
            Some(task) => summarize_task(task),
            None => TaskSummary {
                task_id: record
                    .task_id
                    .clone()
                    .unwrap_or_else(|| format!("msg-{}", uuid::Uuid::new_v4().simple())),
                action: role_action(record.message.role).to_string(),
                param_summary: truncate_repr(&record.message.content),
                result_summary: String::new(),
                tags: vec![role_action(record.message.role).to_string()],
                importance,
                session_id: record.session_id.clone(),
                created_at: Utc::now(),
                access_count: 0,
            },
        }
    }

    /// Insert a summary into L3; FIFO overflow becomes an L4
    /// vectorization job.
    fn add_to_l3(&mut self, summary: TaskSummary) {
        let token_count = self.counter.count(&summary.text_form());
        for evicted in self.l3.add(summary, token_count) {
            self.pending_l4.push(evicted.item);
        }
    }

    /// Run the synchronous promotion rules. Invoked after every insert;
    /// may also be called on a timer.
    pub fn promote(&mut self) {
        // L2 → L3 when usage crosses the compression threshold.
        let (_, l2_used) = self.l2.size();
        let l2_budget = self.l2.budget();
        if l2_budget > 0 {
            let ratio = l2_used as f64 / l2_budget as f64;
            if ratio >= self.config.l2_compress_threshold {
                let target = (l2_budget as f64 * self.config.l2_drain_target) as usize;
                let drained = self.l2.drain_lowest_to(target);
                tracing::debug!(
                    node_id = %self.node_id,
                    drained = drained.len(),
                    "compressing working set into summaries"
                );
                for item in drained {
                    self.summarize_l2_entry(item);
                }
            }
        }

        // L3 → L4 when usage crosses the vectorization threshold: queue
        // the oldest slice, preferring frequently read summaries when the
        // access preference is configured.
        let (l3_count, l3_used) = self.l3.size();
        let l3_budget = self.l3.budget();
        if self.l4.is_some() && l3_budget > 0 && l3_count > 0 {
            let ratio = l3_used as f64 / l3_budget as f64;
            if ratio >= self.config.l3_compress_threshold {
                let take = ((l3_count as f64 * self.config.l3_promote_fraction).floor() as usize)
                    .max(1);
                let threshold = self.config.l3_promote_access_threshold;
                let mut preferred: Vec<String> = Vec::new();
                if threshold > 0 {
                    preferred = self
                        .l3
                        .items()
                        .filter(|s| s.item.access_count >= threshold)
                        .take(take)
                        .map(|s| s.item.task_id.clone())
                        .collect();
                }
                let mut remaining = take.saturating_sub(preferred.len());
                let mut chosen: Vec<String> = preferred;
                for entry in self.l3.items() {
                    if remaining == 0 {
                        break;
                    }
                    if !chosen.contains(&entry.item.task_id) {
                        chosen.push(entry.item.task_id.clone());
                        remaining -= 1;
                    }
                }
                let removed = self.l3.retain(|s| !chosen.contains(&s.item.task_id));
                for item in removed {
                    self.pending_l4.push(item.item);
                }
            }
        }
    }

    /// Run the async promotion edge: vectorize pending summaries into L4
    /// and prune it. Call from an async context after inserts (or on a
    /// timer).
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when the store rejects a
    /// vector; the offending summary stays queued and no other state
    /// changes. Embedder failures are not errors: the summaries stay in
    /// the queue and a retry happens on the next cycle.
    pub async fn maintain(&mut self) -> Result<(), MemoryError> {
        if self.l4.is_none() {
            self.pending_l4.clear();
            return Ok(());
        }
        while let Some(summary) = self.pending_l4.first().cloned() {
            let Some(tier) = self.l4.as_mut() else {
                break;
            };
            let vector = match tier.embedder.embed_text(&summary.text_form()).await {
                Ok(vector) => vector,
                Err(err) => {
                    if !tier.degraded_logged {
                        tracing::warn!(
                            node_id = %self.node_id,
                            error = %err,
                            "embedder unavailable, summaries stay in L3 queue"
                        );
                        tier.degraded_logged = true;
                    }
                    return Ok(());
                }
            };
            tier.degraded_logged = false;
            match tier
                .store
                .add(&summary.task_id, &vector, summary.vector_metadata())
                .await
            {
                Ok(_) => {
                    tier.index.insert(summary.task_id.clone(), summary.created_at);
                    self.pending_l4.remove(0);
                }
                Err(err) => return Err(err),
            }
        }
        self.prune_l4().await;
        Ok(())
    }

    /// Two-phase L4 pruning: drop the oldest vectors beyond the count
    /// budget, then anything past the TTL. Deletes are best-effort and
    /// idempotent.
    async fn prune_l4(&mut self) {
        let Some(tier) = self.l4.as_mut() else {
            return;
        };
        let now = Utc::now();
        let mut doomed: Vec<String> = Vec::new();

        if let Some(ttl) = self.config.l4_ttl {
            let cutoff = now
                - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
            doomed.extend(
                tier.index
                    .iter()
                    .filter(|(_, created)| **created < cutoff)
                    .map(|(id, _)| id.clone()),
            );
        }

        let live = tier.index.len() - doomed.len();
        if live > self.config.l4_max_vectors {
            let mut by_age: Vec<(&String, &DateTime<Utc>)> = tier
                .index
                .iter()
                .filter(|(id, _)| !doomed.contains(*id))
                .collect();
            by_age.sort_by_key(|(_, created)| **created);
            let overflow = live - self.config.l4_max_vectors;
            doomed.extend(by_age.into_iter().take(overflow).map(|(id, _)| id.clone()));
        }

        if doomed.is_empty() {
            return;
        }
        let mut deleted = 0usize;
        for id in &doomed {
            match tier.store.delete(id).await {
                Ok(true) => {
                    tier.index.remove(id);
                    deleted += 1;
                }
                Ok(false) => {
                    // Already gone elsewhere; drop our index entry too.
                    tier.index.remove(id);
                }
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "L4 prune delete failed");
                }
            }
        }
        tier.pruned_count += deleted;
        tier.last_pruned_at = Some(now);
        if deleted > 0 {
            tracing::info!(node_id = %self.node_id, deleted, "pruned L4 vectors");
        }
    }

    // ---- queries ----

    /// The most recent L1 messages in insertion order.
    pub fn recent(&mut self, limit: usize, session_id: Option<&str>) -> Vec<MessageItem> {
        self.apply_retention();
        let selected: Vec<(MessageItem, Option<String>)> = self
            .l1
            .items()
            .filter(|r| session_matches(r.item.session_id.as_deref(), session_id))
            .map(|r| (r.item.message.clone(), r.item.task_id.clone()))
            .collect();
        let start = selected.len().saturating_sub(limit);
        let selected = &selected[start..];
        for (_, task_id) in selected {
            if let Some(id) = task_id {
                self.mark_access(id);
            }
        }
        selected.iter().map(|(m, _)| m.clone()).collect()
    }

    /// L2 entries sorted by importance descending.
    pub fn important(&mut self, limit: usize, session_id: Option<&str>) -> Vec<WorkingEntry> {
        self.apply_retention();
        let entries: Vec<WorkingEntry> = self
            .l2
            .items_ranked()
            .into_iter()
            .filter(|r| session_matches(r.item.session_id.as_deref(), session_id))
            .take(limit)
            .map(|r| r.item.clone())
            .collect();
        let ids: Vec<String> = entries.iter().filter_map(|e| e.task_id.clone()).collect();
        for id in ids {
            self.mark_access(&id);
        }
        entries
    }

    /// The most recent L3 summaries in insertion order.
    pub fn summaries(&mut self, limit: usize, session_id: Option<&str>) -> Vec<TaskSummary> {
        self.apply_retention();
        let matching: Vec<String> = self
            .l3
            .items()
            .filter(|s| session_matches(s.item.session_id.as_deref(), session_id))
            .map(|s| s.item.task_id.clone())
            .collect();
        let start = matching.len().saturating_sub(limit);
        let wanted = &matching[start..];
        let mut out = Vec::with_capacity(wanted.len());
        for entry in self.l3.items_mut() {
            if wanted.contains(&entry.item.task_id) {
                entry.item.access_count += 1;
                out.push(entry.item.clone());
            }
        }
        out
    }

    /// Semantic retrieval over L4, score-descending. Degrades to a
    /// substring/tag match over L1 ∪ L2 ∪ L3 when L4 or the embedder is
    /// unavailable.
    pub async fn semantic_search(
        &mut self,
        query: &str,
        k: usize,
        session_id: Option<&str>,
    ) -> Vec<TaskSummary> {
        if let Some(tier) = &self.l4 {
            match tier.embedder.embed_text(query).await {
                Ok(vector) => match tier.store.search(&vector, k).await {
                    Ok(hits) => {
                        return hits
                            .iter()
                            .filter_map(|hit| TaskSummary::from_vector_metadata(&hit.metadata))
                            .filter(|s| session_matches(s.session_id.as_deref(), session_id))
                            .collect();
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "L4 search failed, degrading to text match");
                    }
                },
                Err(err) => {
                    tracing::warn!(error = %err, "query embedding failed, degrading to text match");
                }
            }
        }
        self.fallback_search(query, k, session_id)
    }

    /// Substring/tag match across the in-process tiers, ranked by
    /// importance.
    fn fallback_search(
        &mut self,
        query: &str,
        k: usize,
        session_id: Option<&str>,
    ) -> Vec<TaskSummary> {
        let needle = query.to_lowercase();
        let mut matches: Vec<TaskSummary> = Vec::new();

        for record in self.l1.items() {
            if !session_matches(record.item.session_id.as_deref(), session_id) {
                continue;
            }
            if record.item.message.content.to_lowercase().contains(&needle) {
                matches.push(self.summarize_record(&record.item, record.item.importance.unwrap_or(0.5)));
            }
        }
        for entry in self.l2.items_ranked() {
            if !session_matches(entry.item.session_id.as_deref(), session_id) {
                continue;
            }
            let tag_hit = entry
                .item
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(&needle));
            if tag_hit || entry.item.content.to_lowercase().contains(&needle) {
                matches.push(TaskSummary {
                    task_id: entry
                        .item
                        .task_id
                        .clone()
                        .unwrap_or_else(|| format!("entry-{}", uuid::Uuid::new_v4().simple())),
                    action: "note".to_string(),
                    param_summary: truncate_repr(&entry.item.content),
                    result_summary: String::new(),
                    tags: entry.item.tags.clone(),
                    importance: entry.item.importance,
                    session_id: entry.item.session_id.clone(),
                    created_at: entry.item.created_at,
                    access_count: 0,
                });
            }
        }
        for summary in self.l3.items() {
            if !session_matches(summary.item.session_id.as_deref(), session_id) {
                continue;
            }
            let text = summary.item.text_form().to_lowercase();
            let tag_hit = summary
                .item
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(&needle));
            if tag_hit || text.contains(&needle) {
                matches.push(summary.item.clone());
            }
        }

        matches.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);
        matches
    }

    // ---- task index ----

    /// Look up a task by id, bumping its access counter.
    pub fn get_task(&mut self, task_id: &str) -> Option<Task> {
        self.mark_access(task_id);
        self.task_index.get(task_id).cloned()
    }

    /// Record a task's terminal result back into the index.
    pub fn update_task(&mut self, task: Task) {
        self.task_index.insert(task.task_id.clone(), task);
    }

    /// The call chain from the root task down to `task_id`, following
    /// `parent_task_id` links.
    pub fn call_chain(&mut self, task_id: &str) -> Vec<Task> {
        let mut chain = Vec::new();
        let mut current = self.get_task(task_id);
        while let Some(task) = current {
            let parent = task.parent_task_id.clone();
            chain.push(task);
            current = parent.and_then(|id| self.get_task(&id));
        }
        chain.reverse();
        chain
    }

    /// Remove a task from L1, L2, and the index. Returns whether anything
    /// was removed.
    pub fn remove_task(&mut self, task_id: &str) -> bool {
        let had_index = self.task_index.remove(task_id).is_some();
        let from_l1 = !self
            .l1
            .retain(|r| r.item.task_id.as_deref() != Some(task_id))
            .is_empty();
        let from_l2 = !self
            .l2
            .retain(|r| r.item.task_id.as_deref() != Some(task_id))
            .is_empty();
        had_index || from_l1 || from_l2
    }

    fn mark_access(&mut self, task_id: &str) {
        if let Some(task) = self.task_index.get_mut(task_id) {
            task.metadata.access_count += 1;
            task.metadata.last_accessed = Some(Utc::now());
        }
    }

    fn index_remove_if_absent(&mut self, task_id: Option<&str>) {
        let Some(task_id) = task_id else {
            return;
        };
        let in_l1 = self
            .l1
            .items()
            .any(|r| r.item.task_id.as_deref() == Some(task_id));
        let in_l2 = self
            .l2
            .items_ranked()
            .iter()
            .any(|r| r.item.task_id.as_deref() == Some(task_id));
        if !in_l1 && !in_l2 {
            self.task_index.remove(task_id);
        }
    }

    /// Drop index entries no longer present in any tier. Runs when the
    /// index exceeds its size cap.
    fn cleanup_task_index(&mut self) {
        let mut live: std::collections::HashSet<String> = std::collections::HashSet::new();
        live.extend(self.l1.items().filter_map(|r| r.item.task_id.clone()));
        live.extend(
            self.l2
                .items_ranked()
                .iter()
                .filter_map(|r| r.item.task_id.clone()),
        );
        live.extend(self.l3.items().map(|s| s.item.task_id.clone()));
        self.task_index.retain(|id, _| live.contains(id));
    }

    // ---- retention ----

    /// Purge items older than each tier's retention. Runs before reads
    /// and inserts.
    fn apply_retention(&mut self) {
        let now = Utc::now();
        if let Some(retention) = self.config.l1_retention {
            let cutoff =
                now - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
            let purged = self.l1.pop_front_while(|item| item.created_at < cutoff);
            for item in purged {
                self.index_remove_if_absent(item.item.task_id.as_deref());
            }
        }
        if let Some(retention) = self.config.l2_retention {
            let cutoff =
                now - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
            let purged = self.l2.retain(|item| item.created_at >= cutoff);
            for item in purged {
                self.index_remove_if_absent(item.item.task_id.as_deref());
            }
        }
        if let Some(retention) = self.config.l3_retention {
            let cutoff =
                now - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
            self.l3.retain(|item| item.created_at >= cutoff);
        }
    }

    // ---- bulk export/import (cross-session sharing) ----

    /// Clone the `limit` most recent L1 records for sharing into another
    /// memory. Copies are independent items thereafter.
    #[must_use]
    pub fn export_recent(&self, limit: usize) -> Vec<WindowRecord> {
        let records: Vec<WindowRecord> = self.l1.items().map(|r| r.item.clone()).collect();
        let start = records.len().saturating_sub(limit);
        records[start..].to_vec()
    }

    /// Import shared records into this memory's L1.
    pub fn import_records(&mut self, records: Vec<WindowRecord>) {
        for record in records {
            let importance = record.importance;
            let task_id = record.task_id.clone();
            let session_id = record.session_id.clone();
            self.add_message_with(
                record.message,
                session_id.as_deref(),
                task_id.as_deref(),
                importance,
            );
        }
    }

    // ---- maintenance ----

    /// A point-in-time stats snapshot.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        let (l1_count, l1_used) = self.l1.size();
        let (l2_count, l2_used) = self.l2.size();
        let (l3_count, l3_used) = self.l3.size();
        MemoryStats {
            l1_token_usage: l1_used,
            l1_token_budget: self.l1.budget(),
            l1_item_count: l1_count,
            l2_token_usage: l2_used,
            l2_token_budget: self.l2.budget(),
            l2_item_count: l2_count,
            l3_token_usage: l3_used,
            l3_token_budget: self.l3.budget(),
            l3_item_count: l3_count,
            l4_vector_count: self.l4.as_ref().map_or(0, |t| t.index.len()),
            l4_pruned_count: self.l4.as_ref().map_or(0, |t| t.pruned_count),
            l4_last_pruned_at: self.l4.as_ref().and_then(|t| t.last_pruned_at),
            task_index_size: self.task_index.len(),
            l4_enabled: self.l4.is_some(),
        }
    }

    /// Clear every tier and the index. L4 contents are cleared too.
    pub async fn clear_all(&mut self) {
        self.l1.clear();
        self.l2.clear();
        self.l3.clear();
        self.pending_l4.clear();
        self.task_index.clear();
        if let Some(tier) = &mut self.l4 {
            if let Err(err) = tier.store.clear().await {
                tracing::warn!(error = %err, "clearing L4 store failed");
            }
            tier.index.clear();
        }
    }
}

fn entry_from_record(record: &WindowRecord, importance: f64, token_count: usize) -> WorkingEntry {
    WorkingEntry {
        content: record.message.content.clone(),
        importance,
        token_count,
        entry_type: EntryType::from_role(record.message.role),
        tags: Vec::new(),
        task_id: record.task_id.clone(),
        session_id: record.session_id.clone(),
        created_at: Utc::now(),
    }
}

fn role_action(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Compress a task into its L3 summary form.
#[must_use]
pub fn summarize_task(task: &Task) -> TaskSummary {
    let params = serde_json::to_string(&task.parameters).unwrap_or_default();
    let result = task
        .result
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "null".to_string());
    let tags = if task.metadata.tags.is_empty() {
        vec![task.action.clone(), task.status.as_str().to_string()]
    } else {
        task.metadata.tags.clone()
    };
    TaskSummary {
        task_id: task.task_id.clone(),
        action: task.action.clone(),
        param_summary: truncate_repr(&params),
        result_summary: truncate_repr(&result),
        tags,
        importance: task.metadata.importance,
        session_id: task.session_id.clone(),
        created_at: task.created_at,
        access_count: 0,
    }
}

fn session_matches(actual: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        Some(session) => actual == Some(session),
        None => true,
    }
}
