//! L4 vectorization, semantic retrieval, and degradation paths.

use std::sync::Arc;

use fractal_memory::{AgentMemory, MemoryConfig, MemoryVectorStore};
use fractal_token::EstimateCounter;
use fractal_types::test_utils::MockEmbedder;
use fractal_types::{Embedder, MemoryError, MessageItem, Task, TaskStatus, VectorStore};

fn counter() -> Arc<EstimateCounter> {
    Arc::new(EstimateCounter::new())
}

/// A memory whose L1/L3 budgets are tiny so low-importance messages flow
/// straight through to the L4 queue.
fn cascade_memory(store: Arc<MemoryVectorStore>, embedder: Arc<MockEmbedder>) -> AgentMemory {
    let config = MemoryConfig::default()
        .with_l1_budget(20)
        .with_l3_budget(15);
    AgentMemory::new("agent", config, counter()).with_vector_tier(store, embedder)
}

fn message(text: &str) -> MessageItem {
    let mut msg = MessageItem::user(text);
    msg.token_count = 15;
    msg
}

#[tokio::test]
async fn overflowing_summaries_are_vectorized() {
    let store = Arc::new(MemoryVectorStore::new(32));
    let embedder = Arc::new(MockEmbedder::new(32));
    let mut memory = cascade_memory(store.clone(), embedder);

    // Low importance: every eviction summarizes into the 15-token L3,
    // which overflows and queues vectorization jobs.
    for i in 0..6 {
        memory.add_message_with(
            message(&format!("observation number {i} about rust memory")),
            Some("s1"),
            None,
            Some(0.2),
        );
    }
    memory.maintain().await.unwrap();

    let stats = memory.stats();
    assert!(stats.l4_enabled);
    assert!(stats.l4_vector_count >= 1, "stats: {stats:?}");

    let hits = memory.semantic_search("rust memory", 5, None).await;
    assert!(!hits.is_empty());
}

#[tokio::test]
async fn semantic_search_scores_descend() {
    let store = Arc::new(MemoryVectorStore::new(32));
    let embedder = Arc::new(MockEmbedder::new(32));
    // Populate the store directly with summary-shaped metadata.
    for (id, text) in [
        ("t-1", "the quick brown fox"),
        ("t-2", "a completely different topic"),
        ("t-3", "the quick brown foxes"),
    ] {
        let vector = embedder.embed_text(text).await.unwrap();
        let task = Task::new("agent", "note");
        let mut summary = fractal_memory::summarize_task(&task);
        summary.task_id = id.to_string();
        summary.param_summary = text.to_string();
        store.add(id, &vector, summary.vector_metadata()).await.unwrap();
    }

    let query = embedder.embed_text("the quick brown fox").await.unwrap();
    let hits = store.search(&query, 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits[0].score >= hits[1].score);
    assert!(hits[1].score >= hits[2].score);
    assert_eq!(hits[0].id, "t-1");
}

#[tokio::test]
async fn failing_embedder_degrades_to_text_match() {
    let store = Arc::new(MemoryVectorStore::new(32));
    let embedder = Arc::new(MockEmbedder::failing(32));
    let mut memory = cascade_memory(store, embedder);

    memory.add_message(message("kubernetes deployment rollout notes"), Some("s1"));
    // The embedder never works, so maintain leaves the queue alone.
    memory.maintain().await.unwrap();
    assert_eq!(memory.stats().l4_vector_count, 0);

    // Search still answers from the in-process tiers.
    let hits = memory.semantic_search("kubernetes", 5, None).await;
    assert!(!hits.is_empty());
    assert!(hits[0].param_summary.contains("kubernetes"));
}

#[tokio::test]
async fn no_vector_tier_falls_back_to_substring() {
    let mut memory = AgentMemory::new("agent", MemoryConfig::default(), counter());
    memory.add_message(message("discussing the borrow checker"), None);

    let hits = memory.semantic_search("borrow checker", 5, None).await;
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn dimension_mismatch_surfaces_and_preserves_state() {
    // Store dimension disagrees with the embedder: the insert must fail
    // with an error and the summary must stay queued.
    let store = Arc::new(MemoryVectorStore::new(16));
    let embedder = Arc::new(MockEmbedder::new(32));
    let mut memory = cascade_memory(store, embedder);

    for i in 0..6 {
        memory.add_message_with(
            message(&format!("note {i} padded to a reasonable length")),
            None,
            None,
            Some(0.2),
        );
    }
    let err = memory.maintain().await.unwrap_err();
    assert!(matches!(err, MemoryError::DimensionMismatch { .. }));
    assert_eq!(memory.stats().l4_vector_count, 0);
}

#[tokio::test]
async fn fallback_search_matches_tags() {
    let mut memory = AgentMemory::new("agent", MemoryConfig::default(), counter());
    let mut task = Task::new("agent", "deploy").with_importance(0.9);
    task.status = TaskStatus::Completed;
    memory.add_task(task);

    // Auto-derived tags are [action, status]; search by the action tag via
    // the task text held in L1.
    let hits = memory.semantic_search("deploy", 5, None).await;
    assert!(!hits.is_empty());
}
