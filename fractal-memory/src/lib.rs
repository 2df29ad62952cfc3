#![deny(missing_docs)]
//! Hierarchical agent memory for fractal.
//!
//! Four token-budgeted tiers per agent, wired into a cascade:
//!
//! | Tier | Container | Eviction | Next |
//! |------|-----------|----------|------|
//! | L1 working window | [`layers::WindowLayer`] | FIFO | extractor → L2 |
//! | L2 working set | [`layers::RankedLayer`] | lowest importance | summarizer → L3 |
//! | L3 summaries | [`layers::WindowLayer`] | FIFO | vectorization → L4 |
//! | L4 vectors | any [`fractal_types::VectorStore`] | count budget + TTL | — |
//!
//! [`AgentMemory`] is the façade owning the cascade and the authoritative
//! task-id index; [`MemoryController`] coordinates multiple memories in
//! one process and implements cross-session context sharing;
//! [`MemoryVectorStore`] is the in-process cosine store for L4.
//!
//! A full tier is never a fatal error — every insert succeeds after
//! eviction. A broken embedder degrades L4 to disabled; semantic search
//! then falls back to a substring/tag match over the in-process tiers.

pub mod config;
pub mod controller;
pub mod layers;
pub mod memory;
pub mod store;
pub mod types;

pub use config::{MemoryConfig, PromotionStrategy};
pub use controller::MemoryController;
pub use memory::{summarize_task, AgentMemory};
pub use store::MemoryVectorStore;
pub use types::{EntryType, MemoryStats, TaskSummary, WindowRecord, WorkingEntry};
