//! Memory configuration.

use std::time::Duration;

/// How items are promoted from L1 into the L2 working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionStrategy {
    /// Promote when importance reaches the threshold (the default).
    #[default]
    ImportanceBased,
    /// Promote when the backing task's access counter reaches the
    /// threshold.
    AccessCount,
    /// Promote when the item's age reaches the L1 retention; in practice
    /// L1 just flushes and nothing re-promotes.
    TimeBased,
}

/// Token budgets, thresholds, and retention for one agent's memory.
///
/// Every field has a working default; use the builder-style setters to
/// adjust individual knobs.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// L1 working-window token budget.
    pub l1_token_budget: usize,
    /// L2 working-set token budget.
    pub l2_token_budget: usize,
    /// L3 summary-tier token budget.
    pub l3_token_budget: usize,
    /// Maximum vectors retained in L4.
    pub l4_max_vectors: usize,
    /// Vectors older than this are pruned from L4.
    pub l4_ttl: Option<Duration>,
    /// L1→L2 promotion strategy.
    pub strategy: PromotionStrategy,
    /// Importance threshold for L1→L2 promotion and L2 ranking decisions.
    pub importance_threshold: f64,
    /// Access-count threshold for the `AccessCount` strategy.
    pub access_promote_threshold: u32,
    /// L2 usage ratio that triggers compression into L3.
    pub l2_compress_threshold: f64,
    /// L2 usage ratio compression drains down to.
    pub l2_drain_target: f64,
    /// L3 usage ratio that triggers vectorization into L4.
    pub l3_compress_threshold: f64,
    /// Fraction of L3 (oldest first) vectorized per promotion cycle.
    pub l3_promote_fraction: f64,
    /// Summaries read at least this often are vectorized preferentially.
    /// Zero disables the preference.
    pub l3_promote_access_threshold: u32,
    /// Items older than the per-tier retention are purged on access.
    pub l1_retention: Option<Duration>,
    /// L2 retention.
    pub l2_retention: Option<Duration>,
    /// L3 retention.
    pub l3_retention: Option<Duration>,
    /// Task-index size cap; over it, entries absent from all tiers drop.
    pub max_task_index: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            l1_token_budget: 8_000,
            l2_token_budget: 16_000,
            l3_token_budget: 32_000,
            l4_max_vectors: 10_000,
            l4_ttl: None,
            strategy: PromotionStrategy::ImportanceBased,
            importance_threshold: 0.6,
            access_promote_threshold: 3,
            l2_compress_threshold: 0.85,
            l2_drain_target: 0.8,
            l3_compress_threshold: 0.90,
            l3_promote_fraction: 0.2,
            l3_promote_access_threshold: 0,
            l1_retention: None,
            l2_retention: None,
            l3_retention: None,
            max_task_index: 1_000,
        }
    }
}

impl MemoryConfig {
    /// Set the L1 token budget.
    #[must_use]
    pub fn with_l1_budget(mut self, budget: usize) -> Self {
        self.l1_token_budget = budget;
        self
    }

    /// Set the L2 token budget.
    #[must_use]
    pub fn with_l2_budget(mut self, budget: usize) -> Self {
        self.l2_token_budget = budget;
        self
    }

    /// Set the L3 token budget.
    #[must_use]
    pub fn with_l3_budget(mut self, budget: usize) -> Self {
        self.l3_token_budget = budget;
        self
    }

    /// Set the L4 vector-count budget.
    #[must_use]
    pub fn with_l4_max_vectors(mut self, max: usize) -> Self {
        self.l4_max_vectors = max;
        self
    }

    /// Set the L4 TTL.
    #[must_use]
    pub fn with_l4_ttl(mut self, ttl: Duration) -> Self {
        self.l4_ttl = Some(ttl);
        self
    }

    /// Set the promotion strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: PromotionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the importance threshold.
    #[must_use]
    pub fn with_importance_threshold(mut self, threshold: f64) -> Self {
        self.importance_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}
