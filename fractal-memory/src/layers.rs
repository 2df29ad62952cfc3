//! The tier containers: a FIFO token-budgeted window and an
//! importance-ranked set.
//!
//! Each container enforces its budget on insert and reports what it
//! evicted; the façade wires evictions into the next tier down. A full
//! container is never an error — the incoming item always finds room.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// An item paired with its exact token count and insertion time.
#[derive(Debug, Clone)]
pub struct TokenItem<T> {
    /// The stored item.
    pub item: T,
    /// Exact token count.
    pub token_count: usize,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
}

/// An observer invoked for each evicted item.
pub type EvictionCallback<T> = Box<dyn Fn(&TokenItem<T>) + Send + Sync>;

/// FIFO token-budgeted container backing L1 and L3.
///
/// When an insert would exceed the budget, items pop from the front until
/// it fits. A single item larger than the whole budget is still stored
/// (the container is emptied first) with a warning. Evicted items are
/// both returned to the caller (which cascades them to the next tier)
/// and reported to any registered eviction observers.
pub struct WindowLayer<T> {
    items: VecDeque<TokenItem<T>>,
    budget: usize,
    used: usize,
    eviction_callbacks: Vec<EvictionCallback<T>>,
}

impl<T> WindowLayer<T> {
    /// Create an empty window with the given token budget.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            items: VecDeque::new(),
            budget,
            used: 0,
            eviction_callbacks: Vec::new(),
        }
    }

    /// Register an observer invoked for each evicted item.
    pub fn on_eviction(&mut self, callback: EvictionCallback<T>) {
        self.eviction_callbacks.push(callback);
    }

    /// Insert an item, evicting from the front until it fits. Returns the
    /// evicted items in eviction order.
    pub fn add(&mut self, item: T, token_count: usize) -> Vec<TokenItem<T>> {
        let mut evicted = Vec::new();
        while self.used + token_count > self.budget {
            match self.items.pop_front() {
                Some(front) => {
                    self.used -= front.token_count;
                    for callback in &self.eviction_callbacks {
                        callback(&front);
                    }
                    evicted.push(front);
                }
                None => {
                    tracing::warn!(
                        token_count,
                        budget = self.budget,
                        "item exceeds the entire tier budget, storing anyway"
                    );
                    break;
                }
            }
        }
        self.items.push_back(TokenItem {
            item,
            token_count,
            created_at: Utc::now(),
        });
        self.used += token_count;
        evicted
    }

    /// Items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &TokenItem<T>> {
        self.items.iter()
    }

    /// Items in insertion order, mutably (access-count bumps).
    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut TokenItem<T>> {
        self.items.iter_mut()
    }

    /// `(item_count, token_usage)`.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        (self.items.len(), self.used)
    }

    /// The token budget.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
        self.used = 0;
    }

    /// Keep only items satisfying the predicate; returns the removed ones.
    pub fn retain(&mut self, mut keep: impl FnMut(&TokenItem<T>) -> bool) -> Vec<TokenItem<T>> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for entry in self.items.drain(..) {
            if keep(&entry) {
                kept.push_back(entry);
            } else {
                self.used -= entry.token_count;
                removed.push(entry);
            }
        }
        self.items = kept;
        removed
    }

    /// Pop expired items from the front (the window is time-ordered).
    pub fn pop_front_while(
        &mut self,
        mut expired: impl FnMut(&TokenItem<T>) -> bool,
    ) -> Vec<TokenItem<T>> {
        let mut popped = Vec::new();
        while let Some(front) = self.items.front() {
            if expired(front) {
                let front = self.items.pop_front().expect("front exists");
                self.used -= front.token_count;
                popped.push(front);
            } else {
                break;
            }
        }
        popped
    }
}

/// A ranked item in the L2 working set.
#[derive(Debug, Clone)]
pub struct RankedItem<T> {
    /// The stored item.
    pub item: T,
    /// The eviction key; lower evicts first.
    pub importance: f64,
    /// Exact token count.
    pub token_count: usize,
    /// Insertion timestamp; ties in importance evict older first.
    pub created_at: DateTime<Utc>,
}

/// Outcome of a ranked insert.
#[derive(Debug)]
pub enum RankedAdd<T> {
    /// The item was stored; these lower-ranked items made way for it.
    Inserted {
        /// Items evicted to make room, lowest importance first.
        evicted: Vec<RankedItem<T>>,
    },
    /// The item was not important enough to displace anything.
    Rejected(RankedItem<T>),
}

/// An observer invoked for each item evicted from a ranked layer.
pub type RankedEvictionCallback<T> = Box<dyn Fn(&RankedItem<T>) + Send + Sync>;

/// Importance-ranked token-budgeted container backing L2.
///
/// Eviction removes the lowest-importance entry; ties break by age (older
/// evicted first). An arrival that cannot displace the minimum is
/// rejected — the caller decides what to do with it (the façade offers it
/// to the L3 summarizer, so no information is silently lost).
pub struct RankedLayer<T> {
    items: Vec<RankedItem<T>>,
    budget: usize,
    used: usize,
    eviction_callbacks: Vec<RankedEvictionCallback<T>>,
}

impl<T> RankedLayer<T> {
    /// Create an empty ranked layer with the given token budget.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            items: Vec::new(),
            budget,
            used: 0,
            eviction_callbacks: Vec::new(),
        }
    }

    /// Register an observer invoked for each evicted item.
    pub fn on_eviction(&mut self, callback: RankedEvictionCallback<T>) {
        self.eviction_callbacks.push(callback);
    }

    fn min_index(&self) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.importance
                    .partial_cmp(&b.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // Ties: older first, so older compares smaller.
                    .then_with(|| b.created_at.cmp(&a.created_at))
            })
            .map(|(i, _)| i)
    }

    /// Insert an item, evicting strictly lower-importance entries as
    /// needed.
    pub fn add(&mut self, item: T, importance: f64, token_count: usize) -> RankedAdd<T> {
        let candidate = RankedItem {
            item,
            importance,
            token_count,
            created_at: Utc::now(),
        };
        let mut evicted = Vec::new();
        while self.used + token_count > self.budget {
            let Some(min_idx) = self.min_index() else {
                tracing::warn!(
                    token_count,
                    budget = self.budget,
                    "entry exceeds the entire tier budget, storing anyway"
                );
                break;
            };
            if candidate.importance > self.items[min_idx].importance {
                let victim = self.items.swap_remove(min_idx);
                self.used -= victim.token_count;
                evicted.push(victim);
            } else {
                // Evictions already taken still count: the caller re-offers
                // them downstream along with the rejected candidate.
                for victim in &evicted {
                    self.used += victim.token_count;
                }
                // Roll back by re-inserting what we pulled out.
                self.items.extend(evicted);
                return RankedAdd::Rejected(candidate);
            }
        }
        self.used += candidate.token_count;
        self.items.push(candidate);
        for victim in &evicted {
            for callback in &self.eviction_callbacks {
                callback(victim);
            }
        }
        RankedAdd::Inserted { evicted }
    }

    /// Items sorted by importance descending (ties: newer first).
    #[must_use]
    pub fn items_ranked(&self) -> Vec<&RankedItem<T>> {
        let mut refs: Vec<&RankedItem<T>> = self.items.iter().collect();
        refs.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        refs
    }

    /// `(item_count, token_usage)`.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        (self.items.len(), self.used)
    }

    /// The token budget.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
        self.used = 0;
    }

    /// Keep only items satisfying the predicate; returns the removed ones.
    pub fn retain(&mut self, mut keep: impl FnMut(&RankedItem<T>) -> bool) -> Vec<RankedItem<T>> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for entry in self.items.drain(..) {
            if keep(&entry) {
                kept.push(entry);
            } else {
                self.used -= entry.token_count;
                removed.push(entry);
            }
        }
        self.items = kept;
        removed
    }

    /// Remove the lowest-importance items until usage drops to at most
    /// `target_tokens`. Returns the removed items, least important first.
    pub fn drain_lowest_to(&mut self, target_tokens: usize) -> Vec<RankedItem<T>> {
        let mut drained = Vec::new();
        while self.used > target_tokens {
            let Some(min_idx) = self.min_index() else {
                break;
            };
            let victim = self.items.swap_remove(min_idx);
            self.used -= victim.token_count;
            drained.push(victim);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_fifo() {
        let mut layer = WindowLayer::new(30);
        assert!(layer.add("a", 10).is_empty());
        assert!(layer.add("b", 10).is_empty());
        assert!(layer.add("c", 10).is_empty());
        let evicted = layer.add("d", 10);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].item, "a");
        assert_eq!(layer.size(), (3, 30));
    }

    #[test]
    fn window_stores_oversized_item_after_emptying() {
        let mut layer = WindowLayer::new(20);
        layer.add("a", 10);
        layer.add("b", 10);
        let evicted = layer.add("huge", 50);
        assert_eq!(evicted.len(), 2);
        let (count, used) = layer.size();
        assert_eq!(count, 1);
        assert_eq!(used, 50);
    }

    #[test]
    fn ranked_rejects_lower_importance() {
        let mut layer = RankedLayer::new(20);
        assert!(matches!(
            layer.add("important", 0.9, 10),
            RankedAdd::Inserted { .. }
        ));
        assert!(matches!(
            layer.add("also", 0.8, 10),
            RankedAdd::Inserted { .. }
        ));
        // Full now; 0.3 cannot displace 0.8.
        assert!(matches!(
            layer.add("weak", 0.3, 10),
            RankedAdd::Rejected(_)
        ));
        assert_eq!(layer.size(), (2, 20));
    }

    #[test]
    fn ranked_evicts_minimum_for_higher_importance() {
        let mut layer = RankedLayer::new(20);
        layer.add("low", 0.2, 10);
        layer.add("mid", 0.5, 10);
        let outcome = layer.add("high", 0.9, 10);
        match outcome {
            RankedAdd::Inserted { evicted } => {
                assert_eq!(evicted.len(), 1);
                assert_eq!(evicted[0].item, "low");
            }
            RankedAdd::Rejected(_) => panic!("expected insert"),
        }
    }

    #[test]
    fn ranked_ties_evict_older_first() {
        let mut layer = RankedLayer::new(20);
        layer.add("older", 0.5, 10);
        layer.add("newer", 0.5, 10);
        let outcome = layer.add("winner", 0.9, 10);
        match outcome {
            RankedAdd::Inserted { evicted } => {
                assert_eq!(evicted[0].item, "older");
            }
            RankedAdd::Rejected(_) => panic!("expected insert"),
        }
    }

    #[test]
    fn ranked_rejection_restores_usage() {
        let mut layer = RankedLayer::new(25);
        layer.add("a", 0.4, 10);
        layer.add("b", 0.6, 10);
        // 15 tokens needed; can evict "a" (0.4 < 0.5) but then meets
        // "b" (0.6 > 0.5) and must reject; usage must be restored.
        let outcome = layer.add("c", 0.5, 20);
        assert!(matches!(outcome, RankedAdd::Rejected(_)));
        assert_eq!(layer.size(), (2, 20));
    }

    #[test]
    fn eviction_observers_fire() {
        use std::sync::{Arc, Mutex};
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let probe = seen.clone();
        let mut layer = WindowLayer::new(20);
        layer.on_eviction(Box::new(move |evicted| {
            probe.lock().unwrap().push(evicted.item);
        }));
        layer.add("a", 10);
        layer.add("b", 10);
        layer.add("c", 10);
        assert_eq!(*seen.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn ranked_eviction_observers_fire_only_on_real_evictions() {
        use std::sync::{Arc, Mutex};
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let probe = seen.clone();
        let mut layer = RankedLayer::new(20);
        layer.on_eviction(Box::new(move |evicted| {
            probe.lock().unwrap().push(evicted.item);
        }));
        layer.add("low", 0.2, 10);
        layer.add("mid", 0.5, 10);
        // Rejected arrival: nothing is evicted, nothing fires.
        layer.add("weak", 0.1, 10);
        assert!(seen.lock().unwrap().is_empty());
        // Displacement: the minimum fires.
        layer.add("high", 0.9, 10);
        assert_eq!(*seen.lock().unwrap(), vec!["low"]);
    }

    #[test]
    fn drain_lowest_removes_least_important() {
        let mut layer = RankedLayer::new(100);
        layer.add("a", 0.9, 20);
        layer.add("b", 0.1, 20);
        layer.add("c", 0.5, 20);
        let drained = layer.drain_lowest_to(40);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].item, "b");
        assert_eq!(layer.size(), (2, 40));
    }
}
