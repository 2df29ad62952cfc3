//! Property tests for the tier containers.

use fractal_memory::layers::{RankedAdd, RankedLayer, WindowLayer};
use proptest::prelude::*;

proptest! {
    /// The window never exceeds its budget as long as no single item does.
    #[test]
    fn window_budget_invariant(sizes in prop::collection::vec(1usize..=50, 1..60)) {
        let budget = 100usize;
        let mut layer = WindowLayer::new(budget);
        for (i, tokens) in sizes.into_iter().enumerate() {
            layer.add(i, tokens);
            let (_, used) = layer.size();
            prop_assert!(used <= budget);
        }
    }

    /// Window eviction is FIFO: evicted items come out in insertion order.
    #[test]
    fn window_eviction_is_fifo(sizes in prop::collection::vec(1usize..=50, 1..60)) {
        let mut layer = WindowLayer::new(100);
        let mut all_evicted = Vec::new();
        for (i, tokens) in sizes.into_iter().enumerate() {
            for evicted in layer.add(i, tokens) {
                all_evicted.push(evicted.item);
            }
        }
        let mut sorted = all_evicted.clone();
        sorted.sort_unstable();
        prop_assert_eq!(all_evicted, sorted);
    }

    /// The ranked layer never exceeds its budget and never evicts an item
    /// more important than one it keeps rejected.
    #[test]
    fn ranked_budget_invariant(
        entries in prop::collection::vec((1usize..=40, 0u32..=100), 1..60)
    ) {
        let budget = 100usize;
        let mut layer = RankedLayer::new(budget);
        for (i, (tokens, importance_pct)) in entries.into_iter().enumerate() {
            let importance = f64::from(importance_pct) / 100.0;
            match layer.add(i, importance, tokens) {
                RankedAdd::Inserted { evicted } => {
                    for victim in &evicted {
                        prop_assert!(victim.importance < importance);
                    }
                }
                RankedAdd::Rejected(_) => {}
            }
            let (_, used) = layer.size();
            prop_assert!(used <= budget);
        }
    }
}
