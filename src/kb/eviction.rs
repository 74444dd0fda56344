//! Priority-driven eviction (spec.md §4.3, §8 invariant 6).
//!
//! The candidate scan is independent per assertion, so it is run with
//! `rayon`'s parallel iterators the way `project/cached_stdlib.rs`
//! parallel-scans its stdlib file set.

use super::assertion::Assertion;
use crate::ids::AssertionId;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Select the lowest-priority non-protected active assertions to evict so
/// that the partition's active count falls to `target_fraction · capacity`.
///
/// `protected_ids` are assertions still referenced as premises of an active
/// derived assertion; `protected_symbols` are operator atoms whose
/// assertions are always exempt (spec.md §4.3, §6).
pub fn select_eviction_candidates(
    active: &[Arc<Assertion>],
    capacity: usize,
    target_fraction: f64,
    protected_ids: &FxHashSet<AssertionId>,
    protected_symbols: &FxHashSet<String>,
) -> Vec<AssertionId> {
    let target = (target_fraction * capacity as f64).ceil() as usize;
    if active.len() <= target {
        return Vec::new();
    }

    let is_protected = |a: &Arc<Assertion>| -> bool {
        protected_ids.contains(&a.id)
            || a.term
                .operator()
                .map(|op| protected_symbols.contains(op))
                .unwrap_or(false)
    };

    let mut evictable: Vec<&Arc<Assertion>> = active.par_iter().filter(|a| !is_protected(a)).collect();
    // Lowest priority first; ties broken by lower id for determinism.
    evictable.par_sort_unstable_by(|a, b| {
        a.priority()
            .partial_cmp(&b.priority())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let protected_count = active.len() - evictable.len();
    let to_evict = active.len().saturating_sub(target.max(protected_count));
    evictable.into_iter().take(to_evict).map(|a| a.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AssertionIdGen;
    use crate::kb::assertion::{classify, Assertion};
    use crate::term::parser::parse_one;
    use uuid::Uuid;

    fn make(id_gen: &AssertionIdGen, text: &str, priority: f64) -> Arc<Assertion> {
        let term = parse_one(text).unwrap();
        let kind = classify(&term);
        Arc::new(Assertion::new(
            id_gen.next(),
            term,
            kind,
            priority,
            Uuid::new_v4(),
            None,
            0,
            Vec::new(),
            crate::ids::well_known::global(),
            Vec::new(),
        ))
    }

    #[test]
    fn evicts_lowest_priority_first() {
        let gen = AssertionIdGen::new();
        let assertions: Vec<_> = (0..10)
            .map(|i| make(&gen, &format!("(fact{i} a)"), i as f64 / 10.0))
            .collect();
        let evicted = select_eviction_candidates(
            &assertions,
            10,
            0.8,
            &FxHashSet::default(),
            &FxHashSet::default(),
        );
        // target = ceil(0.8*10) = 8, so 2 lowest-priority assertions evicted.
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0], assertions[0].id);
        assert_eq!(evicted[1], assertions[1].id);
    }

    #[test]
    fn protected_ids_are_never_evicted() {
        let gen = AssertionIdGen::new();
        let assertions: Vec<_> = (0..5)
            .map(|i| make(&gen, &format!("(fact{i} a)"), i as f64 / 10.0))
            .collect();
        let mut protected = FxHashSet::default();
        protected.insert(assertions[0].id);
        let evicted = select_eviction_candidates(&assertions, 5, 0.2, &protected, &FxHashSet::default());
        assert!(!evicted.contains(&assertions[0].id));
    }

    #[test]
    fn protected_symbols_are_never_evicted() {
        let gen = AssertionIdGen::new();
        let assertions = vec![
            make(&gen, "(likes a b)", 0.01),
            make(&gen, "(forall-marker x)", 0.01),
        ];
        let mut symbols = FxHashSet::default();
        symbols.insert("forall-marker".to_string());
        let evicted = select_eviction_candidates(&assertions, 2, 0.4, &FxHashSet::default(), &symbols);
        assert_eq!(evicted, vec![assertions[0].id]);
    }
}
