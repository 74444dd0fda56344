//! Knowledge base: partitioned assertion storage with commit, subsumption,
//! priority, and eviction (spec.md §4.3).
//!
//! Grounded on `semantic/symbol_table/table.rs`'s shape (an arena of
//! records plus secondary indices, mutated behind a single entry point
//! that also drives indexing) generalized to multiple independently
//! locked partitions.

pub mod assertion;
mod eviction;
mod partition;
pub mod rule;

pub use assertion::{classify, Assertion, AssertionKind, PotentialAssertion};
pub use partition::Partition;
pub use rule::Rule;

use crate::ids::{AssertionId, AssertionIdGen, PartitionId};
use crate::term::Term;
use crate::unify::{match_pattern, PatternIndex};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Outcome of a `KnowledgeBase::commit` call (spec.md §4.3, §7).
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// A new assertion was created and indexed.
    Created(Arc<Assertion>),
    /// The term was trivial (e.g. `(= x x)`) and was silently discarded.
    Trivial,
    /// An existing (at least as general) active assertion already covers
    /// this term; that assertion's priority was boosted instead.
    Subsumed(Arc<Assertion>),
}

pub struct KnowledgeBase {
    partitions: RwLock<FxHashMap<PartitionId, Arc<Partition>>>,
    default_capacity: usize,
    /// Per-partition capacity overrides (spec.md §3 "each partition has a
    /// bounded capacity"), applied both to partitions created after the
    /// override is set and, via `set_capacity`, to ones that already exist.
    capacity_overrides: RwLock<FxHashMap<PartitionId, usize>>,
    id_gen: AssertionIdGen,
    pub index: Arc<PatternIndex>,
}

impl KnowledgeBase {
    pub fn new(default_capacity: usize) -> Self {
        KnowledgeBase {
            partitions: RwLock::new(FxHashMap::default()),
            default_capacity,
            capacity_overrides: RwLock::new(FxHashMap::default()),
            id_gen: AssertionIdGen::new(),
            index: Arc::new(PatternIndex::new()),
        }
    }

    pub fn partition(&self, id: &PartitionId) -> Arc<Partition> {
        if let Some(p) = self.partitions.read().get(id) {
            return Arc::clone(p);
        }
        let mut guard = self.partitions.write();
        let default_capacity = self.default_capacity;
        let overrides = self.capacity_overrides.read();
        let capacity = overrides.get(id).copied().unwrap_or(default_capacity);
        Arc::clone(guard.entry(id.clone()).or_insert_with(|| Arc::new(Partition::new(capacity))))
    }

    /// Reconfigure `id`'s capacity in place without disturbing its
    /// assertions, whether or not the partition has been created yet.
    pub fn set_capacity(&self, id: &PartitionId, capacity: usize) {
        self.capacity_overrides.write().insert(id.clone(), capacity);
        if let Some(partition) = self.partitions.read().get(id) {
            partition.set_capacity(capacity);
        }
    }

    /// Term is trivial: a reflexive ground equality `(= x x)` with
    /// structurally equal sides (spec.md §4.3 step 1).
    fn is_trivial(term: &Term) -> bool {
        if term.operator() == Some("=") && term.arity() == Some(2) {
            let items = term.as_list().unwrap();
            return items[1] == items[2];
        }
        false
    }

    /// Canonicalize an equality so `weight(lhs) > weight(rhs)` (spec.md
    /// §4.3 step 2, §3 oriented equality).
    fn orient_equality(term: &Term) -> Term {
        if term.operator() != Some("=") || term.arity() != Some(2) {
            return term.clone();
        }
        let items = term.as_list().unwrap();
        let (lhs, rhs) = (&items[1], &items[2]);
        if lhs.weight() > rhs.weight() {
            term.clone()
        } else {
            Term::list(vec![items[0].clone(), rhs.clone(), lhs.clone()])
        }
    }

    /// Commit a potential assertion. See spec.md §4.3 for the full pipeline.
    ///
    /// Subsumption (step 3) reuses `PatternIndex::candidates_matching`: the
    /// candidates it returns for `term` are exactly the stored terms whose
    /// bucket could unify with it, and testing each as the *pattern* side of
    /// `unify::match_pattern` against `term` as the *instance* side is the
    /// one-way subsumption check (spec.md §4.1 one-way matcher).
    ///
    /// Contradiction detection against the TMS's justification graph and
    /// `Asserted`-event emission are deliberately not done here: both need
    /// state this module doesn't own, so the caller (the cognition context)
    /// sequences `commit` → TMS contradiction check → bus publish.
    pub fn commit(&self, potential: PotentialAssertion) -> CommitOutcome {
        if Self::is_trivial(&potential.term) {
            tracing::debug!(term = %potential.term, "discarding trivial assertion");
            return CommitOutcome::Trivial;
        }

        let term = Self::orient_equality(&potential.term);
        let partition_id = potential.partition.clone();
        let partition = self.partition(&partition_id);

        let _guard = partition.monitor.lock();

        let candidates = self.index.candidates_matching(&partition_id, &term);
        if let Some(existing) = candidates
            .into_iter()
            .filter_map(|id| partition.get(id))
            .find(|existing| existing.is_active() && match_pattern(&existing.term, &term).is_ok())
        {
            existing.boost(0.1);
            tracing::debug!(id = %existing.id, "subsumed by existing assertion, boosting priority");
            return CommitOutcome::Subsumed(existing);
        }

        let kind = classify(&term);
        let priority = (potential.base_priority / (1.0 + term.weight() as f64)).clamp(0.0, 1.0);
        let assertion = Arc::new(Assertion::new(
            self.id_gen.next(),
            term.clone(),
            kind,
            priority,
            potential.source_id,
            potential.source_note_id,
            potential.depth,
            potential.justifications,
            partition_id.clone(),
            potential.quantified_vars,
        ));

        partition.insert(Arc::clone(&assertion));
        self.index.insert(partition_id, assertion.id, term);
        tracing::trace!(id = %assertion.id, "committed assertion");
        CommitOutcome::Created(assertion)
    }

    pub fn get(&self, partition: &PartitionId, id: AssertionId) -> Option<Arc<Assertion>> {
        self.partition(partition).get(id)
    }

    /// Exact structural-id lookup among active assertions.
    pub fn find_exact(&self, partition: &PartitionId, term: &Term) -> Option<Arc<Assertion>> {
        let key = term.structural_id();
        self.index
            .candidates_matching(partition, term)
            .into_iter()
            .filter_map(|id| self.partition(partition).get(id))
            .find(|a| a.is_active() && a.term.structural_id() == key)
    }

    /// Assertions whose term unifies with `pattern` (superset from the
    /// index, filtered to real matches here).
    pub fn find_by_pattern(&self, partition: &PartitionId, pattern: &Term) -> Vec<Arc<Assertion>> {
        self.index
            .candidates_matching(partition, pattern)
            .into_iter()
            .filter_map(|id| self.partition(partition).get(id))
            .filter(|a| a.is_active())
            .collect()
    }

    pub fn all_active(&self, partition: &PartitionId) -> Vec<Arc<Assertion>> {
        self.partition(partition).all_active()
    }

    pub fn assertion_count(&self, partition: &PartitionId) -> usize {
        self.partition(partition).active_count()
    }

    /// Retract (deactivate + unindex) a single assertion, without cascading.
    /// Cascading retraction is the TMS's responsibility (spec.md §4.4).
    pub fn deactivate(&self, partition: &PartitionId, id: AssertionId) -> bool {
        let Some(assertion) = self.partition(partition).get(id) else {
            return false;
        };
        let transitioned = assertion.deactivate();
        if transitioned {
            self.index.remove(id);
        }
        transitioned
    }

    /// Apply one priority-decay tick to every active assertion in `partition`.
    pub fn decay(&self, partition: &PartitionId, decay_rate: f64) {
        for assertion in self.partition(partition).all_active() {
            assertion.decay(decay_rate);
        }
    }

    pub fn touch(&self, partition: &PartitionId, id: AssertionId, increment: f64) {
        if let Some(assertion) = self.partition(partition).get(id) {
            assertion.boost(increment);
        }
    }

    /// Select eviction candidates for `partition` without mutating anything;
    /// the caller (via the TMS) retracts each one so cascading/contradiction
    /// bookkeeping stays centralized (spec.md §4.3, §4.4).
    pub fn eviction_candidates(
        &self,
        partition: &PartitionId,
        target_fraction: f64,
        protected_ids: &FxHashSet<AssertionId>,
        protected_symbols: &FxHashSet<String>,
    ) -> Vec<AssertionId> {
        let p = self.partition(partition);
        if p.active_count() <= p.capacity() {
            return Vec::new();
        }
        eviction::select_eviction_candidates(
            &p.all_active(),
            p.capacity(),
            target_fraction,
            protected_ids,
            protected_symbols,
        )
    }

    pub fn capacity(&self, partition: &PartitionId) -> usize {
        self.partition(partition).capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::parser::parse_one;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(100)
    }

    fn global() -> PartitionId {
        crate::ids::well_known::global()
    }

    #[test]
    fn commits_a_ground_fact() {
        let kb = kb();
        let term = parse_one("(likes alice bob)").unwrap();
        let outcome = kb.commit(PotentialAssertion::new(term, global()));
        assert!(matches!(outcome, CommitOutcome::Created(_)));
        assert_eq!(kb.assertion_count(&global()), 1);
    }

    #[test]
    fn rejects_trivial_reflexive_equality() {
        let kb = kb();
        let term = parse_one("(= ?x ?x)").unwrap();
        let outcome = kb.commit(PotentialAssertion::new(term, global()));
        assert!(matches!(outcome, CommitOutcome::Trivial));
        assert_eq!(kb.assertion_count(&global()), 0);
    }

    #[test]
    fn orients_equality_by_weight() {
        let kb = kb();
        let term = parse_one("(= a (f b c))").unwrap();
        let outcome = kb.commit(PotentialAssertion::new(term, global()));
        let CommitOutcome::Created(assertion) = outcome else { panic!("expected Created") };
        let items = assertion.term.as_list().unwrap();
        assert_eq!(items[1].atom_name(), None);
        assert_eq!(items[2].atom_name(), Some("a"));
    }

    #[test]
    fn duplicate_ground_fact_is_subsumed() {
        let kb = kb();
        let term = parse_one("(likes alice bob)").unwrap();
        kb.commit(PotentialAssertion::new(term.clone(), global()));
        let outcome = kb.commit(PotentialAssertion::new(term, global()));
        assert!(matches!(outcome, CommitOutcome::Subsumed(_)));
        assert_eq!(kb.assertion_count(&global()), 1);
    }

    #[test]
    fn universal_subsumes_ground_instance() {
        let kb = kb();
        let universal = parse_one("(likes alice ?x)").unwrap();
        kb.commit(PotentialAssertion::new(universal, global()));
        let ground = parse_one("(likes alice bob)").unwrap();
        let outcome = kb.commit(PotentialAssertion::new(ground, global()));
        assert!(matches!(outcome, CommitOutcome::Subsumed(_)));
        assert_eq!(kb.assertion_count(&global()), 1);
    }

    #[test]
    fn deactivate_removes_from_pattern_index() {
        let kb = kb();
        let term = parse_one("(likes alice bob)").unwrap();
        let CommitOutcome::Created(assertion) = kb.commit(PotentialAssertion::new(term.clone(), global())) else {
            panic!("expected Created")
        };
        assert!(kb.deactivate(&global(), assertion.id));
        assert!(!assertion.is_active());
        assert!(kb.find_exact(&global(), &term).is_none());
        // idempotent
        assert!(!kb.deactivate(&global(), assertion.id));
    }

    #[test]
    fn eviction_candidates_respects_capacity() {
        let kb = kb();
        kb.set_capacity(&global(), 5);
        for i in 0..10 {
            let term = parse_one(&format!("(fact{i} a)")).unwrap();
            kb.commit(PotentialAssertion::new(term, global()).with_priority((i as f64) / 10.0));
        }
        let evicted = kb.eviction_candidates(&global(), 0.8, &FxHashSet::default(), &FxHashSet::default());
        assert!(!evicted.is_empty());
    }

    #[test]
    fn set_capacity_on_populated_partition_keeps_assertions() {
        let kb = kb();
        let term = parse_one("(likes alice bob)").unwrap();
        kb.commit(PotentialAssertion::new(term, global()));
        assert_eq!(kb.assertion_count(&global()), 1);

        kb.set_capacity(&global(), 1);
        assert_eq!(kb.assertion_count(&global()), 1, "reconfiguring capacity must not drop assertions");
        assert_eq!(kb.capacity(&global()), 1);
    }

    #[test]
    fn capacity_override_applies_before_partition_is_first_touched() {
        let kb = kb();
        kb.set_capacity(&global(), 7);
        assert_eq!(kb.capacity(&global()), 7, "override set before the partition exists must still apply");
    }
}
