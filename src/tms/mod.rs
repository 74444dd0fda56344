//! Justification-based truth maintenance (spec.md §4.4).
//!
//! The justification DAG is kept as plain `AssertionId` edges — derived
//! assertion → premises, and the reverse (premise → dependents) for
//! cascading retraction — never as pointers into the KB, matching spec.md
//! §9(a): "no term or assertion holds a raw pointer to another." Grounded on
//! `hir/diagnostics.rs`'s style of accumulating a flat list of
//! outcomes from a single entry point rather than mutating shared state the
//! caller can't see.

use crate::ids::{AssertionId, PartitionId};
use crate::kb::{Assertion, KnowledgeBase};
use crate::term::Term;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Why an assertion was retracted (spec.md §4.4, §7 event taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractReason {
    /// Explicitly requested by a client `retract` command.
    Explicit,
    /// A premise this assertion depended on was itself retracted.
    PremiseRetracted,
    /// Chosen as the weaker side of a detected contradiction.
    ContradictionResolution,
    /// Selected by priority-driven eviction.
    Evicted,
}

#[derive(Debug, Clone)]
pub struct RetractionRecord {
    pub id: AssertionId,
    pub partition: PartitionId,
    pub reason: RetractReason,
}

#[derive(Debug, Clone)]
pub struct ContradictionRecord {
    pub partition: PartitionId,
    pub ids: Vec<AssertionId>,
}

#[derive(Debug, Clone, Default)]
pub struct AddOutcome {
    pub contradictions: Vec<ContradictionRecord>,
    pub auto_retracted: Vec<RetractionRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct RetractOutcome {
    pub retracted: Vec<RetractionRecord>,
}

/// Pluggable contradiction resolution (spec.md §4.4 "pluggable"). Given the
/// conflicting assertions (always active at call time), pick the one to
/// retract.
pub trait ResolutionStrategy: Send + Sync {
    fn choose(&self, conflicting: &[Arc<Assertion>]) -> AssertionId;
}

/// Default strategy: lowest priority; ties broken by greater depth, then
/// higher id (spec.md §4.4).
#[derive(Debug, Default, Clone, Copy)]
pub struct RetractWeakest;

impl ResolutionStrategy for RetractWeakest {
    fn choose(&self, conflicting: &[Arc<Assertion>]) -> AssertionId {
        let mut ranked: Vec<&Arc<Assertion>> = conflicting.iter().collect();
        ranked.sort_by(|a, b| {
            a.priority()
                .partial_cmp(&b.priority())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.depth.cmp(&a.depth))
                .then_with(|| b.id.cmp(&a.id))
        });
        ranked[0].id
    }
}

/// Negation predicate: `(not X)` — spec.md §4.4 "the atom `not` applied to
/// one argument."
fn negation_target(term: &Term) -> Option<Term> {
    if term.operator() == Some("not") && term.arity() == Some(1) {
        Some(term.as_list().unwrap()[1].clone())
    } else {
        None
    }
}

fn negate(term: &Term) -> Term {
    Term::list(vec![Term::atom("not"), term.clone()])
}

pub struct Tms {
    kb: Arc<KnowledgeBase>,
    /// Derived assertion id → the premises it was justified by. Ground input
    /// assertions map to an empty vec (spec.md §4.4 "a ground assertion
    /// derived from input has empty premises").
    justifications: RwLock<FxHashMap<AssertionId, Vec<AssertionId>>>,
    /// Premise id → set of assertion ids directly justified by it.
    dependents: RwLock<FxHashMap<AssertionId, FxHashSet<AssertionId>>>,
    /// Every assertion id the TMS has ever seen, so retraction can find an
    /// id's partition without the caller repeating it.
    partitions: RwLock<FxHashMap<AssertionId, PartitionId>>,
    strategy: Arc<dyn ResolutionStrategy>,
}

impl Tms {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self::with_strategy(kb, Arc::new(RetractWeakest))
    }

    pub fn with_strategy(kb: Arc<KnowledgeBase>, strategy: Arc<dyn ResolutionStrategy>) -> Self {
        Tms {
            kb,
            justifications: RwLock::new(FxHashMap::default()),
            dependents: RwLock::new(FxHashMap::default()),
            partitions: RwLock::new(FxHashMap::default()),
            strategy,
        }
    }

    pub fn justifications_of(&self, id: AssertionId) -> Vec<AssertionId> {
        self.justifications.read().get(&id).cloned().unwrap_or_default()
    }

    /// Record that `assertion` was derived from `premises`, then check for a
    /// contradiction with an active assertion already in the same partition
    /// and auto-resolve it if one is found (spec.md §4.4).
    pub fn add(&self, assertion: &Arc<Assertion>, premises: Vec<AssertionId>) -> AddOutcome {
        self.justifications.write().insert(assertion.id, premises.clone());
        self.partitions.write().insert(assertion.id, assertion.partition.clone());
        for premise in &premises {
            self.dependents.write().entry(*premise).or_default().insert(assertion.id);
        }

        let mut outcome = AddOutcome::default();
        let conflict_term = match negation_target(&assertion.term) {
            Some(inner) => inner,
            None => negate(&assertion.term),
        };
        let Some(opponent) = self.kb.find_exact(&assertion.partition, &conflict_term) else {
            return outcome;
        };
        if !opponent.is_active() || opponent.id == assertion.id {
            return outcome;
        }

        let ids = {
            let mut v = vec![assertion.id, opponent.id];
            v.sort();
            v
        };
        tracing::warn!(?ids, partition = %assertion.partition, "contradiction detected");
        outcome.contradictions.push(ContradictionRecord { partition: assertion.partition.clone(), ids });

        let loser = self.strategy.choose(&[Arc::clone(assertion), opponent]);
        let retraction = self.retract(loser, RetractReason::ContradictionResolution);
        outcome.auto_retracted = retraction.retracted;
        outcome
    }

    fn is_active(&self, id: AssertionId) -> Option<bool> {
        let partition = self.partitions.read().get(&id).cloned()?;
        self.kb.get(&partition, id).map(|a| a.is_active())
    }

    /// Whether `id` was ever committed through this TMS (as opposed to an id
    /// that never existed, e.g. a client-supplied typo).
    pub fn is_known(&self, id: AssertionId) -> bool {
        self.partitions.read().contains_key(&id)
    }

    fn has_active_support(&self, id: AssertionId) -> bool {
        self.justifications_of(id).iter().all(|p| self.is_active(*p).unwrap_or(false))
    }

    /// Deactivate `id` and cascade to every dependent that loses all active
    /// support as a result (spec.md §4.4 steps 2–3, §8 invariant 1 & 4).
    pub fn retract(&self, id: AssertionId, reason: RetractReason) -> RetractOutcome {
        let mut records = Vec::new();
        self.retract_inner(id, reason, &mut records);
        RetractOutcome { retracted: records }
    }

    fn retract_inner(&self, id: AssertionId, reason: RetractReason, records: &mut Vec<RetractionRecord>) {
        let Some(partition) = self.partitions.read().get(&id).cloned() else {
            tracing::warn!(%id, "retract requested for an id the TMS never recorded");
            return;
        };
        if !self.kb.deactivate(&partition, id) {
            return; // already inactive: idempotent no-op.
        }
        records.push(RetractionRecord { id, partition, reason });

        let dependents = self.dependents.read().get(&id).cloned().unwrap_or_default();
        for dependent in dependents {
            if self.is_active(dependent) == Some(true) && !self.has_active_support(dependent) {
                self.retract_inner(dependent, RetractReason::PremiseRetracted, records);
            }
        }
    }

    /// Invariant check (spec.md §8 invariant 1): every active assertion's
    /// justification premises are all active. Exposed for tests and for a
    /// periodic consistency sweep.
    pub fn check_invariant_active_premises(&self, partition: &PartitionId) -> bool {
        self.kb.all_active(partition).iter().all(|a| self.has_active_support(a.id))
    }

    /// Every assertion id still referenced as a premise of at least one
    /// active dependent — eviction-exempt regardless of priority (spec.md
    /// §4.3 "assertions still-referenced as premises of active derived
    /// assertions are exempt").
    pub fn active_premise_ids(&self) -> FxHashSet<AssertionId> {
        self.dependents
            .read()
            .iter()
            .filter(|(_, dependents)| dependents.iter().any(|d| self.is_active(*d) == Some(true)))
            .map(|(premise, _)| *premise)
            .collect()
    }
}
