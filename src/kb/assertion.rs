//! `Assertion`: a committed term plus the bookkeeping the KB and TMS need
//! (spec.md §3).

use crate::ids::{AssertionId, PartitionId};
use crate::term::Term;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;
use uuid::Uuid;

/// How an assertion was classified at commit time. Orthogonal properties
/// (equality orientation, negation) are folded into one tag here because
/// spec.md §3 describes `kind` as a single enum; the commit pipeline picks
/// the most specific applicable variant (equality/negation before
/// quantification) — see DESIGN.md Open Questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionKind {
    Ground,
    Universal,
    Skolemized,
    Equality { oriented: bool },
    Negated,
}

/// A committed assertion. Priority and the active flag are updated via
/// atomic read-modify-write (spec.md §5 "shared-resource policy") so readers
/// never need to lock the owning partition just to read a snapshot.
#[derive(Debug)]
pub struct Assertion {
    pub id: AssertionId,
    pub term: Term,
    pub kind: AssertionKind,
    priority_bits: AtomicU64,
    pub source_id: Uuid,
    pub source_note_id: Option<Uuid>,
    pub created_at: SystemTime,
    pub depth: u32,
    pub justifications: Vec<AssertionId>,
    active: AtomicBool,
    pub partition: PartitionId,
    pub quantified_vars: Vec<Term>,
}

impl Assertion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AssertionId,
        term: Term,
        kind: AssertionKind,
        priority: f64,
        source_id: Uuid,
        source_note_id: Option<Uuid>,
        depth: u32,
        justifications: Vec<AssertionId>,
        partition: PartitionId,
        quantified_vars: Vec<Term>,
    ) -> Self {
        Assertion {
            id,
            term,
            kind,
            priority_bits: AtomicU64::new(priority.to_bits()),
            source_id,
            source_note_id,
            created_at: SystemTime::now(),
            depth,
            justifications,
            active: AtomicBool::new(true),
            partition,
            quantified_vars,
        }
    }

    pub fn priority(&self) -> f64 {
        f64::from_bits(self.priority_bits.load(Ordering::Relaxed))
    }

    pub fn set_priority(&self, value: f64) {
        self.priority_bits.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Boost priority by `increment`, capped at 1.0 (spec.md §4.3).
    pub fn boost(&self, increment: f64) {
        let mut current = self.priority_bits.load(Ordering::Relaxed);
        loop {
            let value = (f64::from_bits(current) + increment).min(1.0);
            match self.priority_bits.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Exponential priority decay tick: `p ← p·(1−decay_rate)`.
    pub fn decay(&self, decay_rate: f64) {
        let mut current = self.priority_bits.load(Ordering::Relaxed);
        loop {
            let value = f64::from_bits(current) * (1.0 - decay_rate);
            match self.priority_bits.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark inactive. Returns `true` if this call actually transitioned the
    /// assertion (idempotent retraction is a no-op, not an error).
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub fn is_equality(&self) -> bool {
        matches!(self.kind, AssertionKind::Equality { .. })
    }

    pub fn is_negated(&self) -> bool {
        matches!(self.kind, AssertionKind::Negated) || self.term.operator() == Some("not")
    }
}

/// Classify a (post-orientation) term into its `AssertionKind`.
pub fn classify(term: &Term) -> AssertionKind {
    match term.operator() {
        Some("=") if term.arity() == Some(2) => {
            let items = term.as_list().unwrap();
            AssertionKind::Equality { oriented: items[1].weight() > items[2].weight() }
        }
        Some("not") => AssertionKind::Negated,
        _ if term.contains_skolem() => AssertionKind::Skolemized,
        _ if term.contains_variable() => AssertionKind::Universal,
        _ => AssertionKind::Ground,
    }
}

/// A not-yet-committed assertion produced by input ingestion or forward
/// chaining (spec.md §4.3 "Commit. Input is a potential assertion…").
#[derive(Debug, Clone)]
pub struct PotentialAssertion {
    pub term: Term,
    pub base_priority: f64,
    pub justifications: Vec<AssertionId>,
    pub depth: u32,
    pub partition: PartitionId,
    pub source_id: Uuid,
    pub source_note_id: Option<Uuid>,
    pub quantified_vars: Vec<Term>,
}

impl PotentialAssertion {
    pub fn new(term: Term, partition: PartitionId) -> Self {
        let quantified_vars = if term.contains_variable() { term.free_variables() } else { Vec::new() };
        PotentialAssertion {
            term,
            base_priority: 0.5,
            justifications: Vec::new(),
            depth: 0,
            partition,
            source_id: Uuid::new_v4(),
            source_note_id: None,
            quantified_vars,
        }
    }

    pub fn with_priority(mut self, base_priority: f64) -> Self {
        self.base_priority = base_priority;
        self
    }

    pub fn with_justifications(mut self, justifications: Vec<AssertionId>) -> Self {
        self.justifications = justifications;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_source_note(mut self, note: Uuid) -> Self {
        self.source_note_id = Some(note);
        self
    }
}
