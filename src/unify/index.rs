//! Discrimination structure over assertions, keyed on `(partition id,
//! operator atom of the head, arity, per-position constant summary)`
//! (spec.md §4.2).
//!
//! Grounded on the arena-plus-secondary-index shape of
//! `semantic/symbol_table/table.rs` (`symbols_by_qname`, `symbols_by_file`
//! as `HashMap` side indices over a single arena) generalized to multiple
//! partitions, each with its own bucket map, and on
//! `project/cached_stdlib.rs`'s `rayon`-parallel scan for the variable-headed
//! worst case.

use crate::ids::{AssertionId, PartitionId};
use crate::term::{AtomStr, Term};
use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    operator: Option<AtomStr>,
    arity: usize,
}

struct Bucket {
    members: BTreeSet<AssertionId>,
    /// Per argument position, the ids whose term has a concrete atom there,
    /// bucketed by that atom's name.
    pos_const: Vec<FxHashMap<AtomStr, BTreeSet<AssertionId>>>,
    /// Per argument position, the ids whose term has a variable (or other
    /// non-atom) there — always candidates regardless of a pattern's
    /// concrete value at that position.
    pos_unconstrained: Vec<BTreeSet<AssertionId>>,
}

impl Bucket {
    fn new(arity: usize) -> Self {
        Bucket {
            members: BTreeSet::new(),
            pos_const: (0..arity).map(|_| FxHashMap::default()).collect(),
            pos_unconstrained: (0..arity).map(|_| BTreeSet::new()).collect(),
        }
    }

    fn insert(&mut self, id: AssertionId, term: &Term) {
        self.members.insert(id);
        let items = term.as_list().expect("assertions are list terms");
        for (pos, arg) in items.iter().skip(1).enumerate() {
            match arg.atom_name() {
                Some(name) => {
                    self.pos_const[pos]
                        .entry(Arc::from(name))
                        .or_default()
                        .insert(id);
                }
                None => {
                    self.pos_unconstrained[pos].insert(id);
                }
            }
        }
    }

    fn remove(&mut self, id: AssertionId, term: &Term) {
        self.members.remove(&id);
        let items = term.as_list().expect("assertions are list terms");
        for (pos, arg) in items.iter().skip(1).enumerate() {
            match arg.atom_name() {
                Some(name) => {
                    if let Some(set) = self.pos_const[pos].get_mut(name) {
                        set.remove(&id);
                    }
                }
                None => {
                    self.pos_unconstrained[pos].remove(&id);
                }
            }
        }
    }

    /// Candidate ids for `pattern`'s arguments, narrowed by whichever
    /// positions the pattern holds a concrete atom at. Always a superset of
    /// actual matches.
    fn candidates(&self, pattern_args: &[Term]) -> Vec<AssertionId> {
        let mut candidates: BTreeSet<AssertionId> = self.members.clone();
        for (pos, arg) in pattern_args.iter().enumerate() {
            if pos >= self.pos_const.len() {
                break;
            }
            if let Some(name) = arg.atom_name() {
                let mut allowed = self.pos_unconstrained[pos].clone();
                if let Some(with_const) = self.pos_const[pos].get(name) {
                    allowed.extend(with_const.iter().copied());
                }
                candidates = candidates.intersection(&allowed).copied().collect();
            }
        }
        candidates.into_iter().collect()
    }
}

struct StoredInfo {
    partition: PartitionId,
    key: BucketKey,
    term: Term,
}

/// The pattern index. One instance is shared (behind `Arc`) by the knowledge
/// base and the rule engine.
#[derive(Default)]
pub struct PatternIndex {
    buckets: RwLock<FxHashMap<(PartitionId, BucketKey), Arc<RwLock<Bucket>>>>,
    all_ids: RwLock<FxHashMap<PartitionId, BTreeSet<AssertionId>>>,
    info: RwLock<FxHashMap<AssertionId, StoredInfo>>,
}

impl PatternIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(term: &Term) -> BucketKey {
        let operator = term.operator().map(Arc::from);
        let arity = term.arity().unwrap_or(0);
        BucketKey { operator, arity }
    }

    fn bucket_for(&self, partition: &PartitionId, key: &BucketKey) -> Arc<RwLock<Bucket>> {
        if let Some(b) = self.buckets.read().get(&(partition.clone(), key.clone())) {
            return Arc::clone(b);
        }
        let mut guard = self.buckets.write();
        Arc::clone(
            guard
                .entry((partition.clone(), key.clone()))
                .or_insert_with(|| Arc::new(RwLock::new(Bucket::new(key.arity)))),
        )
    }

    /// Insert an assertion's term into the index under `partition`.
    pub fn insert(&self, partition: PartitionId, id: AssertionId, term: Term) {
        let key = Self::key_for(&term);
        let bucket = self.bucket_for(&partition, &key);
        bucket.write().insert(id, &term);
        self.all_ids.write().entry(partition.clone()).or_default().insert(id);
        self.info.write().insert(id, StoredInfo { partition, key, term });
    }

    /// Remove a previously inserted assertion by id.
    pub fn remove(&self, id: AssertionId) {
        let Some(stored) = self.info.write().remove(&id) else {
            return;
        };
        if let Some(bucket) = self.buckets.read().get(&(stored.partition.clone(), stored.key.clone())) {
            bucket.write().remove(id, &stored.term);
        }
        if let Some(ids) = self.all_ids.write().get_mut(&stored.partition) {
            ids.remove(&id);
        }
    }

    /// Superset-complete candidate ids for `pattern` within `partition`,
    /// returned in deterministic ascending-id order. A variable-headed
    /// pattern falls back to a full partition scan, parallelized with rayon
    /// (spec.md §4.2: "return at most O(N_partition) in that worst case").
    pub fn candidates_matching(&self, partition: &PartitionId, pattern: &Term) -> Vec<AssertionId> {
        match pattern.operator() {
            Some(_) => {
                let key = Self::key_for(pattern);
                let Some(bucket) = self.buckets.read().get(&(partition.clone(), key)).cloned() else {
                    return Vec::new();
                };
                let args = pattern.as_list().map(|l| &l[1..]).unwrap_or(&[]);
                bucket.read().candidates(args)
            }
            None => {
                // Variable-headed (or non-list) pattern: full partition scan.
                let Some(ids) = self.all_ids.read().get(partition).cloned() else {
                    return Vec::new();
                };
                let mut out: Vec<AssertionId> = ids.par_iter().copied().collect();
                out.par_sort_unstable();
                out
            }
        }
    }

    pub fn partition_size(&self, partition: &PartitionId) -> usize {
        self.all_ids.read().get(partition).map(BTreeSet::len).unwrap_or(0)
    }
}
