//! Engine-wide configuration (SPEC_FULL.md §6 [AMBIENT]).
//!
//! Loaded once and shared behind an `Arc`, the way `project`'s
//! workspace configuration is resolved once then read through shared refs.
//! No file format is promised (spec.md Non-goals) so this does not derive
//! `serde::{Serialize, Deserialize}` — only `Clone`/`Debug`, matching other
//! in-process configuration structs in this codebase's lineage.

use crate::ids::PartitionId;
use crate::tms::ResolutionStrategy;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub default_partition_capacity: usize,
    pub partition_capacity_overrides: FxHashMap<PartitionId, usize>,
    pub decay_rate: f64,
    pub access_boost: f64,
    pub depth_limit: u32,
    pub default_query_deadline: Duration,
    pub eviction_target_fraction: f64,
    pub protected_symbols: FxHashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut protected_symbols = FxHashSet::default();
        // Assertions built from the quantifier-skolemization machinery are
        // never evicted regardless of priority (SPEC_FULL.md §4.3).
        protected_symbols.insert("forall-marker".to_string());

        Config {
            default_partition_capacity: 100_000,
            partition_capacity_overrides: FxHashMap::default(),
            decay_rate: 0.01,
            access_boost: 0.1,
            depth_limit: 64,
            default_query_deadline: Duration::from_secs(5),
            eviction_target_fraction: 0.8,
            protected_symbols,
        }
    }
}

/// Resolves the configured resolution-strategy selector to a concrete
/// `ResolutionStrategy`. Currently the only built-in strategy is
/// "retract-weakest" (spec.md §4.4 default); pluggability is expressed by
/// taking a boxed trait object rather than an enum, so a host crate can
/// supply its own.
pub fn resolve_strategy(_name: &str) -> Arc<dyn ResolutionStrategy> {
    // "retract-weakest" (spec.md §4.4 default) is the only strategy shipped;
    // the signature stays name-based so a host crate can register others.
    Arc::new(crate::tms::RetractWeakest)
}
