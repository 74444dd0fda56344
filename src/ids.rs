//! Identifier types shared by the knowledge base, TMS, and pattern index.
//!
//! Internal ids that participate in deterministic ordering (`AssertionId`,
//! `RuleId`) are monotonic `u64` counters rather than UUIDs, so "ordered by
//! assertion id" and "ties broken by … higher id" (spec.md §4.2, §4.4) are
//! literal numeric comparisons. Partition ids are short, well-known strings
//! (`global`, `client-input`, per-note ids, …) so `smol_str::SmolStr` —
//! already in the dependency table — avoids an allocation for the
//! common case.

use smol_str::SmolStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// A knowledge-base partition id: `global`, `client-input`, `user-feedback`,
/// `ui-actions`, or a per-note id (spec.md §3, §6).
pub type PartitionId = SmolStr;

/// Well-known partition ids (spec.md §6).
pub mod well_known {
    use super::PartitionId;

    pub fn global() -> PartitionId {
        PartitionId::new("global")
    }
    pub fn client_input() -> PartitionId {
        PartitionId::new("client-input")
    }
    pub fn user_feedback() -> PartitionId {
        PartitionId::new("user-feedback")
    }
    pub fn ui_actions() -> PartitionId {
        PartitionId::new("ui-actions")
    }
}

macro_rules! monotonic_id {
    ($id:ident, $gen:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $id(u64);

        impl $id {
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $id {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        #[derive(Debug, Default)]
        pub struct $gen(AtomicU64);

        impl $gen {
            pub fn new() -> Self {
                Self(AtomicU64::new(0))
            }

            pub fn next(&self) -> $id {
                $id(self.0.fetch_add(1, Ordering::Relaxed))
            }
        }
    };
}

monotonic_id!(AssertionId, AssertionIdGen, "Monotonic id of a committed assertion.");
monotonic_id!(RuleId, RuleIdGen, "Monotonic id of a registered rule.");
