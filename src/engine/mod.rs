//! Forward/backward rule engine (spec.md §4.5).

pub mod forward;
pub mod operators;
pub mod query;
pub mod rules;

pub use forward::{forward_chain, ForwardStep};
pub use operators::{Operator, OperatorRegistry};
pub use query::{Answer, Bindings, GoalStep, GoalTrace, Query, QueryKind, VarId};
pub use rules::RuleStore;
