//! Per-subsystem error types (spec.md §7, SPEC_FULL.md §7 ambient additions).
//!
//! Follows `interchange::error::InterchangeError`'s shape: one
//! `thiserror`-derived enum per subsystem, `#[from]` where one error wraps
//! another, short `#[error("…")]` messages without embedding the whole
//! offending value.

pub use crate::term::parser::ParseError as TermParseError;

/// A client `Command` was malformed or referred to something that doesn't
/// exist (spec.md §6 command surface).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("parse error: {0}")]
    Parse(#[from] TermParseError),
    #[error("unknown assertion id {0}")]
    UnknownAssertion(crate::ids::AssertionId),
    #[error("unknown rule id {0}")]
    UnknownRule(crate::ids::RuleId),
    #[error("term `{0}` is not a well-formed rule, assertion, or query")]
    NotClassifiable(String),
}

/// An operator invocation failed (spec.md §7 "operator error: propagated as
/// subgoal failure + explanation").
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("no operator registered for `{0}`")]
    Unknown(String),
    #[error("operator `{operator}` expected {expected} argument(s), got {actual}")]
    Arity { operator: String, expected: usize, actual: usize },
    #[error("operator `{operator}` failed: {explanation}")]
    Failed { operator: String, explanation: String },
    #[error("operator `{0}` was explicitly cancelled")]
    Cancelled(String),
    #[error("operator `{0}` produced no response before the query deadline")]
    NoResponse(String),
}
