//! Operator registry for backward-chaining subgoals (spec.md §4.5
//! "Operators: arithmetic, comparison, `ask-user`").
//!
//! Grounded on `hir::diagnostics`'s pattern of a trait object per
//! pluggable check plus a name-keyed registry (here: predicate atom →
//! operator), and on SPEC_FULL.md's [AMBIENT] note that operator execution is
//! a real `async fn` racing a `tokio_util::sync::CancellationToken` +
//! `tokio::time::sleep` deadline rather than hand-rolled polling.

use crate::error::OperatorError;
use crate::term::Term;
use rustc_hash::FxHashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by a dyn `Operator`. Hand-written rather than via
/// an `async-trait`-style macro, since `tokio`/`tokio-util` are the only
/// async-ecosystem crates this workspace carries (see DESIGN.md).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An operator: given a fully ground argument list, produce a result term
/// (spec.md §4.5 "returns a term (possibly asynchronously)").
pub trait Operator: Send + Sync {
    fn call<'a>(&'a self, args: &'a [Term], cancel: CancellationToken) -> BoxFuture<'a, Result<Term, OperatorError>>;
}

pub struct OperatorRegistry {
    operators: FxHashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        OperatorRegistry { operators: FxHashMap::default() }
    }

    /// The built-in arithmetic/comparison/`ask-user` registry (spec.md
    /// §4.5); a host crate extends this with `register` for its own
    /// domain operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("+", Arc::new(Arithmetic(|a, b| a + b)));
        registry.register("-", Arc::new(Arithmetic(|a, b| a - b)));
        registry.register("*", Arc::new(Arithmetic(|a, b| a * b)));
        registry.register("/", Arc::new(Arithmetic(|a, b| a / b)));
        registry.register("<", Arc::new(Comparison(|a, b| a < b)));
        registry.register(">", Arc::new(Comparison(|a, b| a > b)));
        registry.register("<=", Arc::new(Comparison(|a, b| a <= b)));
        registry.register(">=", Arc::new(Comparison(|a, b| a >= b)));
        registry.register("ask-user", Arc::new(AskUser));
        registry
    }

    pub fn register(&mut self, predicate: &str, operator: Arc<dyn Operator>) {
        self.operators.insert(predicate.to_string(), operator);
    }

    pub fn get(&self, predicate: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(predicate).cloned()
    }

    pub async fn call(&self, predicate: &str, args: &[Term], cancel: CancellationToken) -> Result<Term, OperatorError> {
        let operator = self.get(predicate).ok_or_else(|| OperatorError::Unknown(predicate.to_string()))?;
        operator.call(args, cancel).await
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn as_f64(term: &Term, operator: &str) -> Result<f64, OperatorError> {
    term.atom_name()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| OperatorError::Failed {
            operator: operator.to_string(),
            explanation: format!("`{term}` is not a numeric atom"),
        })
}

struct Arithmetic(fn(f64, f64) -> f64);

impl Operator for Arithmetic {
    fn call<'a>(&'a self, args: &'a [Term], _cancel: CancellationToken) -> BoxFuture<'a, Result<Term, OperatorError>> {
        Box::pin(async move {
            if args.len() != 2 {
                return Err(OperatorError::Arity { operator: "arithmetic".to_string(), expected: 2, actual: args.len() });
            }
            let a = as_f64(&args[0], "arithmetic")?;
            let b = as_f64(&args[1], "arithmetic")?;
            Ok(Term::number_atom(&(self.0)(a, b).to_string()))
        })
    }
}

struct Comparison(fn(f64, f64) -> bool);

impl Operator for Comparison {
    fn call<'a>(&'a self, args: &'a [Term], _cancel: CancellationToken) -> BoxFuture<'a, Result<Term, OperatorError>> {
        Box::pin(async move {
            if args.len() != 2 {
                return Err(OperatorError::Arity { operator: "comparison".to_string(), expected: 2, actual: args.len() });
            }
            let a = as_f64(&args[0], "comparison")?;
            let b = as_f64(&args[1], "comparison")?;
            Ok(if (self.0)(a, b) { Term::atom("true") } else { Term::atom("false") })
        })
    }
}

/// Placeholder dialogue operator: a real deployment wires this to a
/// `DialogueRequest` event and an external response channel. Without a
/// wired responder this always reports `NoResponse`, distinct from an
/// explicit user cancellation (`OperatorError::Cancelled`) — DESIGN.md Open
/// Question (c).
struct AskUser;

impl Operator for AskUser {
    fn call<'a>(&'a self, _args: &'a [Term], cancel: CancellationToken) -> BoxFuture<'a, Result<Term, OperatorError>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(OperatorError::Cancelled("ask-user".to_string()));
            }
            Err(OperatorError::NoResponse("ask-user".to_string()))
        })
    }
}
