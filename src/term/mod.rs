//! Term algebra: atoms, variables, lists, structural hashing and weight.
//!
//! Terms are immutable and freely shared (§5 shared-resource policy): a
//! `Term` is a cheap-to-clone handle (`Arc<TermData>`) around content that is
//! never mutated after construction. Weight and the variable/skolem flags
//! are computed once at construction time and cached in the term identity,
//! per spec.md §4.1.

mod intern;
pub mod parser;
mod printer;
mod subst;

pub use intern::{AtomStr, Interner};
pub use parser::{ParseError, ParseErrorKind, parse_all, parse_one};
pub use printer::print_term;
pub use subst::Substitution;

use std::sync::Arc;
use std::sync::LazyLock;

/// Global atom interner. Mirrors the pattern of lazily-initialized shared
/// tables (`project::cached_stdlib` uses `std::sync::LazyLock` for its
/// parallel-loaded stdlib cache); here it dedups every atom/variable name
/// that ever crosses the parser or is constructed programmatically.
static INTERNER: LazyLock<Interner> = LazyLock::new(Interner::new);

/// Distinguishes parser-relevant atom subkinds. Semantics are always opaque
/// unless an operator interprets them (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomKind {
    /// A bare symbolic constant, e.g. `alice`, `parent`, `=>`.
    Symbol,
    /// A quoted string literal, e.g. `"hello world"`.
    Str,
    /// A numeric literal, e.g. `42`, `-3.5`.
    Number,
    /// A Skolem constant introduced to eliminate an existential quantifier.
    Skolem,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum TermKind {
    Atom { name: AtomStr, kind: AtomKind },
    Var { name: AtomStr },
    List(Arc<[Term]>),
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct TermData {
    kind: TermKind,
    weight: u32,
    has_var: bool,
    has_skolem: bool,
}

/// A KIF-like term: an atom, a variable, or a list of terms.
///
/// Cloning a `Term` is an `Arc` refcount bump. Equality and hashing are
/// structural (derived through `TermData`'s derive), matching spec.md's
/// "equality is structural" invariant.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Term(Arc<TermData>);

impl std::fmt::Debug for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", print_term(self))
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", print_term(self))
    }
}

impl Term {
    /// Intern `name` and construct a plain symbolic atom.
    pub fn atom(name: &str) -> Term {
        Self::atom_kind(name, AtomKind::Symbol)
    }

    pub fn string_atom(value: &str) -> Term {
        Self::atom_kind(value, AtomKind::Str)
    }

    pub fn number_atom(text: &str) -> Term {
        Self::atom_kind(text, AtomKind::Number)
    }

    pub fn skolem(name: &str) -> Term {
        Self::atom_kind(name, AtomKind::Skolem)
    }

    fn atom_kind(name: &str, kind: AtomKind) -> Term {
        let name = INTERNER.intern(name);
        let has_skolem = matches!(kind, AtomKind::Skolem);
        Term(Arc::new(TermData {
            kind: TermKind::Atom { name, kind },
            weight: 1,
            has_var: false,
            has_skolem,
        }))
    }

    /// Construct a variable. `name` must begin with `?`; this is enforced by
    /// the parser, but programmatic construction trusts the caller (internal
    /// API, not a system boundary — see `error` module doc for the
    /// validate-at-the-boundary policy).
    pub fn var(name: &str) -> Term {
        let name = INTERNER.intern(name);
        Term(Arc::new(TermData {
            kind: TermKind::Var { name },
            weight: 1,
            has_var: true,
            has_skolem: false,
        }))
    }

    /// Construct a list term, computing weight and variable/skolem flags
    /// from its children in one pass.
    pub fn list(children: Vec<Term>) -> Term {
        let weight = 1 + children.iter().map(|c| c.weight()).sum::<u32>();
        let has_var = children.iter().any(|c| c.contains_variable());
        let has_skolem = children.iter().any(|c| c.contains_skolem());
        Term(Arc::new(TermData {
            kind: TermKind::List(Arc::from(children)),
            weight,
            has_var,
            has_skolem,
        }))
    }

    pub fn empty_list() -> Term {
        Term::list(Vec::new())
    }

    pub fn weight(&self) -> u32 {
        self.0.weight
    }

    pub fn contains_variable(&self) -> bool {
        self.0.has_var
    }

    pub fn contains_skolem(&self) -> bool {
        self.0.has_skolem
    }

    pub fn is_atom(&self) -> bool {
        matches!(self.0.kind, TermKind::Atom { .. })
    }

    pub fn is_var(&self) -> bool {
        matches!(self.0.kind, TermKind::Var { .. })
    }

    pub fn is_list(&self) -> bool {
        matches!(self.0.kind, TermKind::List(_))
    }

    pub fn atom_name(&self) -> Option<&str> {
        match &self.0.kind {
            TermKind::Atom { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn atom_kind(&self) -> Option<AtomKind> {
        match &self.0.kind {
            TermKind::Atom { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn var_name(&self) -> Option<&str> {
        match &self.0.kind {
            TermKind::Var { name } => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match &self.0.kind {
            TermKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn arity(&self) -> Option<usize> {
        self.as_list().map(|items| items.len().saturating_sub(1))
    }

    /// The conventional first element of a list, when it is an atom: the
    /// "operator" or predicate of the term (spec.md §3).
    pub fn operator(&self) -> Option<&str> {
        self.as_list()?.first()?.atom_name()
    }

    /// Every distinct variable occurring in this term, in first-occurrence
    /// order.
    pub fn free_variables(&self) -> Vec<Term> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut out = Vec::new();
        self.collect_variables(&mut seen, &mut out);
        out
    }

    fn collect_variables(&self, seen: &mut rustc_hash::FxHashSet<Term>, out: &mut Vec<Term>) {
        match &self.0.kind {
            TermKind::Var { .. } => {
                if seen.insert(self.clone()) {
                    out.push(self.clone());
                }
            }
            TermKind::List(items) => {
                for item in items.iter() {
                    item.collect_variables(seen, out);
                }
            }
            TermKind::Atom { .. } => {}
        }
    }

    /// Canonical textual identifier, used to key exact-match lookups
    /// (spec.md §3: "Identifiers for storage are derived from structural id
    /// strings").
    pub fn structural_id(&self) -> String {
        print_term(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms_are_canonicalized() {
        let a = Term::atom("alice");
        let b = Term::atom("alice");
        assert_eq!(a, b);
        assert_eq!(a.atom_name(), b.atom_name());
    }

    #[test]
    fn weight_is_one_plus_children() {
        let t = Term::list(vec![
            Term::atom("parent"),
            Term::atom("alice"),
            Term::atom("bob"),
        ]);
        assert_eq!(t.weight(), 1 + 1 + 1 + 1);
    }

    #[test]
    fn contains_variable_propagates() {
        let t = Term::list(vec![
            Term::atom("parent"),
            Term::var("?x"),
            Term::atom("bob"),
        ]);
        assert!(t.contains_variable());
        assert!(!Term::atom("bob").contains_variable());
    }

    #[test]
    fn free_variables_dedups_and_orders() {
        let t = Term::list(vec![
            Term::atom("p"),
            Term::var("?x"),
            Term::var("?y"),
            Term::var("?x"),
        ]);
        let vars: Vec<_> = t.free_variables().iter().map(|v| v.var_name().unwrap().to_string()).collect();
        assert_eq!(vars, vec!["?x", "?y"]);
    }

    #[test]
    fn operator_and_arity() {
        let t = Term::list(vec![Term::atom("knows"), Term::atom("self"), Term::atom("bob")]);
        assert_eq!(t.operator(), Some("knows"));
        assert_eq!(t.arity(), Some(2));
    }
}
