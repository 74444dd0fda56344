//! Substitution: a mapping `Var → Term`, applied structurally and eagerly
//! (spec.md §4.1).

use super::Term;
use rustc_hash::{FxHashMap, FxHashSet};

impl Term {
    fn ptr_eq(a: &Term, b: &Term) -> bool {
        std::sync::Arc::ptr_eq(&a.0, &b.0)
    }
}

/// A variable binding map. Cloning is a `FxHashMap` clone (cheap: `Term`
/// values are `Arc` handles).
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    bindings: FxHashMap<Term, Term>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Bind `var` to `value`. `var` must be a variable term.
    pub fn bind(&mut self, var: Term, value: Term) {
        debug_assert!(var.is_var(), "Substitution::bind requires a variable term");
        self.bindings.insert(var, value);
    }

    pub fn get(&self, var: &Term) -> Option<&Term> {
        self.bindings.get(var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term, &Term)> {
        self.bindings.iter()
    }

    /// Chase variable-to-variable binding chains. A cycle returns the
    /// original queried variable (spec.md §4.1).
    pub fn resolve(&self, term: &Term) -> Term {
        if !term.is_var() {
            return term.clone();
        }
        let mut current = term.clone();
        let mut visited = FxHashSet::default();
        loop {
            if !visited.insert(current.clone()) {
                return term.clone();
            }
            match self.bindings.get(&current) {
                Some(next) if next.is_var() => current = next.clone(),
                Some(next) => return next.clone(),
                None => return current,
            }
        }
    }

    /// Apply this substitution to `term`, recursively and eagerly.
    ///
    /// Atoms (and constants) yield themselves; lists yield a list with each
    /// child substituted, with a pointer-equality short-circuit when no
    /// child actually changed (spec.md §4.1).
    pub fn apply(&self, term: &Term) -> Term {
        if term.is_var() {
            let resolved = self.resolve(term);
            if resolved.is_var() {
                return resolved;
            }
            return self.apply(&resolved);
        }
        match term.as_list() {
            None => term.clone(),
            Some(items) => {
                let mut changed = false;
                let mut new_items = Vec::with_capacity(items.len());
                for item in items {
                    let substituted = self.apply(item);
                    if !Term::ptr_eq(item, &substituted) {
                        changed = true;
                    }
                    new_items.push(substituted);
                }
                if changed {
                    Term::list(new_items)
                } else {
                    term.clone()
                }
            }
        }
    }

    /// `self ∘ other`: applying `self` then `other` in one pass.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut result = Substitution::new();
        for (var, val) in &self.bindings {
            result.bindings.insert(var.clone(), other.apply(val));
        }
        for (var, val) in &other.bindings {
            result.bindings.entry(var.clone()).or_insert_with(|| val.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::parser::parse_one;

    #[test]
    fn empty_substitution_is_identity() {
        let t = parse_one("(p a ?x)").unwrap();
        let sigma = Substitution::new();
        assert_eq!(sigma.apply(&t), t);
    }

    #[test]
    fn apply_substitutes_variable() {
        let t = Term::var("?x");
        let mut sigma = Substitution::new();
        sigma.bind(Term::var("?x"), Term::atom("alice"));
        assert_eq!(sigma.apply(&t), Term::atom("alice"));
    }

    #[test]
    fn apply_substitutes_nested_list() {
        let t = parse_one("(parent ?x bob)").unwrap();
        let mut sigma = Substitution::new();
        sigma.bind(Term::var("?x"), Term::atom("alice"));
        let result = sigma.apply(&t);
        assert_eq!(result, parse_one("(parent alice bob)").unwrap());
    }

    #[test]
    fn unrelated_lists_are_unchanged_by_pointer() {
        let t = parse_one("(p a b)").unwrap();
        let sigma = Substitution::new();
        let result = sigma.apply(&t);
        assert!(Term::ptr_eq(&t, &result));
    }

    #[test]
    fn resolve_chases_variable_chain() {
        let mut sigma = Substitution::new();
        sigma.bind(Term::var("?x"), Term::var("?y"));
        sigma.bind(Term::var("?y"), Term::atom("alice"));
        assert_eq!(sigma.resolve(&Term::var("?x")), Term::atom("alice"));
    }

    #[test]
    fn resolve_detects_cycle() {
        let mut sigma = Substitution::new();
        sigma.bind(Term::var("?x"), Term::var("?y"));
        sigma.bind(Term::var("?y"), Term::var("?x"));
        assert_eq!(sigma.resolve(&Term::var("?x")), Term::var("?x"));
    }

    #[test]
    fn composition_matches_sequential_application() {
        let t = parse_one("(p ?x ?y)").unwrap();
        let mut sigma = Substitution::new();
        sigma.bind(Term::var("?x"), Term::var("?y"));
        let mut tau = Substitution::new();
        tau.bind(Term::var("?y"), Term::atom("alice"));

        let sequential = tau.apply(&sigma.apply(&t));
        let composed = sigma.compose(&tau).apply(&t);
        assert_eq!(sequential, composed);
    }
}
