//! Unifier and one-way matcher.
//!
//! Both are the same iterative, stack-based algorithm over `(pattern,
//! instance)` pairs (spec.md §4.2, §9 "dynamic dispatch over term shape …
//! implement as a tagged variant with an exhaustive match; do not use
//! inheritance"); the matcher just refuses to bind instance-side variables.

mod index;

pub use index::PatternIndex;

use crate::term::{Substitution, Term};

/// Unification / matching failed. A single, uninformative failure value —
/// spec.md §4.2: "failure is normal outcome, not an error" (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnifyFailure;

/// Full two-way unification: variables on either side may be bound.
pub fn unify(a: &Term, b: &Term) -> Result<Substitution, UnifyFailure> {
    run(a, b, false)
}

/// One-way pattern match: variables are only ever bound on `pattern`'s side;
/// variables occurring in `instance` are treated as opaque constants.
pub fn match_pattern(pattern: &Term, instance: &Term) -> Result<Substitution, UnifyFailure> {
    run(pattern, instance, true)
}

fn run(a: &Term, b: &Term, one_way: bool) -> Result<Substitution, UnifyFailure> {
    let mut subst = Substitution::new();
    let mut stack: Vec<(Term, Term)> = vec![(a.clone(), b.clone())];

    while let Some((p, i)) = stack.pop() {
        let p = resolve_shallow(&p, &subst);
        let i = resolve_shallow(&i, &subst);

        if p == i {
            continue;
        }

        if p.is_var() {
            if occurs(&p, &i, &subst) {
                return Err(UnifyFailure);
            }
            subst.bind(p, i);
            continue;
        }

        if i.is_var() {
            if one_way {
                // Instance-side variables are constants: only an already
                // handled exact-equality case (above) could have matched.
                return Err(UnifyFailure);
            }
            if occurs(&i, &p, &subst) {
                return Err(UnifyFailure);
            }
            subst.bind(i, p);
            continue;
        }

        match (p.as_list(), i.as_list()) {
            (Some(p_items), Some(i_items)) if p_items.len() == i_items.len() => {
                for (pc, ic) in p_items.iter().zip(i_items.iter()).rev() {
                    stack.push((pc.clone(), ic.clone()));
                }
            }
            _ => return Err(UnifyFailure),
        }
    }

    Ok(subst)
}

fn resolve_shallow(t: &Term, subst: &Substitution) -> Term {
    if t.is_var() { subst.resolve(t) } else { t.clone() }
}

/// Occurs check: does `var` occur (after resolving bound sub-terms) anywhere
/// in `term`? Must traverse resolved sub-terms to guarantee termination
/// (spec.md §4.2, §8 invariant 5).
fn occurs(var: &Term, term: &Term, subst: &Substitution) -> bool {
    let resolved = resolve_shallow(term, subst);
    if &resolved == var {
        return true;
    }
    match resolved.as_list() {
        Some(items) => items.iter().any(|c| occurs(var, c, subst)),
        None => false,
    }
}
