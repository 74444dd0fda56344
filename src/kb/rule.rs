//! `Rule`: a stored `(⇒ antecedent consequent)` (or split `⇔`) form
//! (spec.md §3).

use crate::ids::RuleId;
use crate::term::Term;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    /// The canonical `(⇒ antecedent consequent)` form. For a rule produced
    /// by splitting an `⇔`, this is still the rule's own one-directional
    /// form — `form_key` below carries the shared `⇔` hash.
    pub form: Term,
    pub priority: f64,
    /// Antecedent clauses after normalization: `(and c1 c2 …)` is split into
    /// `[c1, c2, …]`; a single non-`and` antecedent is one clause; an empty
    /// list antecedent is the vacuous zero-clause case (spec.md §8 boundary
    /// behaviors).
    pub antecedent_clauses: Vec<Term>,
    pub consequent: Term,
    pub free_variables: Vec<Term>,
    pub source_note_id: Option<Uuid>,
    /// Structural key used for retraction-by-form: both halves of a split
    /// `⇔` share the same key (DESIGN.md Open Question (b)).
    pub form_key: String,
}

/// Normalize a rule's antecedent term into its clause list.
pub fn normalize_antecedent(antecedent: &Term) -> Vec<Term> {
    if antecedent.operator() == Some("and") {
        antecedent.as_list().unwrap()[1..].to_vec()
    } else if antecedent.as_list().map(|l| l.is_empty()).unwrap_or(false) {
        Vec::new()
    } else {
        vec![antecedent.clone()]
    }
}

/// Build one implication `Rule` (`(⇒ antecedent consequent)`), recording
/// `form_key` as given (so a split `⇔` pair can share it).
pub fn build_rule(
    id: RuleId,
    antecedent: Term,
    consequent: Term,
    priority: f64,
    source_note_id: Option<Uuid>,
    form_key: String,
) -> Rule {
    let form = Term::list(vec![Term::atom("=>"), antecedent.clone(), consequent.clone()]);
    let antecedent_clauses = normalize_antecedent(&antecedent);
    let mut free_variables = antecedent.free_variables();
    for v in consequent.free_variables() {
        if !free_variables.contains(&v) {
            free_variables.push(v);
        }
    }
    Rule {
        id,
        form,
        priority,
        antecedent_clauses,
        consequent,
        free_variables,
        source_note_id,
        form_key,
    }
}

/// Parse a rule term (`(=> A C)` or `(<=> A C)`) into one or two `Rule`s:
/// one for `=>`, two (both directions, sharing `form_key`) for `<=>`
/// (spec.md §3, §9(b)).
pub fn rules_from_term(
    term: &Term,
    next_id: impl Fn() -> RuleId,
    priority: f64,
    source_note_id: Option<Uuid>,
) -> Option<Vec<Rule>> {
    let items = term.as_list()?;
    if items.len() != 3 {
        return None;
    }
    let op = items[0].atom_name()?;
    let antecedent = items[1].clone();
    let consequent = items[2].clone();
    let form_key = term.structural_id();
    match op {
        "=>" => Some(vec![build_rule(next_id(), antecedent, consequent, priority, source_note_id, form_key)]),
        "<=>" | "⇔" => Some(vec![
            build_rule(next_id(), antecedent.clone(), consequent.clone(), priority, source_note_id, form_key.clone()),
            build_rule(next_id(), consequent, antecedent, priority, source_note_id, form_key),
        ]),
        _ => None,
    }
}
