//! Forward chaining (spec.md §4.5).
//!
//! Conceptually subscribed to `Asserted`: every newly committed assertion is
//! run through every stored rule's antecedent clauses, extending bindings
//! over the remaining clauses, until no further derivation fires — a local
//! fixed point, matching §8's "forward chaining is monotonic in the absence
//! of retractions: derived set grows until a fixed point."

use super::rules::RuleStore;
use crate::ids::PartitionId;
use crate::kb::{Assertion, CommitOutcome, KnowledgeBase, PotentialAssertion};
use crate::term::{Substitution, Term};
use crate::tms::{AddOutcome, Tms};
use crate::unify::unify;
use std::collections::VecDeque;
use std::sync::Arc;

/// One newly committed derivation plus what the TMS made of it (a possible
/// contradiction and auto-retraction).
pub struct ForwardStep {
    pub assertion: Arc<Assertion>,
    pub tms_outcome: AddOutcome,
}

/// Run forward chaining to a local fixed point starting from `seed`.
/// Returns every newly committed assertion in commit order, for the caller
/// to translate into bus events.
pub fn forward_chain(
    seed: Arc<Assertion>,
    kb: &KnowledgeBase,
    tms: &Tms,
    rules: &RuleStore,
    depth_limit: u32,
    chain_global: bool,
) -> Vec<ForwardStep> {
    let mut queue: VecDeque<Arc<Assertion>> = VecDeque::new();
    queue.push_back(seed);
    let mut steps = Vec::new();

    while let Some(assertion) = queue.pop_front() {
        for rule in rules.all() {
            for (clause_idx, clause) in rule.antecedent_clauses.iter().enumerate() {
                let Ok(theta) = unify(clause, &assertion.term) else { continue };
                let remaining: Vec<&Term> = rule
                    .antecedent_clauses
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != clause_idx)
                    .map(|(_, c)| c)
                    .collect();

                let completions = satisfy_remaining(
                    &remaining,
                    theta,
                    vec![Arc::clone(&assertion)],
                    assertion.depth,
                    &assertion.partition,
                    kb,
                    chain_global,
                );

                for (bindings, premises, depth) in completions {
                    if depth >= depth_limit {
                        tracing::debug!(rule = %rule.id, depth, "forward chaining stopped at depth limit");
                        continue;
                    }
                    let consequent = bindings.apply(&rule.consequent);
                    let min_premise_priority =
                        premises.iter().map(|p| p.priority()).fold(1.0_f64, f64::min);
                    let priority = (rule.priority * min_premise_priority).clamp(0.0, 1.0);
                    let justifications: Vec<_> = premises.iter().map(|p| p.id).collect();
                    let potential = PotentialAssertion::new(consequent, assertion.partition.clone())
                        .with_priority(priority)
                        .with_justifications(justifications.clone())
                        .with_depth(depth);

                    if let CommitOutcome::Created(derived) = kb.commit(potential) {
                        let tms_outcome = tms.add(&derived, justifications);
                        queue.push_back(Arc::clone(&derived));
                        steps.push(ForwardStep { assertion: derived, tms_outcome });
                    }
                }
            }
        }
    }

    steps
}

/// Recursively find every way to extend `theta` so every clause in
/// `clauses` is satisfied by an active assertion in `partition` (and the
/// global partition, if `chain_global`).
fn satisfy_remaining(
    clauses: &[&Term],
    theta: Substitution,
    premises: Vec<Arc<Assertion>>,
    max_premise_depth: u32,
    partition: &PartitionId,
    kb: &KnowledgeBase,
    chain_global: bool,
) -> Vec<(Substitution, Vec<Arc<Assertion>>, u32)> {
    let Some((first, rest)) = clauses.split_first() else {
        return vec![(theta, premises, max_premise_depth + 1)];
    };

    let pattern = theta.apply(first);
    let mut candidates = kb.find_by_pattern(partition, &pattern);
    if chain_global {
        let global = crate::ids::well_known::global();
        if &global != partition {
            candidates.extend(kb.find_by_pattern(&global, &pattern));
        }
    }
    candidates.sort_by_key(|a| a.id);
    candidates.dedup_by_key(|a| a.id);

    let mut results = Vec::new();
    for candidate in candidates {
        let Ok(extension) = unify(&pattern, &candidate.term) else { continue };
        let combined = theta.compose(&extension);
        let mut next_premises = premises.clone();
        next_premises.push(Arc::clone(&candidate));
        let next_depth = max_premise_depth.max(candidate.depth);
        results.extend(satisfy_remaining(rest, combined, next_premises, next_depth, partition, kb, chain_global));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::rule::rules_from_term;
    use crate::term::parser::parse_one;
    use crate::tms::RetractReason;

    fn global() -> PartitionId {
        crate::ids::well_known::global()
    }

    fn setup() -> (Arc<KnowledgeBase>, Tms, RuleStore) {
        let kb = Arc::new(KnowledgeBase::new(1000));
        let tms = Tms::new(Arc::clone(&kb));
        let rules = RuleStore::new();
        (kb, tms, rules)
    }

    #[test]
    fn modus_ponens_derives_ancestor() {
        let (kb, tms, rules) = setup();
        let rule_term = parse_one("(=> (parent ?x ?y) (ancestor ?x ?y))").unwrap();
        for rule in rules_from_term(&rule_term, || rules.next_id(), 0.8, None).unwrap() {
            rules.insert(rule);
        }

        let parent = parse_one("(parent alice bob)").unwrap();
        let CommitOutcome::Created(parent_a) = kb.commit(PotentialAssertion::new(parent, global())) else {
            panic!("expected Created")
        };
        tms.add(&parent_a, Vec::new());

        let steps = forward_chain(parent_a, &kb, &tms, &rules, 64, true);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].assertion.term, parse_one("(ancestor alice bob)").unwrap());
        assert_eq!(steps[0].assertion.depth, 1);
    }

    #[test]
    fn conjunctive_antecedent_requires_both_clauses() {
        let (kb, tms, rules) = setup();
        let rule_term = parse_one("(=> (and (p ?x) (q ?x)) (r ?x))").unwrap();
        for rule in rules_from_term(&rule_term, || rules.next_id(), 1.0, None).unwrap() {
            rules.insert(rule);
        }

        let p = parse_one("(p a)").unwrap();
        let CommitOutcome::Created(p_a) = kb.commit(PotentialAssertion::new(p, global())) else {
            panic!("expected Created")
        };
        tms.add(&p_a, Vec::new());
        let steps = forward_chain(p_a, &kb, &tms, &rules, 64, true);
        assert!(steps.is_empty(), "rule shouldn't fire without (q a)");

        let q = parse_one("(q a)").unwrap();
        let CommitOutcome::Created(q_a) = kb.commit(PotentialAssertion::new(q, global())) else {
            panic!("expected Created")
        };
        tms.add(&q_a, Vec::new());
        let steps = forward_chain(q_a, &kb, &tms, &rules, 64, true);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].assertion.term, parse_one("(r a)").unwrap());
    }

    #[test]
    fn retracting_premise_retracts_derivation() {
        let (kb, tms, rules) = setup();
        let rule_term = parse_one("(=> (parent ?x ?y) (ancestor ?x ?y))").unwrap();
        for rule in rules_from_term(&rule_term, || rules.next_id(), 0.8, None).unwrap() {
            rules.insert(rule);
        }
        let parent = parse_one("(parent alice bob)").unwrap();
        let CommitOutcome::Created(parent_a) = kb.commit(PotentialAssertion::new(parent, global())) else {
            panic!("expected Created")
        };
        tms.add(&parent_a, Vec::new());
        let steps = forward_chain(Arc::clone(&parent_a), &kb, &tms, &rules, 64, true);
        let ancestor = Arc::clone(&steps[0].assertion);

        tms.retract(parent_a.id, RetractReason::Explicit);
        assert!(!ancestor.is_active());
    }
}
