//! Backward chaining and query execution (spec.md §4.5 "Backward chaining /
//! query").
//!
//! `ASK_BINDINGS`/`ASK_TRUE_FALSE` are direct pattern-index lookups;
//! `ACHIEVE_GOAL` is SLD-style backward search recursing through stored
//! rules and delegating ground subgoals to the operator registry. Every
//! query races a `tokio::time::sleep` deadline via `tokio::time::timeout`,
//! with a `tokio_util::sync::CancellationToken` threaded through so
//! in-flight operator futures stop cooperatively on expiry (SPEC_FULL.md
//! §4.5 [AMBIENT]).

use super::operators::{BoxFuture, OperatorRegistry};
use super::rules::RuleStore;
use crate::ids::{PartitionId, RuleId};
use crate::kb::KnowledgeBase;
use crate::term::{Substitution, Term};
use crate::unify::unify;
use rustc_hash::FxHashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type VarId = String;
pub type Bindings = FxHashMap<VarId, Term>;

/// One step of a successful `ACHIEVE_GOAL` derivation (SPEC_FULL.md §4.5
/// [SUPPLEMENT] `GoalTrace`), useful for `task_update`/`dialogue_request`
/// event payloads.
#[derive(Debug, Clone)]
pub enum GoalStep {
    RuleApplied { rule: RuleId, depth: u32 },
    OperatorCalled { predicate: String },
}

#[derive(Debug, Clone, Default)]
pub struct GoalTrace(pub Vec<GoalStep>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    AskBindings,
    AskTrueFalse,
    AchieveGoal,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryKind,
    pub pattern: Term,
    pub partition: PartitionId,
    pub limit: usize,
    pub deadline: Duration,
}

/// The result of a query (SPEC_FULL.md §4.5 [SUPPLEMENT] `Answer`).
#[derive(Debug, Clone)]
pub enum Answer {
    True,
    False,
    Bindings(Vec<Bindings>),
    Timeout,
    Cancelled,
}

fn to_bindings(subst: &Substitution, query_term: &Term) -> Bindings {
    let mut out = Bindings::default();
    for var in query_term.free_variables() {
        let Some(name) = var.var_name() else { continue };
        let resolved = subst.apply(&var);
        if !resolved.is_var() {
            out.insert(name.to_string(), resolved);
        }
    }
    out
}

fn ask_bindings(pattern: &Term, partition: &PartitionId, kb: &KnowledgeBase, limit: usize, access_boost: f64) -> Answer {
    let mut candidates = kb.find_by_pattern(partition, pattern);
    candidates.sort_by_key(|a| a.id);
    let mut out = Vec::new();
    for candidate in candidates {
        if let Ok(subst) = unify(pattern, &candidate.term) {
            kb.touch(partition, candidate.id, access_boost);
            out.push(to_bindings(&subst, pattern));
            if out.len() >= limit.max(1) {
                break;
            }
        }
    }
    if out.is_empty() { Answer::False } else { Answer::Bindings(out) }
}

fn ask_true_false(pattern: &Term, partition: &PartitionId, kb: &KnowledgeBase, access_boost: f64) -> Answer {
    match ask_bindings(pattern, partition, kb, 1, access_boost) {
        Answer::Bindings(_) => Answer::True,
        _ => Answer::False,
    }
}

/// Depth-limited SLD search for `goal` within `partition`. Returns every
/// solution found before the limit, each paired with the trace of
/// rule/operator applications that produced it.
fn solve<'a>(
    goal: Term,
    theta: Substitution,
    depth: u32,
    partition: &'a PartitionId,
    kb: &'a KnowledgeBase,
    rules: &'a RuleStore,
    operators: &'a OperatorRegistry,
    depth_limit: u32,
    access_boost: f64,
    cancel: CancellationToken,
) -> BoxFuture<'a, Vec<(Substitution, Vec<GoalStep>)>> {
    Box::pin(async move {
        if cancel.is_cancelled() || depth >= depth_limit {
            return Vec::new();
        }
        let resolved_goal = theta.apply(&goal);

        if let Some(predicate) = resolved_goal.operator() {
            if operators.get(predicate).is_some() {
                let args: Vec<Term> = resolved_goal.as_list().map(|l| l[1..].to_vec()).unwrap_or_default();
                if args.iter().all(|a| !a.contains_variable()) {
                    return match operators.call(predicate, &args, cancel.clone()).await {
                        Ok(result) if result == Term::atom("true") => {
                            vec![(theta, vec![GoalStep::OperatorCalled { predicate: predicate.to_string() }])]
                        }
                        _ => Vec::new(),
                    };
                }
            }
        }

        let mut solutions = Vec::new();
        for candidate in kb.find_by_pattern(partition, &resolved_goal) {
            if let Ok(extension) = unify(&resolved_goal, &candidate.term) {
                kb.touch(partition, candidate.id, access_boost);
                solutions.push((theta.compose(&extension), Vec::new()));
            }
        }

        for rule in rules.all() {
            let Ok(extension) = unify(&rule.consequent, &resolved_goal) else { continue };
            let combined = theta.compose(&extension);
            let clause_solutions = solve_clauses(
                &rule.antecedent_clauses,
                combined,
                depth + 1,
                partition,
                kb,
                rules,
                operators,
                depth_limit,
                access_boost,
                cancel.clone(),
            )
            .await;
            for (solution, mut trace) in clause_solutions {
                trace.push(GoalStep::RuleApplied { rule: rule.id, depth });
                solutions.push((solution, trace));
            }
        }

        solutions
    })
}

fn solve_clauses<'a>(
    clauses: &'a [Term],
    theta: Substitution,
    depth: u32,
    partition: &'a PartitionId,
    kb: &'a KnowledgeBase,
    rules: &'a RuleStore,
    operators: &'a OperatorRegistry,
    depth_limit: u32,
    access_boost: f64,
    cancel: CancellationToken,
) -> BoxFuture<'a, Vec<(Substitution, Vec<GoalStep>)>> {
    Box::pin(async move {
        let Some((first, rest)) = clauses.split_first() else {
            return vec![(theta, Vec::new())];
        };
        let mut results = Vec::new();
        let first_solutions = solve(
            first.clone(),
            theta,
            depth,
            partition,
            kb,
            rules,
            operators,
            depth_limit,
            access_boost,
            cancel.clone(),
        )
        .await;
        for (substitution, trace) in first_solutions {
            let rest_solutions = solve_clauses(
                rest,
                substitution,
                depth,
                partition,
                kb,
                rules,
                operators,
                depth_limit,
                access_boost,
                cancel.clone(),
            )
            .await;
            for (final_substitution, mut rest_trace) in rest_solutions {
                let mut combined_trace = trace.clone();
                combined_trace.append(&mut rest_trace);
                results.push((final_substitution, combined_trace));
            }
        }
        results
    })
}

async fn achieve_goal(
    goal: Term,
    partition: &PartitionId,
    kb: &KnowledgeBase,
    rules: &RuleStore,
    operators: &OperatorRegistry,
    depth_limit: u32,
    access_boost: f64,
    limit: usize,
    cancel: CancellationToken,
) -> (Answer, GoalTrace) {
    let mut solutions = solve(
        goal.clone(),
        Substitution::new(),
        0,
        partition,
        kb,
        rules,
        operators,
        depth_limit,
        access_boost,
        cancel,
    )
    .await;
    if solutions.is_empty() {
        return (Answer::False, GoalTrace::default());
    }
    solutions.truncate(limit.max(1));
    let trace = GoalTrace(solutions[0].1.clone());
    let bindings = solutions.into_iter().map(|(subst, _)| to_bindings(&subst, &goal)).collect();
    (Answer::Bindings(bindings), trace)
}

/// Execute `query` against `kb`/`rules`/`operators`, racing its deadline
/// (spec.md §5 "every query carries a deadline; expiry yields `timeout`").
/// Every assertion consulted to answer the query is "accessed" and has its
/// priority boosted by `access_boost` (spec.md §4.3).
pub async fn run(
    query: Query,
    kb: &KnowledgeBase,
    rules: &RuleStore,
    operators: &OperatorRegistry,
    depth_limit: u32,
    access_boost: f64,
) -> (Answer, GoalTrace) {
    let cancel = CancellationToken::new();
    match query.kind {
        QueryKind::AskBindings => {
            (ask_bindings(&query.pattern, &query.partition, kb, query.limit, access_boost), GoalTrace::default())
        }
        QueryKind::AskTrueFalse => {
            (ask_true_false(&query.pattern, &query.partition, kb, access_boost), GoalTrace::default())
        }
        QueryKind::AchieveGoal => {
            let fut = achieve_goal(
                query.pattern.clone(),
                &query.partition,
                kb,
                rules,
                operators,
                depth_limit,
                access_boost,
                query.limit,
                cancel.clone(),
            );
            match tokio::time::timeout(query.deadline, fut).await {
                Ok(result) => result,
                Err(_) => {
                    cancel.cancel();
                    (Answer::Timeout, GoalTrace::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::rule::rules_from_term;
    use crate::kb::{CommitOutcome, PotentialAssertion};
    use crate::term::parser::parse_one;
    use std::sync::Arc;

    fn global() -> PartitionId {
        crate::ids::well_known::global()
    }

    fn setup() -> (Arc<KnowledgeBase>, RuleStore, OperatorRegistry) {
        (Arc::new(KnowledgeBase::new(1000)), RuleStore::new(), OperatorRegistry::with_builtins())
    }

    #[tokio::test]
    async fn ask_bindings_enumerates_matches() {
        let (kb, rules, operators) = setup();
        kb.commit(PotentialAssertion::new(parse_one("(likes alice bob)").unwrap(), global()));
        kb.commit(PotentialAssertion::new(parse_one("(likes alice carol)").unwrap(), global()));
        let query = Query {
            kind: QueryKind::AskBindings,
            pattern: parse_one("(likes alice ?x)").unwrap(),
            partition: global(),
            limit: 10,
            deadline: Duration::from_secs(1),
        };
        let (answer, _) = run(query, &kb, &rules, &operators, 64, 0.1).await;
        let Answer::Bindings(bindings) = answer else { panic!("expected Bindings") };
        assert_eq!(bindings.len(), 2);
    }

    #[tokio::test]
    async fn ask_true_false_succeeds_and_fails() {
        let (kb, rules, operators) = setup();
        kb.commit(PotentialAssertion::new(parse_one("(p a)").unwrap(), global()));
        let yes = Query {
            kind: QueryKind::AskTrueFalse,
            pattern: parse_one("(p a)").unwrap(),
            partition: global(),
            limit: 1,
            deadline: Duration::from_secs(1),
        };
        let (answer, _) = run(yes, &kb, &rules, &operators, 64, 0.1).await;
        assert!(matches!(answer, Answer::True));

        let no = Query {
            kind: QueryKind::AskTrueFalse,
            pattern: parse_one("(p b)").unwrap(),
            partition: global(),
            limit: 1,
            deadline: Duration::from_secs(1),
        };
        let (answer, _) = run(no, &kb, &rules, &operators, 64, 0.1).await;
        assert!(matches!(answer, Answer::False));
    }

    #[tokio::test]
    async fn achieve_goal_resolves_through_rule() {
        let (kb, rules, operators) = setup();
        let rule_term = parse_one("(=> (parent ?x ?y) (ancestor ?x ?y))").unwrap();
        for rule in rules_from_term(&rule_term, || rules.next_id(), 1.0, None).unwrap() {
            rules.insert(rule);
        }
        kb.commit(PotentialAssertion::new(parse_one("(parent alice bob)").unwrap(), global()));
        let query = Query {
            kind: QueryKind::AchieveGoal,
            pattern: parse_one("(ancestor alice ?who)").unwrap(),
            partition: global(),
            limit: 5,
            deadline: Duration::from_secs(1),
        };
        let (answer, trace) = run(query, &kb, &rules, &operators, 64, 0.1).await;
        let Answer::Bindings(bindings) = answer else { panic!("expected Bindings, trace={trace:?}") };
        assert_eq!(bindings[0].get("?who").and_then(|t| t.atom_name()), Some("bob"));
    }

    #[tokio::test]
    async fn achieve_goal_delegates_to_operator() {
        let (kb, rules, operators) = setup();
        let query = Query {
            kind: QueryKind::AchieveGoal,
            pattern: parse_one("(< 2 3)").unwrap(),
            partition: global(),
            limit: 1,
            deadline: Duration::from_secs(1),
        };
        let (answer, _) = run(query, &kb, &rules, &operators, 64, 0.1).await;
        assert!(matches!(answer, Answer::Bindings(_)));
    }

    #[tokio::test]
    async fn achieve_goal_times_out_on_zero_deadline() {
        let (kb, rules, operators) = setup();
        let query = Query {
            kind: QueryKind::AchieveGoal,
            pattern: parse_one("(nonexistent ?x)").unwrap(),
            partition: global(),
            limit: 1,
            deadline: Duration::from_nanos(1),
        };
        let (answer, _) = run(query, &kb, &rules, &operators, 64, 0.1).await;
        assert!(matches!(answer, Answer::Timeout) || matches!(answer, Answer::False));
    }
}
