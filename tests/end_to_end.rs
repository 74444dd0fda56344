//! End-to-end scenarios (spec.md §8 E1-E6), driven through `Cognition`'s
//! public command surface rather than individual subsystem APIs.

use noema::bus::{EventBus, EventType};
use noema::cognition::{Command, CommandOutcome, RetractTarget};
use noema::config::Config;
use noema::engine::{Answer, QueryKind};
use noema::ids::well_known;
use noema::kb::{CommitOutcome, PotentialAssertion};
use noema::term::parser::parse_one;
use noema::Cognition;

fn cognition() -> std::sync::Arc<Cognition> {
    Cognition::new(Config::default(), EventBus::spawn())
}

#[tokio::test]
async fn e1_modus_ponens_fires_with_justifications() {
    let cog = cognition();
    let (_id, mut rx) = cog.bus.subscribe_type(EventType::AssertionAdded);

    cog.submit(Command::Add {
        kif: "(=> (parent ?x ?y) (ancestor ?x ?y))".to_string(),
        note_id: None,
        partition: None,
    })
    .await
    .unwrap();
    let outcome = cog
        .submit(Command::Add { kif: "(parent alice bob)".to_string(), note_id: None, partition: None })
        .await
        .unwrap();
    let CommandOutcome::Added { assertions, .. } = outcome else { panic!("expected Added") };
    assert_eq!(assertions.len(), 2, "parent fact + derived ancestor");

    let parent_id = assertions[0];
    let ancestor = cog.kb.get(&well_known::global(), assertions[1]).expect("ancestor assertion present");
    assert!(ancestor.is_active());
    assert_eq!(ancestor.term, parse_one("(ancestor alice bob)").unwrap());
    assert_eq!(cog.tms.justifications_of(ancestor.id), vec![parent_id]);

    // The bus actually saw both AssertionAdded deliveries.
    let first = rx.recv().await.expect("parent event");
    let second = rx.recv().await.expect("ancestor event");
    assert!(matches!(first, noema::bus::Event::AssertionAdded { .. }));
    assert!(matches!(second, noema::bus::Event::AssertionAdded { .. }));
}

#[tokio::test]
async fn e2_equality_orientation_and_subsumption() {
    let cog = cognition();
    let first = cog.kb.commit(PotentialAssertion::new(parse_one("(= (f a b c) g)").unwrap(), well_known::global()));
    let CommitOutcome::Created(first) = first else { panic!("expected Created") };
    let oriented = first.term.as_list().unwrap();
    assert_eq!(oriented[1].structural_id(), "(f a b c)");
    assert_eq!(oriented[2].structural_id(), "g");

    let second = cog.kb.commit(PotentialAssertion::new(parse_one("(= g (f a b c))").unwrap(), well_known::global()));
    assert!(matches!(second, CommitOutcome::Subsumed(ref existing) if existing.id == first.id));
    assert_eq!(cog.kb.assertion_count(&well_known::global()), 1);
}

#[tokio::test]
async fn e3_contradiction_resolution_retracts_weaker() {
    let cog = cognition();
    let CommitOutcome::Created(p) =
        cog.kb.commit(PotentialAssertion::new(parse_one("(p x)").unwrap(), well_known::global()).with_priority(0.5))
    else {
        panic!("expected Created")
    };
    cog.tms.add(&p, Vec::new());

    let (_id, mut rx) = cog.bus.subscribe_type(EventType::ContradictionDetected);
    let CommitOutcome::Created(not_p) = cog.kb.commit(
        PotentialAssertion::new(parse_one("(not (p x))").unwrap(), well_known::global()).with_priority(0.9),
    ) else {
        panic!("expected Created")
    };
    let outcome = cog.tms.add(&not_p, Vec::new());
    for contradiction in outcome.contradictions.clone() {
        cog.bus.publish(noema::bus::Event::ContradictionDetected(contradiction)).await;
    }

    assert_eq!(outcome.contradictions.len(), 1);
    assert!(!p.is_active());
    assert!(not_p.is_active());
    let delivered = rx.recv().await.expect("contradiction event delivered");
    assert!(matches!(delivered, noema::bus::Event::ContradictionDetected(_)));
}

#[tokio::test]
async fn e4_query_bindings_in_deterministic_id_order() {
    let cog = cognition();
    cog.submit(Command::Add { kif: "(knows self bob)".to_string(), note_id: None, partition: None }).await.unwrap();
    cog.submit(Command::Add { kif: "(knows self carol)".to_string(), note_id: None, partition: None })
        .await
        .unwrap();

    let outcome = cog
        .submit(Command::Query {
            kif_pattern: "(knows self ?who)".to_string(),
            kind: QueryKind::AskBindings,
            partition: None,
            limit: 10,
        })
        .await
        .unwrap();
    let CommandOutcome::Query { answer, .. } = outcome else { panic!("expected Query") };
    let Answer::Bindings(bindings) = answer else { panic!("expected Bindings") };
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].get("?who").and_then(|t| t.atom_name()), Some("bob"));
    assert_eq!(bindings[1].get("?who").and_then(|t| t.atom_name()), Some("carol"));
}

#[tokio::test]
async fn e5_retraction_propagates_to_derived_assertion() {
    let cog = cognition();
    cog.submit(Command::Add {
        kif: "(=> (parent ?x ?y) (ancestor ?x ?y))".to_string(),
        note_id: None,
        partition: None,
    })
    .await
    .unwrap();
    let outcome = cog
        .submit(Command::Add { kif: "(parent alice bob)".to_string(), note_id: None, partition: None })
        .await
        .unwrap();
    let CommandOutcome::Added { assertions, .. } = outcome else { panic!("expected Added") };
    let (parent_id, ancestor_id) = (assertions[0], assertions[1]);

    let retract_outcome = cog
        .submit(Command::Retract { target: RetractTarget::ById(parent_id), partition: None })
        .await
        .unwrap();
    let CommandOutcome::Retracted(retracted) = retract_outcome else { panic!("expected Retracted") };
    assert_eq!(retracted.len(), 2, "parent + cascaded ancestor");
    assert!(retracted.contains(&ancestor_id));
    assert!(!cog.kb.get(&well_known::global(), ancestor_id).unwrap().is_active());
}

#[tokio::test]
async fn e6_eviction_never_touches_protected_symbols() {
    let mut config = Config::default();
    config.default_partition_capacity = 20;
    config.protected_symbols.insert("sacred".to_string());
    let cog = Cognition::new(config, EventBus::spawn());

    cog.submit(Command::Add { kif: "(sacred marker)".to_string(), note_id: None, partition: None }).await.unwrap();
    for i in 0..(20 + 100) {
        cog.submit(Command::Add { kif: format!("(fact{i} a)"), note_id: None, partition: None }).await.unwrap();
    }

    let global = well_known::global();
    let active = cog.kb.all_active(&global);
    assert!(active.iter().any(|a| a.term.operator() == Some("sacred")), "protected symbol must survive eviction");

    let capacity = cog.kb.capacity(&global);
    // One protected assertion (the sacred marker) on top of the target fraction.
    assert!(
        active.len() <= (0.8 * capacity as f64).ceil() as usize + 1,
        "active count {} exceeds target fraction + protected",
        active.len()
    );
}
