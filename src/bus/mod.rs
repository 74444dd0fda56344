//! Event bus: type- and pattern-based pub/sub over a bounded dedicated
//! worker (spec.md §4.6, SPEC_FULL.md §4.6 [AMBIENT]).
//!
//! Grounded on `semantic/workspace/events.rs`'s shape (a flat `Event`
//! enum broadcast to registered listeners on workspace mutation) generalized
//! with a `tokio::sync::mpsc` bounded channel so publishers never block and
//! delivery stays FIFO per publisher.

use crate::ids::{AssertionId, PartitionId, RuleId};
use crate::term::Term;
use crate::tms::{ContradictionRecord, RetractReason};
use crate::unify::match_pattern;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Published event surface (spec.md §6 event surface).
#[derive(Debug, Clone)]
pub enum Event {
    AssertionAdded { id: AssertionId, partition: PartitionId, term: Term },
    AssertionRemoved { id: AssertionId, partition: PartitionId, reason: RetractReason },
    AssertionEvicted { id: AssertionId, partition: PartitionId },
    AssertionStateChanged { id: AssertionId, partition: PartitionId, active: bool },
    RuleAdded { id: RuleId, source_note_id: Option<Uuid> },
    RuleRemoved { id: RuleId, source_note_id: Option<Uuid> },
    TaskUpdate { note_id: Uuid, description: String },
    SystemStatus { paused: bool, assertion_count: usize },
    ContradictionDetected(ContradictionRecord),
    DialogueRequest { note_id: Uuid, prompt: String },
}

impl Event {
    /// The partition an event is scoped to, if any — used for pattern
    /// subscriptions, which are always partition-qualified.
    fn partition(&self) -> Option<&PartitionId> {
        match self {
            Event::AssertionAdded { partition, .. }
            | Event::AssertionRemoved { partition, .. }
            | Event::AssertionEvicted { partition, .. }
            | Event::AssertionStateChanged { partition, .. } => Some(partition),
            Event::ContradictionDetected(record) => Some(&record.partition),
            _ => None,
        }
    }

    fn term(&self) -> Option<&Term> {
        match self {
            Event::AssertionAdded { term, .. } => Some(term),
            _ => None,
        }
    }

    fn type_tag(&self) -> EventType {
        match self {
            Event::AssertionAdded { .. } => EventType::AssertionAdded,
            Event::AssertionRemoved { .. } => EventType::AssertionRemoved,
            Event::AssertionEvicted { .. } => EventType::AssertionEvicted,
            Event::AssertionStateChanged { .. } => EventType::AssertionStateChanged,
            Event::RuleAdded { .. } => EventType::RuleAdded,
            Event::RuleRemoved { .. } => EventType::RuleRemoved,
            Event::TaskUpdate { .. } => EventType::TaskUpdate,
            Event::SystemStatus { .. } => EventType::SystemStatus,
            Event::ContradictionDetected(_) => EventType::ContradictionDetected,
            Event::DialogueRequest { .. } => EventType::DialogueRequest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    AssertionAdded,
    AssertionRemoved,
    AssertionEvicted,
    AssertionStateChanged,
    RuleAdded,
    RuleRemoved,
    TaskUpdate,
    SystemStatus,
    ContradictionDetected,
    DialogueRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

enum Filter {
    ByType(EventType),
    ByPattern { partition: PartitionId, pattern: Term },
}

struct Subscription {
    id: SubscriptionId,
    filter: Filter,
    sender: mpsc::Sender<Event>,
}

/// The bus itself. `publish` never blocks the caller beyond the bounded
/// channel's backpressure; dispatch to subscribers happens on the
/// `dispatch_loop` task (spec.md §5 "dispatches asynchronously on a bounded
/// worker pool").
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    worker: mpsc::Sender<Event>,
}

const WORKER_QUEUE_CAPACITY: usize = 1024;
const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

impl EventBus {
    /// Spawn the dedicated dispatch task and return a bus handle. Must be
    /// called from within a Tokio runtime.
    pub fn spawn() -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<Event>(WORKER_QUEUE_CAPACITY);
        let bus = Arc::new(EventBus {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            worker: tx,
        });
        let dispatch_bus = Arc::clone(&bus);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatch_bus.dispatch(&event).await;
            }
        });
        bus
    }

    async fn dispatch(&self, event: &Event) {
        // Snapshot matching senders while holding the lock only briefly,
        // then send without it — subscriber callbacks must not block the
        // bus (SPEC_FULL.md §4.6), and a slow subscriber only backs up its
        // own channel, never this one.
        let targets: Vec<mpsc::Sender<Event>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| Self::matches(&sub.filter, event))
            .map(|sub| sub.sender.clone())
            .collect();
        for sender in targets {
            if sender.send(event.clone()).await.is_err() {
                tracing::debug!("subscriber channel closed, dropping delivery");
            }
        }
    }

    fn matches(filter: &Filter, event: &Event) -> bool {
        match filter {
            Filter::ByType(t) => *t == event.type_tag(),
            Filter::ByPattern { partition, pattern } => {
                event.partition() == Some(partition)
                    && event.term().map(|t| match_pattern(pattern, t).is_ok()).unwrap_or(false)
            }
        }
    }

    /// Enqueue `event` for dispatch. Returns immediately; delivery to
    /// subscribers happens on the dispatch task, preserving per-publisher
    /// FIFO order (spec.md §5 "per-commit emission order preserved").
    pub async fn publish(&self, event: Event) {
        if self.worker.send(event).await.is_err() {
            tracing::error!("event bus dispatch task is gone, event dropped");
        }
    }

    fn add_subscription(&self, filter: Filter) -> (SubscriptionId, mpsc::Receiver<Event>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.subscriptions.write().push(Subscription { id, filter, sender: tx });
        (id, rx)
    }

    pub fn subscribe_type(&self, event_type: EventType) -> (SubscriptionId, mpsc::Receiver<Event>) {
        self.add_subscription(Filter::ByType(event_type))
    }

    /// Subscribe to `AssertionAdded` events in `partition` whose term
    /// unifies with `pattern` (spec.md §4.6 "by KIF pattern").
    pub fn subscribe_pattern(&self, partition: PartitionId, pattern: Term) -> (SubscriptionId, mpsc::Receiver<Event>) {
        self.add_subscription(Filter::ByPattern { partition, pattern })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.write().retain(|sub| sub.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::parser::parse_one;

    fn global() -> PartitionId {
        crate::ids::well_known::global()
    }

    #[tokio::test]
    async fn type_subscriber_receives_matching_event() {
        let bus = EventBus::spawn();
        let (_id, mut rx) = bus.subscribe_type(EventType::AssertionAdded);
        let term = parse_one("(p a)").unwrap();
        bus.publish(Event::AssertionAdded { id: crate::ids::AssertionIdGen::new().next(), partition: global(), term })
            .await;
        let received = rx.recv().await.expect("event delivered");
        assert!(matches!(received, Event::AssertionAdded { .. }));
    }

    #[tokio::test]
    async fn type_subscriber_ignores_other_types() {
        let bus = EventBus::spawn();
        let (_id, mut rx) = bus.subscribe_type(EventType::RuleAdded);
        let term = parse_one("(p a)").unwrap();
        bus.publish(Event::AssertionAdded { id: crate::ids::AssertionIdGen::new().next(), partition: global(), term })
            .await;
        bus.publish(Event::RuleAdded { id: crate::ids::RuleIdGen::new().next(), source_note_id: None }).await;
        let received = rx.recv().await.expect("event delivered");
        assert!(matches!(received, Event::RuleAdded { .. }));
    }

    #[tokio::test]
    async fn pattern_subscriber_filters_by_unification() {
        let bus = EventBus::spawn();
        let pattern = parse_one("(likes alice ?x)").unwrap();
        let (_id, mut rx) = bus.subscribe_pattern(global(), pattern);

        let matching = parse_one("(likes alice bob)").unwrap();
        bus.publish(Event::AssertionAdded {
            id: crate::ids::AssertionIdGen::new().next(),
            partition: global(),
            term: matching,
        })
        .await;
        let non_matching = parse_one("(likes carol bob)").unwrap();
        bus.publish(Event::AssertionAdded {
            id: crate::ids::AssertionIdGen::new().next(),
            partition: global(),
            term: non_matching,
        })
        .await;

        let received = rx.recv().await.expect("matching event delivered");
        match received {
            Event::AssertionAdded { term, .. } => assert_eq!(term.operator(), Some("likes")),
            _ => panic!("unexpected event"),
        }
        // second publish shouldn't arrive; give the dispatch loop a moment
        // then confirm the channel is still empty.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::spawn();
        let (id, mut rx) = bus.subscribe_type(EventType::RuleAdded);
        bus.unsubscribe(id);
        bus.publish(Event::RuleAdded { id: crate::ids::RuleIdGen::new().next(), source_note_id: None }).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
