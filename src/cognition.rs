//! `Cognition`: the context object tying the knowledge base, TMS, event
//! bus, rule engine, and plugins together behind one synchronous-looking
//! `submit(Command) -> Answer` entry point (spec.md §6).

use crate::bus::{Event, EventBus};
use crate::config::Config;
use crate::engine::query::{self, Answer, GoalTrace, Query as EngineQuery, QueryKind};
use crate::engine::{forward_chain, OperatorRegistry, RuleStore};
use crate::error::CommandError;
use crate::ids::{well_known, AssertionId, PartitionId, RuleId};
use crate::kb::rule::rules_from_term;
use crate::kb::{Assertion, CommitOutcome, KnowledgeBase, PotentialAssertion};
use crate::plugin::{Classification, DefaultInputPlugin, InputPlugin, Plugin};
use crate::term::parser::{parse_all, parse_one};
use crate::tms::{AddOutcome, RetractReason, Tms};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// What a `retract` command targets (spec.md §6).
#[derive(Debug, Clone)]
pub enum RetractTarget {
    ById(AssertionId),
    ByRuleId(RuleId),
    ByNote(Uuid),
    ByRuleForm(String),
    ByKif(String),
}

#[derive(Debug, Clone)]
pub enum Command {
    Add { kif: String, note_id: Option<Uuid>, partition: Option<PartitionId> },
    Retract { target: RetractTarget, partition: Option<PartitionId> },
    Query { kif_pattern: String, kind: QueryKind, partition: Option<PartitionId>, limit: usize },
    Pause,
    Unpause,
    Clear { partition: Option<PartitionId> },
    GetStatus,
    GetConfig,
    SetConfig(Box<Config>),
}

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Added { assertions: Vec<AssertionId>, rules: Vec<RuleId> },
    Retracted(Vec<AssertionId>),
    Query { answer: Answer, trace: GoalTrace },
    Status { paused: bool, assertion_counts: FxHashMap<PartitionId, usize> },
    Config(Box<Config>),
    Ack,
}

pub struct Cognition {
    pub kb: Arc<KnowledgeBase>,
    pub tms: Tms,
    pub bus: Arc<EventBus>,
    pub rules: RuleStore,
    pub operators: OperatorRegistry,
    pub input_plugin: Box<dyn InputPlugin>,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    config: RwLock<Config>,
    paused: AtomicBool,
}

impl Cognition {
    pub fn new(config: Config, bus: Arc<EventBus>) -> Arc<Self> {
        let kb = Arc::new(KnowledgeBase::new(config.default_partition_capacity));
        for (partition, capacity) in &config.partition_capacity_overrides {
            kb.set_capacity(partition, *capacity);
        }
        let strategy = crate::config::resolve_strategy("retract-weakest");
        let tms = Tms::with_strategy(Arc::clone(&kb), strategy);
        Arc::new(Cognition {
            kb,
            tms,
            bus,
            rules: RuleStore::new(),
            operators: OperatorRegistry::with_builtins(),
            input_plugin: Box::new(DefaultInputPlugin),
            plugins: RwLock::new(Vec::new()),
            config: RwLock::new(config),
            paused: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub async fn register_plugin(self: &Arc<Self>, plugin: Arc<dyn Plugin>) {
        plugin.start(Arc::clone(&self.bus), Arc::clone(self)).await;
        self.plugins.write().push(plugin);
    }

    pub async fn shutdown_plugins(&self) {
        for plugin in self.plugins.read().iter() {
            plugin.stop().await;
        }
    }

    /// The single synchronous-looking entry point a transport layer wraps
    /// (spec.md §6: "this crate implements the Rust-native shape of that
    /// surface … a synchronous `submit(Command) -> Answer` entry point").
    pub async fn submit(&self, command: Command) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::Add { kif, note_id, partition } => self.handle_add(kif, note_id, partition).await,
            Command::Retract { target, partition } => self.handle_retract(target, partition).await,
            Command::Query { kif_pattern, kind, partition, limit } => {
                self.handle_query(kif_pattern, kind, partition, limit).await
            }
            Command::Pause => {
                self.paused.store(true, Ordering::SeqCst);
                Ok(CommandOutcome::Ack)
            }
            Command::Unpause => {
                self.paused.store(false, Ordering::SeqCst);
                Ok(CommandOutcome::Ack)
            }
            Command::Clear { partition } => self.handle_clear(partition).await,
            Command::GetStatus => Ok(self.handle_status()),
            Command::GetConfig => Ok(CommandOutcome::Config(Box::new(self.config()))),
            Command::SetConfig(new_config) => {
                for (partition, capacity) in &new_config.partition_capacity_overrides {
                    self.kb.set_capacity(partition, *capacity);
                }
                *self.config.write() = *new_config;
                Ok(CommandOutcome::Ack)
            }
        }
    }

    /// Run one priority-decay tick over `partition` (spec.md §4.3 "decay on
    /// every maintenance tick"). Intended to be called by a host on a timer;
    /// this crate does not schedule its own ticks (no internal runtime
    /// ownership beyond what a query/operator needs, §9 "no global mutable
    /// state").
    pub fn decay_tick(&self, partition: &PartitionId) {
        self.kb.decay(partition, self.config().decay_rate);
    }

    /// Evict down to the configured target fraction if `partition` is over
    /// capacity, retracting through the TMS and publishing
    /// `AssertionEvicted` for each (spec.md §4.3).
    async fn sweep_eviction(&self, partition: &PartitionId) {
        let config = self.config();
        let protected_ids = self.tms.active_premise_ids();
        let candidates =
            self.kb.eviction_candidates(partition, config.eviction_target_fraction, &protected_ids, &config.protected_symbols);
        for id in candidates {
            let outcome = self.tms.retract(id, RetractReason::Evicted);
            for record in outcome.retracted {
                let event = if record.reason == RetractReason::Evicted {
                    Event::AssertionEvicted { id: record.id, partition: record.partition.clone() }
                } else {
                    Event::AssertionRemoved {
                        id: record.id,
                        partition: record.partition.clone(),
                        reason: record.reason,
                    }
                };
                self.bus.publish(event).await;
            }
        }
    }

    async fn publish_commit(&self, assertion: &Arc<Assertion>, outcome: AddOutcome) {
        self.bus
            .publish(Event::AssertionAdded {
                id: assertion.id,
                partition: assertion.partition.clone(),
                term: assertion.term.clone(),
            })
            .await;
        for contradiction in outcome.contradictions {
            self.bus.publish(Event::ContradictionDetected(contradiction)).await;
        }
        for retraction in outcome.auto_retracted {
            self.bus
                .publish(Event::AssertionRemoved {
                    id: retraction.id,
                    partition: retraction.partition,
                    reason: retraction.reason,
                })
                .await;
        }
    }

    async fn handle_add(
        &self,
        kif: String,
        note_id: Option<Uuid>,
        partition: Option<PartitionId>,
    ) -> Result<CommandOutcome, CommandError> {
        if self.paused.load(Ordering::SeqCst) {
            return Ok(CommandOutcome::Ack);
        }
        let terms = parse_all(&kif)?;
        let partition = partition.unwrap_or_else(well_known::global);
        let mut assertions = Vec::new();
        let mut rule_ids = Vec::new();

        for term in terms {
            match self.input_plugin.classify(&term) {
                Classification::Rule(rule_term) => {
                    let rules = rules_from_term(&rule_term, || self.rules.next_id(), 0.5, note_id)
                        .ok_or_else(|| CommandError::NotClassifiable(rule_term.structural_id()))?;
                    for rule in rules {
                        let stored = self.rules.insert(rule);
                        rule_ids.push(stored.id);
                        self.bus.publish(Event::RuleAdded { id: stored.id, source_note_id: note_id }).await;
                    }
                }
                Classification::Assertion(assertion_term) => {
                    let mut potential = PotentialAssertion::new(assertion_term, partition.clone());
                    if let Some(note) = note_id {
                        potential = potential.with_source_note(note);
                    }
                    if let CommitOutcome::Created(created) = self.kb.commit(potential) {
                        let outcome = self.tms.add(&created, Vec::new());
                        self.publish_commit(&created, outcome).await;
                        assertions.push(created.id);

                        // tms.add above may have immediately retracted `created` as the
                        // weaker side of a contradiction; chaining off an inactive premise
                        // would derive consequents whose sole justification is already dead.
                        if created.is_active() {
                            let depth_limit = self.config().depth_limit;
                            let steps =
                                forward_chain(Arc::clone(&created), &self.kb, &self.tms, &self.rules, depth_limit, true);
                            for step in steps {
                                assertions.push(step.assertion.id);
                                self.publish_commit(&step.assertion, step.tms_outcome).await;
                            }
                        }
                    }
                }
                Classification::Query(_) => {
                    return Err(CommandError::NotClassifiable(
                        "query terms must be submitted via Command::Query, not add".to_string(),
                    ));
                }
            }
        }
        self.sweep_eviction(&partition).await;
        Ok(CommandOutcome::Added { assertions, rules: rule_ids })
    }

    async fn handle_retract(
        &self,
        target: RetractTarget,
        partition: Option<PartitionId>,
    ) -> Result<CommandOutcome, CommandError> {
        let ids: Vec<AssertionId> = match target {
            RetractTarget::ById(id) => {
                if !self.tms.is_known(id) {
                    return Err(CommandError::UnknownAssertion(id));
                }
                vec![id]
            }
            RetractTarget::ByRuleId(id) => {
                let Some(rule) = self.rules.remove(id) else {
                    return Err(CommandError::UnknownRule(id));
                };
                self.bus.publish(Event::RuleRemoved { id: rule.id, source_note_id: rule.source_note_id }).await;
                Vec::new()
            }
            RetractTarget::ByKif(kif) => {
                let term = parse_one(&kif)?;
                let partition = partition.unwrap_or_else(well_known::global);
                self.kb.find_by_pattern(&partition, &term).into_iter().map(|a| a.id).collect()
            }
            RetractTarget::ByRuleForm(form_key) => {
                for rule in self.rules.remove_by_form_key(&form_key) {
                    self.bus.publish(Event::RuleRemoved { id: rule.id, source_note_id: rule.source_note_id }).await;
                }
                Vec::new()
            }
            RetractTarget::ByNote(note_id) => {
                for rule in self.rules.remove_by_note(note_id) {
                    self.bus.publish(Event::RuleRemoved { id: rule.id, source_note_id: rule.source_note_id }).await;
                }
                Vec::new()
            }
        };

        let mut retracted = Vec::new();
        for id in ids {
            let outcome = self.tms.retract(id, RetractReason::Explicit);
            for record in outcome.retracted {
                self.bus
                    .publish(Event::AssertionRemoved {
                        id: record.id,
                        partition: record.partition.clone(),
                        reason: record.reason,
                    })
                    .await;
                retracted.push(record.id);
            }
        }
        Ok(CommandOutcome::Retracted(retracted))
    }

    async fn handle_query(
        &self,
        kif_pattern: String,
        kind: QueryKind,
        partition: Option<PartitionId>,
        limit: usize,
    ) -> Result<CommandOutcome, CommandError> {
        let pattern = parse_one(&kif_pattern)?;
        let partition = partition.unwrap_or_else(well_known::global);
        let config = self.config();
        let engine_query = EngineQuery { kind, pattern, partition, limit, deadline: config.default_query_deadline };
        let (answer, trace) = query::run(
            engine_query,
            &self.kb,
            &self.rules,
            &self.operators,
            config.depth_limit,
            config.access_boost,
        )
        .await;
        Ok(CommandOutcome::Query { answer, trace })
    }

    async fn handle_clear(&self, partition: Option<PartitionId>) -> Result<CommandOutcome, CommandError> {
        let partition = partition.unwrap_or_else(well_known::global);
        let ids: Vec<AssertionId> = self.kb.all_active(&partition).iter().map(|a| a.id).collect();
        for id in ids {
            let outcome = self.tms.retract(id, RetractReason::Explicit);
            for record in outcome.retracted {
                self.bus
                    .publish(Event::AssertionRemoved {
                        id: record.id,
                        partition: record.partition.clone(),
                        reason: record.reason,
                    })
                    .await;
            }
        }
        Ok(CommandOutcome::Ack)
    }

    fn handle_status(&self) -> CommandOutcome {
        let mut counts = FxHashMap::default();
        for partition in
            [well_known::global(), well_known::client_input(), well_known::user_feedback(), well_known::ui_actions()]
        {
            counts.insert(partition.clone(), self.kb.assertion_count(&partition));
        }
        CommandOutcome::Status { paused: self.paused.load(Ordering::SeqCst), assertion_counts: counts }
    }
}
