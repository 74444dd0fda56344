//! Stored-rule registry (spec.md §3 "Rule": added on external input, removed
//! by retraction request or note-scoped bulk retraction).

use crate::ids::{RuleId, RuleIdGen};
use crate::kb::Rule;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
pub struct RuleStore {
    rules: RwLock<FxHashMap<RuleId, Arc<Rule>>>,
    id_gen: RuleIdGen,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RuleId {
        self.id_gen.next()
    }

    pub fn insert(&self, rule: Rule) -> Arc<Rule> {
        let rule = Arc::new(rule);
        self.rules.write().insert(rule.id, Arc::clone(&rule));
        rule
    }

    pub fn get(&self, id: RuleId) -> Option<Arc<Rule>> {
        self.rules.read().get(&id).cloned()
    }

    pub fn remove(&self, id: RuleId) -> Option<Arc<Rule>> {
        self.rules.write().remove(&id)
    }

    /// Remove every rule sharing `form_key` — an `⇔` split removes both
    /// directions together (DESIGN.md Open Question (b)).
    pub fn remove_by_form_key(&self, form_key: &str) -> Vec<Arc<Rule>> {
        let mut guard = self.rules.write();
        let ids: Vec<RuleId> = guard
            .values()
            .filter(|r| r.form_key == form_key)
            .map(|r| r.id)
            .collect();
        ids.into_iter().filter_map(|id| guard.remove(&id)).collect()
    }

    pub fn remove_by_note(&self, note_id: Uuid) -> Vec<Arc<Rule>> {
        let mut guard = self.rules.write();
        let ids: Vec<RuleId> = guard
            .values()
            .filter(|r| r.source_note_id == Some(note_id))
            .map(|r| r.id)
            .collect();
        ids.into_iter().filter_map(|id| guard.remove(&id)).collect()
    }

    pub fn all(&self) -> Vec<Arc<Rule>> {
        self.rules.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
