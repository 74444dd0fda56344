//! Plugin lifecycle and input classification (spec.md §4.6, §1 "InputPlugin
//! classifies term as rule/assertion/query").

use crate::cognition::Cognition;
use crate::bus::EventBus;
use crate::engine::operators::BoxFuture;
use crate::term::Term;
use std::sync::Arc;

/// How a just-parsed top-level term was classified by input ingestion
/// (spec.md §1 data flow).
#[derive(Debug, Clone)]
pub enum Classification {
    Rule(Term),
    Assertion(Term),
    Query(Term),
}

/// Classifies surface input terms. The default implementation recognizes
/// the reserved rule/query operators; a plugin may register a more
/// specialized classifier ahead of it.
pub trait InputPlugin: Send + Sync {
    fn classify(&self, term: &Term) -> Classification;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInputPlugin;

impl InputPlugin for DefaultInputPlugin {
    fn classify(&self, term: &Term) -> Classification {
        match term.operator() {
            Some("=>") | Some("<=>") | Some("⇔") => Classification::Rule(term.clone()),
            Some("ask-bindings") | Some("ask-true-false") | Some("achieve-goal") => {
                Classification::Query(term.clone())
            }
            _ => Classification::Assertion(term.clone()),
        }
    }
}

/// A long-lived extension: registers handlers, operators, or command
/// endpoints on `start`, and tears them down on `stop`. Never holds a raw
/// assertion reference outside a handler call (spec.md §4.6).
pub trait Plugin: Send + Sync {
    fn start<'a>(&'a self, bus: Arc<EventBus>, cognition: Arc<Cognition>) -> BoxFuture<'a, ()>;
    fn stop<'a>(&'a self) -> BoxFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::parser::parse_one;

    #[test]
    fn classifies_implication_as_rule() {
        let plugin = DefaultInputPlugin;
        let term = parse_one("(=> (p ?x) (q ?x))").unwrap();
        assert!(matches!(plugin.classify(&term), Classification::Rule(_)));
    }

    #[test]
    fn classifies_plain_term_as_assertion() {
        let plugin = DefaultInputPlugin;
        let term = parse_one("(likes alice bob)").unwrap();
        assert!(matches!(plugin.classify(&term), Classification::Assertion(_)));
    }

    #[test]
    fn classifies_query_operator() {
        let plugin = DefaultInputPlugin;
        let term = parse_one("(ask-bindings (likes alice ?x))").unwrap();
        assert!(matches!(plugin.classify(&term), Classification::Query(_)));
    }
}
