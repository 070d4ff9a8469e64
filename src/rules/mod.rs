//! Rule set: declarative structural detectors.
//!
//! A [`Rule`] is a pure predicate over one arena node plus its ancestor and
//! descendant context, with fixed metadata (id, severity, node-kind filter).
//! Rules never mutate anything and never consult global state; the same node
//! always yields the same answer and the same message.

pub mod builtin;
pub mod conventions;

pub use conventions::{Conventions, NameList};

use crate::error::{RuleError, ScanError};
use crate::loader::{NodeId, NodeKind, SourceUnit};
use crate::report::Severity;

/// A named, pure structural predicate plus message template.
pub trait Rule: Send + Sync {
    /// Stable identifier, unique within a rule set.
    fn id(&self) -> &str;

    /// Severity attached to every finding this rule produces.
    fn severity(&self) -> Severity;

    /// The node kind this rule is evaluated on.
    fn applies_to(&self) -> NodeKind;

    /// Does the rule match this node?
    ///
    /// An `Err` is isolated by the engine: it becomes an internal finding
    /// for this node and the scan continues.
    fn matches(&self, unit: &SourceUnit, node: NodeId) -> Result<bool, RuleError>;

    /// Render the finding message for a node that matched.
    fn message(&self, unit: &SourceUnit, node: NodeId) -> String;
}

/// An ordered collection of rules with unique ids.
///
/// Built once at startup and read-only afterwards; the engine evaluates
/// rules in the order they were registered.
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    /// Build a rule set, rejecting duplicate rule ids.
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Result<Self, ScanError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id().to_string()) {
                return Err(ScanError::Config(format!(
                    "duplicate rule id '{}'",
                    rule.id()
                )));
            }
        }
        Ok(Self { rules })
    }

    /// The four baseline detectors, parameterized by naming conventions.
    pub fn baseline(conventions: &Conventions) -> Result<Self, ScanError> {
        Self::new(builtin::baseline_rules(conventions)?)
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(&'static str);

    impl Rule for Stub {
        fn id(&self) -> &str {
            self.0
        }
        fn severity(&self) -> Severity {
            Severity::Low
        }
        fn applies_to(&self) -> NodeKind {
            NodeKind::Call
        }
        fn matches(&self, _: &SourceUnit, _: NodeId) -> Result<bool, RuleError> {
            Ok(false)
        }
        fn message(&self, _: &SourceUnit, _: NodeId) -> String {
            String::new()
        }
    }

    #[test]
    fn duplicate_rule_ids_are_rejected() {
        let result = RuleSet::new(vec![Box::new(Stub("a")), Box::new(Stub("a"))]);
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn baseline_contains_four_rules_in_order() {
        let set = RuleSet::baseline(&Conventions::default()).unwrap();
        let ids: Vec<_> = set.rules().iter().map(|r| r.id()).collect();
        assert_eq!(
            ids,
            vec![
                builtin::UNSYNCHRONIZED_ASYNC_MUTATION,
                builtin::MISSING_PERMISSION_CHECK,
                builtin::UNVALIDATED_PACKET_HANDLER,
                builtin::DANGLING_TRANSACTION,
            ]
        );
    }
}
