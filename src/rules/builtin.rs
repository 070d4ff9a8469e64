//! The four baseline detectors.
//!
//! Each rule matches one of the vulnerability patterns planted in the sample
//! plugin fixture: unsynchronized async inventory mutation, event handlers
//! without permission checks, packet handlers without validation, and
//! transactions started but never settled.

use regex::Regex;

use crate::error::{RuleError, ScanError};
use crate::loader::{Node, NodeId, NodeKind, SourceUnit};
use crate::report::Severity;

use super::conventions::{Conventions, NameList};
use super::Rule;

pub const UNSYNCHRONIZED_ASYNC_MUTATION: &str = "unsynchronized-async-mutation";
pub const MISSING_PERMISSION_CHECK: &str = "missing-permission-check";
pub const UNVALIDATED_PACKET_HANDLER: &str = "unvalidated-packet-handler";
pub const DANGLING_TRANSACTION: &str = "dangling-transaction";

/// Instantiate the baseline rules in their fixed evaluation order.
pub fn baseline_rules(conventions: &Conventions) -> Result<Vec<Box<dyn Rule>>, ScanError> {
    Ok(vec![
        Box::new(UnsynchronizedAsyncMutation::new(conventions)),
        Box::new(MissingPermissionCheck::new(conventions)),
        Box::new(UnvalidatedPacketHandler::new(conventions)?),
        Box::new(DanglingTransaction::new(conventions)?),
    ])
}

fn compile(pattern: &str, what: &str) -> Result<Regex, ScanError> {
    Regex::new(pattern)
        .map_err(|e| ScanError::Config(format!("bad {what} pattern '{pattern}': {e}")))
}

/// True when a `Synchronized` region sits between `from` and `stop` on the
/// ancestor chain (exclusive on both ends).
fn synchronized_between(unit: &SourceUnit, from: NodeId, stop: NodeId) -> bool {
    for ancestor in unit.ancestors(from) {
        if ancestor.id == stop {
            return false;
        }
        if ancestor.kind == NodeKind::Synchronized {
            return true;
        }
    }
    false
}

/// Flags an async-spawning call whose task body mutates a shared container
/// outside any synchronized region.
pub struct UnsynchronizedAsyncMutation {
    spawners: NameList,
    mutators: NameList,
}

impl UnsynchronizedAsyncMutation {
    pub fn new(conventions: &Conventions) -> Self {
        Self {
            spawners: NameList::new(&conventions.async_spawners),
            mutators: NameList::new(&conventions.container_mutators),
        }
    }

    fn unguarded_mutation<'a>(&self, unit: &'a SourceUnit, node: NodeId) -> Option<&'a Node> {
        unit.descendants(node).iter().find(|d| {
            d.kind == NodeKind::Call
                && self.mutators.matches(&d.name)
                && !synchronized_between(unit, d.id, node)
        })
    }
}

impl Rule for UnsynchronizedAsyncMutation {
    fn id(&self) -> &str {
        UNSYNCHRONIZED_ASYNC_MUTATION
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn applies_to(&self) -> NodeKind {
        NodeKind::Call
    }

    fn matches(&self, unit: &SourceUnit, node: NodeId) -> Result<bool, RuleError> {
        if !self.spawners.matches(&unit.node(node).name) {
            return Ok(false);
        }
        Ok(self.unguarded_mutation(unit, node).is_some())
    }

    fn message(&self, unit: &SourceUnit, node: NodeId) -> String {
        let spawner = &unit.node(node).name;
        match self.unguarded_mutation(unit, node) {
            Some(m) => {
                let target = m.detail.as_deref().unwrap_or("a shared container");
                format!(
                    "async task spawned by {spawner} mutates {target} via {} (line {}) \
                     without synchronization",
                    m.name, m.line
                )
            }
            None => format!("async task spawned by {spawner} mutates shared state"),
        }
    }
}

/// Flags an event-handler method that changes state without a prior
/// permission or operator check.
pub struct MissingPermissionCheck {
    annotations: NameList,
    checks: NameList,
    changers: NameList,
}

impl MissingPermissionCheck {
    pub fn new(conventions: &Conventions) -> Self {
        Self {
            annotations: NameList::new(&conventions.event_annotations),
            checks: NameList::new(&conventions.permission_checks),
            changers: NameList::new(&conventions.state_changers),
        }
    }

    fn is_event_handler(&self, unit: &SourceUnit, node: NodeId) -> bool {
        unit.node(node).children.iter().any(|&c| {
            let child = unit.node(c);
            child.kind == NodeKind::Annotation && self.annotations.matches(&child.name)
        })
    }

    fn first_state_change<'a>(&self, unit: &'a SourceUnit, node: NodeId) -> Option<&'a Node> {
        unit.descendants(node)
            .iter()
            .find(|d| d.kind == NodeKind::Call && self.changers.matches(&d.name))
    }
}

impl Rule for MissingPermissionCheck {
    fn id(&self) -> &str {
        MISSING_PERMISSION_CHECK
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn applies_to(&self) -> NodeKind {
        NodeKind::Method
    }

    fn matches(&self, unit: &SourceUnit, node: NodeId) -> Result<bool, RuleError> {
        if !self.is_event_handler(unit, node) {
            return Ok(false);
        }
        let Some(change) = self.first_state_change(unit, node) else {
            return Ok(false);
        };
        // A check only counts if it happens before the first state change.
        let checked = unit.descendants(node).iter().any(|d| {
            d.kind == NodeKind::Call && d.id < change.id && self.checks.matches(&d.name)
        });
        Ok(!checked)
    }

    fn message(&self, unit: &SourceUnit, node: NodeId) -> String {
        let method = &unit.node(node).name;
        match self.first_state_change(unit, node) {
            Some(change) => format!(
                "event handler {method} calls {} (line {}) without a permission check",
                change.name, change.line
            ),
            None => format!("event handler {method} changes state without a permission check"),
        }
    }
}

/// Flags a packet-handler method that dispatches a response without any
/// prior validation or rate limiting.
pub struct UnvalidatedPacketHandler {
    handler_name: Regex,
    packet_type: Regex,
    validations: NameList,
    dispatches: NameList,
}

impl UnvalidatedPacketHandler {
    pub fn new(conventions: &Conventions) -> Result<Self, ScanError> {
        Ok(Self {
            handler_name: compile(&conventions.packet_handler_pattern, "packet handler")?,
            packet_type: compile(&conventions.packet_type_pattern, "packet type")?,
            validations: NameList::new(&conventions.validation_calls),
            dispatches: NameList::new(&conventions.dispatch_calls),
        })
    }

    fn is_packet_handler(&self, unit: &SourceUnit, node: NodeId) -> bool {
        if self.handler_name.is_match(&unit.node(node).name) {
            return true;
        }
        unit.node(node).children.iter().any(|&c| {
            let child = unit.node(c);
            child.kind == NodeKind::Param
                && child
                    .detail
                    .as_deref()
                    .is_some_and(|ty| self.packet_type.is_match(ty))
        })
    }

    fn first_dispatch<'a>(&self, unit: &'a SourceUnit, node: NodeId) -> Option<&'a Node> {
        unit.descendants(node)
            .iter()
            .find(|d| d.kind == NodeKind::Call && self.dispatches.matches(&d.name))
    }
}

impl Rule for UnvalidatedPacketHandler {
    fn id(&self) -> &str {
        UNVALIDATED_PACKET_HANDLER
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn applies_to(&self) -> NodeKind {
        NodeKind::Method
    }

    fn matches(&self, unit: &SourceUnit, node: NodeId) -> Result<bool, RuleError> {
        if !self.is_packet_handler(unit, node) {
            return Ok(false);
        }
        let Some(dispatch) = self.first_dispatch(unit, node) else {
            return Ok(false);
        };
        let validated = unit.descendants(node).iter().any(|d| {
            d.kind == NodeKind::Call && d.id < dispatch.id && self.validations.matches(&d.name)
        });
        Ok(!validated)
    }

    fn message(&self, unit: &SourceUnit, node: NodeId) -> String {
        let method = &unit.node(node).name;
        match self.first_dispatch(unit, node) {
            Some(d) => format!(
                "packet handler {method} dispatches via {} (line {}) without validation \
                 or rate limiting",
                d.name, d.line
            ),
            None => format!("packet handler {method} dispatches without validation"),
        }
    }
}

/// Flags a transaction-like object that is started but neither committed nor
/// rolled back in its enclosing block.
pub struct DanglingTransaction {
    transaction_type: Regex,
    begins: NameList,
    settles: NameList,
}

impl DanglingTransaction {
    pub fn new(conventions: &Conventions) -> Result<Self, ScanError> {
        Ok(Self {
            transaction_type: compile(&conventions.transaction_type_pattern, "transaction type")?,
            begins: NameList::new(&conventions.begin_calls),
            settles: NameList::new(&conventions.settle_calls),
        })
    }

    /// Calls on `receiver` inside the block enclosing the declaration.
    fn scope_calls<'a>(
        &self,
        unit: &'a SourceUnit,
        decl: NodeId,
        receiver: &'a str,
    ) -> impl Iterator<Item = &'a Node> {
        let scope = unit
            .enclosing(decl, NodeKind::Block)
            .map(|b| b.id)
            .unwrap_or(decl);
        unit.descendants(scope).iter().filter(move |d| {
            d.kind == NodeKind::Call && d.detail.as_deref() == Some(receiver)
        })
    }
}

impl Rule for DanglingTransaction {
    fn id(&self) -> &str {
        DANGLING_TRANSACTION
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn applies_to(&self) -> NodeKind {
        NodeKind::VarDecl
    }

    fn matches(&self, unit: &SourceUnit, node: NodeId) -> Result<bool, RuleError> {
        let decl = unit.node(node);
        match decl.detail.as_deref() {
            Some(ty) if self.transaction_type.is_match(ty) => {}
            _ => return Ok(false),
        }
        if decl.name.is_empty() {
            return Err(RuleError::new(
                "transaction declaration has no variable name",
            ));
        }

        let mut started = false;
        let mut settled = false;
        for call in self.scope_calls(unit, node, &decl.name) {
            if self.begins.matches(&call.name) {
                started = true;
            }
            if self.settles.matches(&call.name) {
                settled = true;
            }
        }
        Ok(started && !settled)
    }

    fn message(&self, unit: &SourceUnit, node: NodeId) -> String {
        let decl = unit.node(node);
        format!(
            "transaction '{}' ({}) is started but never committed or rolled back \
             before leaving its block",
            decl.name,
            decl.detail.as_deref().unwrap_or("transaction")
        )
    }
}
