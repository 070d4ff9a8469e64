//! Matcher engine: one deterministic pass over a unit's structural view.
//!
//! A single pre-order traversal evaluates every rule whose node-kind filter
//! matches each node, in rule-set order. Finding order is therefore fixed at
//! (node pre-order index, rule index) and a scan over the same input with the
//! same rule set is idempotent. Rules are isolated from each other: one
//! rule's failure on one node becomes an internal finding and the traversal
//! continues.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::ScanError;
use crate::loader::{self, Limits, SourceUnit};
use crate::report::{Finding, Severity, PARSE_ERROR_RULE, RULE_EVALUATION_ERROR_RULE};
use crate::rules::RuleSet;

/// Result of scanning one or more inputs.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Ordered findings across all scanned units.
    pub findings: Vec<Finding>,
    /// True when at least one unit failed to load or parse.
    pub load_failed: bool,
}

impl ScanOutcome {
    fn merge(&mut self, other: ScanOutcome) {
        self.findings.extend(other.findings);
        self.load_failed |= other.load_failed;
    }
}

/// Evaluate every rule against every candidate node of one unit.
pub fn scan_unit(unit: &SourceUnit, rules: &RuleSet) -> Vec<Finding> {
    let mut findings = Vec::new();

    for node in unit.nodes() {
        for rule in rules.rules() {
            if rule.applies_to() != node.kind {
                continue;
            }
            match rule.matches(unit, node.id) {
                Ok(true) => findings.push(Finding {
                    rule: rule.id().to_string(),
                    severity: rule.severity(),
                    file: unit.file.clone(),
                    line: node.line,
                    column: node.column,
                    message: rule.message(unit, node.id),
                }),
                Ok(false) => {}
                Err(e) => {
                    warn!(rule = rule.id(), line = node.line, "rule evaluation failed: {e}");
                    findings.push(Finding {
                        rule: RULE_EVALUATION_ERROR_RULE.to_string(),
                        severity: Severity::Internal,
                        file: unit.file.clone(),
                        line: node.line,
                        column: node.column,
                        message: format!("rule {} failed: {e}", rule.id()),
                    });
                }
            }
        }
    }

    debug!(
        file = %unit.file,
        nodes = unit.nodes().len(),
        findings = findings.len(),
        "unit scan complete"
    );
    findings
}

/// Scan a single file, converting loader failures into findings.
///
/// A failed load yields exactly one internal finding for the unit and marks
/// the outcome; it never aborts a batch.
pub fn scan_file(path: &Path, rules: &RuleSet, limits: &Limits) -> ScanOutcome {
    match loader::load(path, limits) {
        Ok(unit) => ScanOutcome {
            findings: scan_unit(&unit, rules),
            load_failed: false,
        },
        Err(e) => ScanOutcome {
            findings: vec![loader_error_finding(&path.display().to_string(), &e)],
            load_failed: true,
        },
    }
}

/// Scan in-memory source text, converting loader failures into findings.
pub fn scan_source(file: &str, text: &str, rules: &RuleSet, limits: &Limits) -> ScanOutcome {
    match loader::load_source(file, text, limits) {
        Ok(unit) => ScanOutcome {
            findings: scan_unit(&unit, rules),
            load_failed: false,
        },
        Err(e) => ScanOutcome {
            findings: vec![loader_error_finding(file, &e)],
            load_failed: true,
        },
    }
}

/// Scan a batch of files; one file's failure never suppresses another's
/// findings.
pub fn scan_files(paths: &[std::path::PathBuf], rules: &RuleSet, limits: &Limits) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    for path in paths {
        outcome.merge(scan_file(path, rules, limits));
    }
    outcome
}

fn loader_error_finding(file: &str, error: &ScanError) -> Finding {
    let (line, column) = match error {
        ScanError::Parse { line, column, .. } => (*line, *column),
        _ => (1, 1),
    };
    Finding {
        rule: PARSE_ERROR_RULE.to_string(),
        severity: Severity::Internal,
        file: file.to_string(),
        line,
        column,
        message: error.to_string(),
    }
}
