//! End-to-end scans over the bundled plugin fixtures.

use std::path::PathBuf;

use pretty_assertions::assert_eq;

use plugscan::engine::{scan_files, scan_source};
use plugscan::loader::Limits;
use plugscan::report::{self, Severity, PARSE_ERROR_RULE};
use plugscan::rules::{builtin, Conventions, RuleSet};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test-fixtures/plugins")
        .join(name)
}

fn baseline() -> RuleSet {
    RuleSet::baseline(&Conventions::default()).unwrap()
}

#[test]
fn vulnerable_fixture_trips_every_rule() {
    let outcome = scan_files(
        &[fixture("VulnerablePlugin.java")],
        &baseline(),
        &Limits::default(),
    );
    assert!(!outcome.load_failed);

    for rule in [
        builtin::UNSYNCHRONIZED_ASYNC_MUTATION,
        builtin::MISSING_PERMISSION_CHECK,
        builtin::UNVALIDATED_PACKET_HANDLER,
        builtin::DANGLING_TRANSACTION,
    ] {
        assert!(
            outcome.findings.iter().any(|f| f.rule == rule),
            "expected a {rule} finding, got: {:#?}",
            outcome.findings
        );
    }
}

#[test]
fn hardened_fixture_is_quiet() {
    let outcome = scan_files(
        &[fixture("HardenedPlugin.java")],
        &baseline(),
        &Limits::default(),
    );
    assert!(!outcome.load_failed);
    assert_eq!(outcome.findings, vec![]);
}

#[test]
fn broken_fixture_yields_one_parse_error_and_nothing_else() {
    let outcome = scan_files(
        &[fixture("BrokenPlugin.java")],
        &baseline(),
        &Limits::default(),
    );
    assert!(outcome.load_failed);
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].rule, PARSE_ERROR_RULE);
    assert_eq!(outcome.findings[0].severity, Severity::Internal);
}

#[test]
fn broken_fixture_does_not_suppress_sibling_findings() {
    let outcome = scan_files(
        &[
            fixture("BrokenPlugin.java"),
            fixture("VulnerablePlugin.java"),
        ],
        &baseline(),
        &Limits::default(),
    );
    assert!(outcome.load_failed);
    assert!(outcome
        .findings
        .iter()
        .any(|f| f.rule == PARSE_ERROR_RULE));
    assert!(outcome
        .findings
        .iter()
        .any(|f| f.rule == builtin::DANGLING_TRANSACTION));
}

#[test]
fn scan_output_is_byte_identical_across_runs() {
    let paths = [fixture("VulnerablePlugin.java")];
    let first = scan_files(&paths, &baseline(), &Limits::default());
    let second = scan_files(&paths, &baseline(), &Limits::default());
    assert_eq!(
        report::render_json(&first.findings).unwrap(),
        report::render_json(&second.findings).unwrap()
    );
    assert_eq!(
        report::render_text(&first.findings),
        report::render_text(&second.findings)
    );
}

const ITEM_SPAWN_UNCHECKED: &str =
    "        event.setCancelled(false);";
const ITEM_SPAWN_CHECKED: &str =
    "        if (player.hasPermission(\"items.spawn\")) { event.setCancelled(false); }";

/// Injecting a permission check into one handler removes exactly that
/// handler's finding; every other finding is untouched. The injection keeps
/// line numbers stable so the remaining findings can be compared verbatim.
#[test]
fn permission_check_injection_is_isolated() {
    let base = std::fs::read_to_string(fixture("VulnerablePlugin.java")).unwrap();
    assert!(base.contains(ITEM_SPAWN_UNCHECKED));
    let patched = base.replace(ITEM_SPAWN_UNCHECKED, ITEM_SPAWN_CHECKED);

    let rules = baseline();
    let limits = Limits::default();
    let before = scan_source("VulnerablePlugin.java", &base, &rules, &limits);
    let after = scan_source("VulnerablePlugin.java", &patched, &rules, &limits);

    let spawn_handler_findings = |findings: &[plugscan::Finding]| {
        findings
            .iter()
            .filter(|f| {
                f.rule == builtin::MISSING_PERMISSION_CHECK && f.message.contains("onItemSpawn")
            })
            .count()
    };
    assert_eq!(spawn_handler_findings(&before.findings), 1);
    assert_eq!(spawn_handler_findings(&after.findings), 0);

    let others = |findings: &[plugscan::Finding]| {
        findings
            .iter()
            .filter(|f| {
                !(f.rule == builtin::MISSING_PERMISSION_CHECK
                    && f.message.contains("onItemSpawn"))
            })
            .cloned()
            .collect::<Vec<_>>()
    };
    assert_eq!(others(&before.findings), others(&after.findings));
}

#[test]
fn severity_threshold_drives_the_exit_decision() {
    let outcome = scan_files(
        &[fixture("VulnerablePlugin.java")],
        &baseline(),
        &Limits::default(),
    );
    // The fixture has medium and high findings but nothing internal.
    assert!(report::meets_threshold(&outcome.findings, Severity::Low));
    assert!(report::meets_threshold(&outcome.findings, Severity::High));
    assert!(!report::meets_threshold(&outcome.findings, Severity::Internal));
}

#[test]
fn custom_conventions_change_what_matches() {
    // With a conventions file that knows nothing about Bukkit names, the
    // vulnerable fixture looks clean.
    let conventions = Conventions {
        event_annotations: vec!["WebHook".to_string()],
        async_spawners: vec!["defer".to_string()],
        packet_handler_pattern: "^unused".to_string(),
        packet_type_pattern: "^Nothing".to_string(),
        transaction_type_pattern: "LedgerEntry$".to_string(),
        ..Conventions::default()
    };
    let rules = RuleSet::baseline(&conventions).unwrap();
    let outcome = scan_files(
        &[fixture("VulnerablePlugin.java")],
        &rules,
        &Limits::default(),
    );
    assert_eq!(outcome.findings, vec![]);
}
