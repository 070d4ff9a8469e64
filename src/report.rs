//! Findings and the reporter.
//!
//! A [`Finding`] is the single output shape of the scanner: rule matches,
//! parse failures, and internal rule errors all render to the same record so
//! consumers never deal with a separate error channel. The reporter is a pure
//! transformation over an already-ordered finding list; it never filters or
//! reorders. The severity threshold only affects the exit-code decision.

use serde::{Deserialize, Serialize};

/// Rule id used for findings synthesized from loader failures.
pub const PARSE_ERROR_RULE: &str = "parse-error";

/// Rule id used for findings synthesized from isolated rule failures.
pub const RULE_EVALUATION_ERROR_RULE: &str = "rule-evaluation-error";

/// Finding severity, ordered from least to most severe.
///
/// `Internal` marks scanner-side problems (parse failures, rule evaluation
/// errors) and sorts above every real severity so it always passes an
/// exit-code threshold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Internal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Internal => write!(f, "internal"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "internal" => Ok(Severity::Internal),
            other => Err(format!(
                "unknown severity '{other}' (expected low, medium, high or internal)"
            )),
        }
    }
}

/// A single reported rule match (or synthesized error record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule id that produced this finding.
    pub rule: String,
    pub severity: Severity,
    /// Source file the finding points into.
    pub file: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    pub message: String,
}

/// Output format for rendered findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Render findings as a JSON array, preserving order.
pub fn render_json(findings: &[Finding]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(findings)
}

/// Render findings as human-readable lines, preserving order.
pub fn render_text(findings: &[Finding]) -> String {
    let mut out = String::new();
    for f in findings {
        out.push_str(&format!(
            "{}:{}:{}: [{}] {}: {}\n",
            f.file, f.line, f.column, f.severity, f.rule, f.message
        ));
    }
    out
}

/// True when at least one finding meets or exceeds the threshold.
pub fn meets_threshold(findings: &[Finding], min_severity: Severity) -> bool {
    findings.iter().any(|f| f.severity >= min_severity)
}
