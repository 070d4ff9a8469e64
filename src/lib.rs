//! plugscan: a rule-based structural vulnerability scanner for game-server
//! plugin sources.
//!
//! The pipeline is Loader → Matcher Engine (consuming the Rule Set) →
//! Reporter, with no feedback loops and no shared mutable state between
//! rules:
//! - [`loader`] parses one Java compilation unit into an immutable
//!   structural view.
//! - [`rules`] holds the ordered set of declarative detectors and their
//!   configurable naming conventions.
//! - [`engine`] walks the structural view once and collects findings
//!   deterministically.
//! - [`report`] renders findings for external consumption.
//! - [`monitor`] layers continuous scanning on top: queue, registry, risk
//!   scores and trends.

pub mod discovery;
pub mod engine;
pub mod error;
pub mod loader;
pub mod monitor;
pub mod report;
pub mod rules;

pub use engine::{scan_file, scan_files, scan_source, scan_unit, ScanOutcome};
pub use error::{RuleError, ScanError};
pub use loader::{Limits, Node, NodeId, NodeKind, SourceUnit};
pub use report::{Finding, OutputFormat, Severity};
pub use rules::{Conventions, Rule, RuleSet};
