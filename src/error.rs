//! Error taxonomy for the scanner.
//!
//! Two failure classes exist, mirroring the output contract:
//! - [`ScanError`]: a source unit could not be loaded or parsed. Aborts that
//!   unit's scan only; the process and any sibling units continue.
//! - [`RuleError`]: a single rule failed on a single node. Isolated by the
//!   matcher engine and reported as a finding, never fatal.

use thiserror::Error;

/// Failure to produce a [`crate::loader::SourceUnit`] from an input file.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The file could not be read.
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The text is not syntactically well-formed for the plugin grammar.
    #[error("parse error in {file} at {line}:{column}: {detail}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        detail: String,
    },

    /// The file exceeds the configured size limit.
    #[error("{file} is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        file: String,
        size: usize,
        limit: usize,
    },

    /// The rule conventions configuration is invalid (e.g. a bad pattern).
    #[error("invalid rule configuration: {0}")]
    Config(String),
}

/// A rule's predicate failed on one node.
///
/// Carries only a human-readable detail; the engine attaches rule id and
/// node location when converting this into a finding.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RuleError(pub String);

impl RuleError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}
