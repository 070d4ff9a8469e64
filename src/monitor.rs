//! Continuous scanning supervision.
//!
//! Wraps the single-shot engine with the long-running pieces: a priority
//! scan queue, a registry of known plugins with per-plugin scan history,
//! risk scoring over findings, and trend tracking between consecutive scans.
//! Everything here is single-threaded; scans of distinct units share no
//! mutable state, so callers wanting parallelism can run one monitor per
//! worker.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{self, ScanOutcome};
use crate::error::ScanError;
use crate::loader::Limits;
use crate::report::{Finding, Severity};
use crate::rules::RuleSet;

/// Queue priority band. Entries are FIFO within a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

/// A queued scan request.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub name: String,
    pub priority: Priority,
    pub added_at: DateTime<Utc>,
}

/// FIFO-within-priority scan queue.
#[derive(Debug, Default)]
pub struct ScanQueue {
    entries: VecDeque<QueueEntry>,
}

impl ScanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a file for scanning. Missing files are rejected up front so the
    /// queue never holds dead entries.
    pub fn enqueue(&mut self, path: &Path, priority: Priority) -> Result<(), ScanError> {
        if !path.exists() {
            return Err(ScanError::Io {
                file: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        let entry = QueueEntry {
            path: path.to_path_buf(),
            name: plugin_name(path),
            priority,
            added_at: Utc::now(),
        };
        // Insert at the end of this entry's priority band.
        let position = self
            .entries
            .iter()
            .position(|e| e.priority > entry.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn plugin_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Severity weights used to fold findings into a risk score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RiskWeights {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub internal: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            low: 3,
            medium: 7,
            high: 12,
            internal: 5,
        }
    }
}

/// Weighted sum of findings by severity.
pub fn risk_score(findings: &[Finding], weights: &RiskWeights) -> u32 {
    findings
        .iter()
        .map(|f| match f.severity {
            Severity::Low => weights.low,
            Severity::Medium => weights.medium,
            Severity::High => weights.high,
            Severity::Internal => weights.internal,
        })
        .sum()
}

/// One completed scan in a plugin's history.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub at: DateTime<Utc>,
    pub risk_score: u32,
    pub finding_count: usize,
}

/// Direction of the risk score between the two most recent scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Increasing => write!(f, "increasing"),
            Trend::Decreasing => write!(f, "decreasing"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

/// Everything the registry knows about one plugin.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub path: PathBuf,
    pub first_added: DateTime<Utc>,
    pub scan_count: u64,
    pub last_scan: Option<DateTime<Utc>>,
    pub history: Vec<TrendPoint>,
}

/// Registry of plugins under continuous observation.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginRecord>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a plugin known; re-registering an existing name is a no-op.
    pub fn register(&mut self, name: &str, path: &Path) {
        self.plugins
            .entry(name.to_string())
            .or_insert_with(|| PluginRecord {
                path: path.to_path_buf(),
                first_added: Utc::now(),
                scan_count: 0,
                last_scan: None,
                history: Vec::new(),
            });
    }

    /// Record a completed scan for a plugin.
    pub fn record_scan(&mut self, name: &str, score: u32, finding_count: usize) {
        let Some(record) = self.plugins.get_mut(name) else {
            warn!(plugin = name, "scan recorded for unregistered plugin");
            return;
        };
        let now = Utc::now();
        record.scan_count += 1;
        record.last_scan = Some(now);
        record.history.push(TrendPoint {
            at: now,
            risk_score: score,
            finding_count,
        });
    }

    /// Risk trend for a plugin, once it has at least two scans.
    pub fn trend(&self, name: &str) -> Option<Trend> {
        let history = &self.plugins.get(name)?.history;
        let [.., previous, current] = history.as_slice() else {
            return None;
        };
        Some(match current.risk_score.cmp(&previous.risk_score) {
            std::cmp::Ordering::Greater => Trend::Increasing,
            std::cmp::Ordering::Less => Trend::Decreasing,
            std::cmp::Ordering::Equal => Trend::Stable,
        })
    }

    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.plugins.get(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Serializable snapshot, sorted by plugin name for stable output.
    pub fn status(&self) -> RegistryStatus {
        let mut plugins: Vec<PluginStatus> = self
            .plugins
            .iter()
            .map(|(name, record)| PluginStatus {
                name: name.clone(),
                scan_count: record.scan_count,
                last_scan: record.last_scan,
                trend: self.trend(name),
            })
            .collect();
        plugins.sort_by(|a, b| a.name.cmp(&b.name));
        RegistryStatus {
            total_plugins: self.plugins.len(),
            plugins,
        }
    }
}

/// Snapshot of the registry for external consumption.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub total_plugins: usize,
    pub plugins: Vec<PluginStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginStatus {
    pub name: String,
    pub scan_count: u64,
    pub last_scan: Option<DateTime<Utc>>,
    pub trend: Option<Trend>,
}

/// Drives repeated scans over a set of watched plugin sources.
pub struct Monitor {
    queue: ScanQueue,
    registry: PluginRegistry,
    rules: RuleSet,
    limits: Limits,
    weights: RiskWeights,
    watched: Vec<PathBuf>,
}

impl Monitor {
    pub fn new(rules: RuleSet, limits: Limits) -> Self {
        Self {
            queue: ScanQueue::new(),
            registry: PluginRegistry::new(),
            rules,
            limits,
            weights: RiskWeights::default(),
            watched: Vec::new(),
        }
    }

    pub fn with_weights(mut self, weights: RiskWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Add a file to the watch set, register it, and queue an initial scan.
    pub fn watch(&mut self, path: &Path, priority: Priority) -> Result<(), ScanError> {
        self.queue.enqueue(path, priority)?;
        self.registry.register(&plugin_name(path), path);
        self.watched.push(path.to_path_buf());
        Ok(())
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Scan the next queued plugin, if any, and fold the result into the
    /// registry.
    pub fn process_next(&mut self) -> Option<(String, ScanOutcome)> {
        let entry = self.queue.pop()?;
        let outcome = engine::scan_file(&entry.path, &self.rules, &self.limits);
        let score = risk_score(&outcome.findings, &self.weights);
        self.registry
            .record_scan(&entry.name, score, outcome.findings.len());

        match self.registry.trend(&entry.name) {
            Some(trend) => info!(
                plugin = %entry.name,
                risk_score = score,
                findings = outcome.findings.len(),
                trend = %trend,
                "scan complete"
            ),
            None => info!(
                plugin = %entry.name,
                risk_score = score,
                findings = outcome.findings.len(),
                "scan complete"
            ),
        }
        Some((entry.name, outcome))
    }

    /// Drain the queue, returning the merged findings in scan order.
    pub fn drain(&mut self) -> Vec<Finding> {
        let mut findings = Vec::new();
        while let Some((_, outcome)) = self.process_next() {
            findings.extend(outcome.findings);
        }
        findings
    }

    /// Run continuous scanning: every `interval`, re-queue all watched files
    /// and drain. `max_cycles` bounds the loop for callers that need to stop
    /// (`None` runs until the process is killed).
    pub fn run_continuous(&mut self, interval: Duration, max_cycles: Option<u64>) {
        info!(
            interval_secs = interval.as_secs(),
            watched = self.watched.len(),
            "continuous scanning started"
        );
        let mut cycle: u64 = 0;
        loop {
            self.drain();
            cycle += 1;
            if max_cycles.is_some_and(|max| cycle >= max) {
                break;
            }
            std::thread::sleep(interval);
            let watched = self.watched.clone();
            for path in &watched {
                if let Err(e) = self.queue.enqueue(path, Priority::Normal) {
                    warn!(file = %path.display(), "dropping watched file: {e}");
                }
            }
        }
        info!(cycles = cycle, "continuous scanning stopped");
    }
}
