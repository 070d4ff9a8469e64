use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use plugscan::discovery;
use plugscan::engine::{self, ScanOutcome};
use plugscan::loader::Limits;
use plugscan::monitor::{Monitor, Priority};
use plugscan::report::{self, OutputFormat, Severity};
use plugscan::rules::{Conventions, RuleSet};

#[derive(Parser, Debug)]
#[command(name = "plugscan")]
#[command(version)]
#[command(about = "Continuous rule-based vulnerability scanner for game-server plugins")]
struct Args {
    /// Enable verbose logging (to stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan plugin sources once and report findings
    Scan {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Lowest severity that affects the exit code (the emitted list
        /// always contains every finding)
        #[arg(long, default_value = "low")]
        min_severity: Severity,

        /// Output format for findings (stdout)
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// YAML file overriding the builtin naming conventions
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Maximum file size to parse, in bytes
        #[arg(long, default_value_t = Limits::default().max_file_size)]
        max_file_size: usize,
    },

    /// Watch plugin sources, rescanning on an interval
    Watch {
        /// Files or directories to watch
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Seconds between scan cycles
        #[arg(long, default_value = "5")]
        interval: u64,

        /// YAML file overriding the builtin naming conventions
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logging goes to stderr; stdout is reserved for findings output.
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialize logging");
        return ExitCode::from(2);
    }

    match run(args.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Scan {
            paths,
            min_severity,
            format,
            rules,
            max_file_size,
        } => {
            let rule_set = build_rules(rules.as_deref())?;
            let limits = Limits { max_file_size };
            let files = collect_sources(&paths)?;
            info!(files = files.len(), "starting scan");

            let outcome = engine::scan_files(&files, &rule_set, &limits);
            emit(&outcome, format)?;
            Ok(exit_code(&outcome, min_severity))
        }
        Command::Watch {
            paths,
            interval,
            rules,
        } => {
            let rule_set = build_rules(rules.as_deref())?;
            let files = collect_sources(&paths)?;

            let mut monitor = Monitor::new(rule_set, Limits::default());
            for file in &files {
                monitor
                    .watch(file, Priority::Normal)
                    .with_context(|| format!("cannot watch {}", file.display()))?;
            }
            monitor.run_continuous(Duration::from_secs(interval), None);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_rules(config: Option<&std::path::Path>) -> Result<RuleSet> {
    let conventions = match config {
        Some(path) => Conventions::from_yaml_file(path)
            .with_context(|| format!("loading rule conventions from {}", path.display()))?,
        None => Conventions::default(),
    };
    RuleSet::baseline(&conventions).context("building rule set")
}

fn collect_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let found = discovery::find_plugin_sources(path)
            .with_context(|| format!("discovering sources under {}", path.display()))?;
        if found.is_empty() {
            info!(path = %path.display(), "no plugin sources found");
        }
        files.extend(found);
    }
    Ok(files)
}

fn emit(outcome: &ScanOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", report::render_json(&outcome.findings)?);
        }
        OutputFormat::Text => {
            print!("{}", report::render_text(&outcome.findings));
        }
    }
    Ok(())
}

/// Exit code contract: 2 on any loader failure, 1 when a finding meets the
/// threshold, 0 otherwise.
fn exit_code(outcome: &ScanOutcome, min_severity: Severity) -> ExitCode {
    if outcome.load_failed {
        ExitCode::from(2)
    } else if report::meets_threshold(&outcome.findings, min_severity) {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
