//! Command-line interface module for foldersort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Default target resolution
//! - Rule loading and run orchestration
//! - Mapping a run to a process exit code

use crate::config::{ConfigError, RulesSource, load_rules};
use crate::file_organizer::{
    OrganizeError, RunContext, RunMode, RunReport, plan_and_apply, plan_and_apply_with,
};
use crate::output::OutputFormatter;
use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Exit code when every file was moved or skipped cleanly.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code when at least one file failed.
pub const EXIT_PARTIAL_FAILURE: u8 = 1;
/// Exit code for configuration or target errors; nothing was touched.
pub const EXIT_FATAL: u8 = 2;

/// Sort the files of a directory into folders chosen by their extension.
#[derive(Debug, Clone, Parser)]
#[command(name = "foldersort", version, about)]
pub struct Cli {
    /// Directory to organize [default: your Downloads folder]
    pub target: Option<PathBuf>,

    /// Show what would be moved without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Rule file (TOML, or JSON when it ends in .json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Errors that stop a run before any file is touched.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Organize(#[from] OrganizeError),

    #[error("Could not determine your Downloads folder; pass a target directory")]
    NoDefaultTarget,

    #[error("Could not serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result of a completed run, ready to be rendered.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub rules_source: RulesSource,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        if self.report.has_failures() {
            EXIT_PARTIAL_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

/// The directory to organize: the one given, or the user's Downloads folder.
pub fn resolve_target(target: Option<&Path>) -> Result<PathBuf, CliError> {
    if let Some(path) = target {
        return Ok(path.to_path_buf());
    }

    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .ok_or(CliError::NoDefaultTarget)
}

/// Loads rules, validates the target, and runs the organizer.
///
/// # Errors
///
/// Returns a [`CliError`] for configuration and target problems. Per-file
/// failures are part of the returned report.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use foldersort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["foldersort", "--dry-run", "/path/to/directory"]);
/// match run_cli(&cli) {
///     Ok(outcome) => println!("{} records", outcome.report.records.len()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<RunOutcome, CliError> {
    run_with_progress(cli, false)
}

fn run_with_progress(cli: &Cli, show_progress: bool) -> Result<RunOutcome, CliError> {
    let (rules, rules_source) = load_rules(cli.config.as_deref())?;
    tracing::debug!(source = %rules_source, folders = rules.len(), "rules loaded");
    for folder in rules.folders() {
        tracing::debug!(
            folder,
            extensions = ?rules.extensions(folder).unwrap_or_default(),
            "rule"
        );
    }

    let target = resolve_target(cli.target.as_deref())?;
    let mut context = RunContext::new(&target, rules, RunMode::from_dry_run(cli.dry_run))?;
    if let RulesSource::File(path) = &rules_source {
        context = context.protect(path);
    }

    let report = if show_progress {
        let spinner = OutputFormatter::create_spinner();
        let report = plan_and_apply_with(&context, |record| {
            spinner.set_message(record.file_name());
            spinner.inc(1);
        });
        spinner.finish_and_clear();
        report?
    } else {
        plan_and_apply(&context)?
    };

    Ok(RunOutcome {
        report,
        rules_source,
    })
}

/// Runs the CLI end to end: executes, renders and returns the exit code.
pub fn main_with(cli: &Cli) -> u8 {
    // The spinner only accompanies real text-mode runs.
    let show_progress = !cli.json && !cli.dry_run;

    let outcome = match run_with_progress(cli, show_progress) {
        Ok(outcome) => outcome,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            return EXIT_FATAL;
        }
    };

    if cli.json {
        match OutputFormatter::report_json(&outcome.report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                OutputFormatter::error(&CliError::from(e).to_string());
                return EXIT_FATAL;
            }
        }
    } else {
        OutputFormatter::print_report(&outcome.report, &outcome.rules_source.to_string());
    }

    outcome.exit_code()
}
