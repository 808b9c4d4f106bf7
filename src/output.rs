//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status lines,
//! the progress spinner, the per-folder summary table and the JSON report.

use crate::file_organizer::{MoveOutcome, MoveRecord, RunMode, RunReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// OutputFormatter::success("Directory organized!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a spinner that counts processed files.
    ///
    /// Falls back to the default spinner style if the template is rejected.
    pub fn create_spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {pos} files {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// One line describing a record, relative to the target directory.
    pub fn record_line(record: &MoveRecord, target: &Path) -> String {
        let name = record.file_name();
        let destination = record
            .destination
            .as_deref()
            .map(|d| relative(d, target))
            .unwrap_or_default();

        match &record.outcome {
            MoveOutcome::Moved => format!("{} {} → {}", "✓".green(), name, destination),
            MoveOutcome::WouldMove => {
                format!("{} {} → {}", "→".cyan(), name, destination)
            }
            MoveOutcome::Skipped { reason } => {
                format!("{} {} ({})", "-".dimmed(), name, reason.dimmed())
            }
            MoveOutcome::Failed { reason } => format!("{} {}: {}", "✗".red(), name, reason.red()),
        }
    }

    /// Prints the full human-readable report of a run.
    pub fn print_report(report: &RunReport, rules_source: &str) {
        let dry_run = report.mode.is_dry_run();

        if dry_run {
            Self::dry_run_notice(&format!("Analyzing contents of: {}", report.target.display()));
        } else {
            Self::info(&format!("Organizing contents of: {}", report.target.display()));
        }
        println!("Rules: {}", rules_source);

        if report.is_empty() {
            Self::success("Nothing to do: no files at the top level.");
            return;
        }

        Self::header(if dry_run {
            "Files would be organized as follows:"
        } else {
            "Files organized:"
        });
        for record in &report.records {
            let line = Self::record_line(record, &report.target);
            if record.outcome.is_failure() {
                eprintln!(" {}", line);
            } else {
                println!(" {}", line);
            }
        }

        Self::summary_table(&report.counts_by_folder(), report.mode);

        if report.skipped_count() > 0 {
            Self::warning(&format!("{} entries skipped", report.skipped_count()));
        }

        if report.has_failures() {
            Self::error(&format!(
                "{} files could not be organized. Please review errors above.",
                report.failed_count()
            ));
        } else if dry_run {
            println!();
            Self::success("Dry run complete. No files were modified.");
            println!(
                "Run 'foldersort {}' (without --dry-run) to execute the organization.",
                report.target.display()
            );
        } else {
            println!();
            Self::success("Organization complete!");
        }
    }

    /// Prints a summary table with file counts per destination folder.
    pub fn summary_table(folder_counts: &BTreeMap<String, usize>, mode: RunMode) {
        Self::header(if mode.is_dry_run() {
            "DRY RUN SUMMARY"
        } else {
            "SUMMARY"
        });

        let total: usize = folder_counts.values().sum();
        let width = folder_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(6); // "Folder"

        println!("{:<width$} | {}", "Folder".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));

        for (folder, count) in folder_counts {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total),
            width = width
        );
    }

    /// Serializes the report as pretty JSON.
    pub fn report_json(report: &RunReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
