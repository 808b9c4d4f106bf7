//! Move planning and execution.
//!
//! Lists the top level of a target directory, asks the [`ExtensionMap`] where
//! each file belongs, picks a destination that never overwrites anything, and
//! either moves the file there or records what would happen.

use crate::extension_map::ExtensionMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on `name (n).ext` candidates tried for one file.
pub const MAX_COLLISION_ATTEMPTS: u32 = 9999;

/// Whether a run touches the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Compute and report moves without creating folders or moving files.
    DryRun,
    /// Create folders and move files.
    Execute,
}

impl RunMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            RunMode::DryRun
        } else {
            RunMode::Execute
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == RunMode::DryRun
    }
}

/// Everything one run needs: where, with which rules, and how.
#[derive(Debug, Clone)]
pub struct RunContext {
    target: PathBuf,
    rules: ExtensionMap,
    mode: RunMode,
    protected: Vec<PathBuf>,
}

impl RunContext {
    /// Resolves `target` to an absolute directory path.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::TargetNotFound` if the path does not exist and
    /// `OrganizeError::TargetNotADirectory` if it is not a directory.
    pub fn new(target: &Path, rules: ExtensionMap, mode: RunMode) -> OrganizeResult<Self> {
        let resolved = fs::canonicalize(target).map_err(|source| OrganizeError::TargetNotFound {
            path: target.to_path_buf(),
            source,
        })?;

        if !resolved.is_dir() {
            return Err(OrganizeError::TargetNotADirectory { path: resolved });
        }

        Ok(Self {
            target: resolved,
            rules,
            mode,
            protected: Vec::new(),
        })
    }

    /// Marks `path` as never to be moved, e.g. the rule file the run was
    /// configured from.
    ///
    /// Both the entry itself and, if it is a link, the file it resolves to
    /// are protected.
    pub fn protect(mut self, path: &Path) -> Self {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if let (Ok(dir), Some(name)) = (fs::canonicalize(parent), path.file_name()) {
            self.protected.push(dir.join(name));
        }
        if let Ok(resolved) = fs::canonicalize(path)
            && !self.protected.contains(&resolved)
        {
            self.protected.push(resolved);
        }
        self
    }

    /// Whether `path`, an entry of the target directory, is protected.
    pub fn is_protected(&self, path: &Path) -> bool {
        self.protected.iter().any(|protected| protected == path)
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn rules(&self) -> &ExtensionMap {
        &self.rules
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }
}

/// A file's computed destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    /// The file as found in the target directory.
    pub source: PathBuf,
    /// Name of the folder the rules chose.
    pub folder: String,
    /// `target / folder / name`, disambiguated if that name was taken.
    pub destination: PathBuf,
}

/// What happened to one entry of the target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved,
    WouldMove,
    Skipped { reason: String },
    Failed { reason: String },
}

impl MoveOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, MoveOutcome::Failed { .. })
    }
}

/// Outcome record for one considered entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub source: PathBuf,
    /// Folder chosen by the rules; absent for skipped entries.
    pub folder: Option<String>,
    /// Final destination; absent when none could be computed.
    pub destination: Option<PathBuf>,
    #[serde(flatten)]
    pub outcome: MoveOutcome,
}

impl MoveRecord {
    fn planned(plan: PlannedMove, outcome: MoveOutcome) -> Self {
        Self {
            source: plan.source,
            folder: Some(plan.folder),
            destination: Some(plan.destination),
            outcome,
        }
    }

    fn skipped(source: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            source,
            folder: None,
            destination: None,
            outcome: MoveOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    /// File name of the source, for display.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Result of one run, in processing order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: PathBuf,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub records: Vec<MoveRecord>,
}

impl RunReport {
    /// True when at least one file failed; the CLI maps this to a non-zero exit code.
    pub fn has_failures(&self) -> bool {
        self.records.iter().any(|r| r.outcome.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &MoveRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn moved_count(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::Moved))
    }

    pub fn would_move_count(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::WouldMove))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(MoveOutcome::is_failure)
    }

    /// Moved (or would-move) files per destination folder.
    pub fn counts_by_folder(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            if let (Some(folder), MoveOutcome::Moved | MoveOutcome::WouldMove) =
                (&record.folder, &record.outcome)
            {
                *counts.entry(folder.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn count(&self, pred: impl Fn(&MoveOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Fatal errors: nothing has been touched when one of these is returned.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Target directory {} does not exist: {source}", .path.display())]
    TargetNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Target {} is not a directory", .path.display())]
    TargetNotADirectory { path: PathBuf },

    #[error("Error reading directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for run-level operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Per-file failures. These end up as [`MoveOutcome::Failed`] and never stop a run.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {} appeared before the move", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free name for {} in {} after {attempts} attempts", .name, .folder.display())]
    CollisionExhausted {
        name: String,
        folder: PathBuf,
        attempts: u32,
    },
}

/// Plans and, unless dry-running, performs the moves for `context`.
///
/// # Errors
///
/// Returns an [`OrganizeError`] if the target directory cannot be listed.
/// Per-file problems are reported in the returned records instead.
///
/// # Examples
///
/// ```no_run
/// use foldersort::extension_map::ExtensionMap;
/// use foldersort::file_organizer::{RunContext, RunMode, plan_and_apply};
/// use std::path::Path;
///
/// let context = RunContext::new(
///     Path::new("/home/me/Downloads"),
///     ExtensionMap::default(),
///     RunMode::DryRun,
/// )?;
/// let report = plan_and_apply(&context)?;
/// for record in &report.records {
///     println!("{} -> {:?}", record.source.display(), record.destination);
/// }
/// # Ok::<(), foldersort::file_organizer::OrganizeError>(())
/// ```
pub fn plan_and_apply(context: &RunContext) -> OrganizeResult<RunReport> {
    plan_and_apply_with(context, |_| {})
}

/// Like [`plan_and_apply`], calling `on_record` after each entry is handled.
pub fn plan_and_apply_with<F>(context: &RunContext, mut on_record: F) -> OrganizeResult<RunReport>
where
    F: FnMut(&MoveRecord),
{
    let started_at = Utc::now();
    let entries = list_entries(context.target())?;
    tracing::debug!(
        target_dir = %context.target().display(),
        entries = entries.len(),
        mode = ?context.mode(),
        "planning moves"
    );

    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(record) = FileOrganizer::process_entry(context, entry, &mut claimed) else {
            continue;
        };
        on_record(&record);
        records.push(record);
    }

    let report = RunReport {
        target: context.target().to_path_buf(),
        mode: context.mode(),
        started_at,
        records,
    };

    tracing::info!(
        moved = report.moved_count(),
        would_move = report.would_move_count(),
        skipped = report.skipped_count(),
        failed = report.failed_count(),
        "run finished"
    );
    Ok(report)
}

/// Lists the top level of `dir`, sorted by file name.
fn list_entries(dir: &Path) -> OrganizeResult<Vec<PathBuf>> {
    let read_dir = fs::read_dir(dir).map_err(|source| OrganizeError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    Ok(collect_sorted(dir, read_dir.map(|entry| entry.map(|e| e.path()))))
}

/// Collects entry paths sorted by file name, logging and dropping entries
/// that failed to read.
fn collect_sorted<I>(dir: &Path, entries: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = std::io::Result<PathBuf>>,
{
    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "could not read directory entry")
            }
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    paths
}

/// Splits `name` into stem and extension, the extension keeping its dot.
///
/// The extension starts at the last `.`; a dot in first position (hidden
/// files such as `.bashrc`) does not start one.
///
/// ```
/// use foldersort::file_organizer::split_extension;
///
/// assert_eq!(split_extension("report.pdf"), ("report", ".pdf"));
/// assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
/// assert_eq!(split_extension("README"), ("README", ""));
/// assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
/// ```
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// Per-file planning and moving.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Handles one directory entry. Returns `None` for entries that are not
    /// considered at all (directories and links to directories).
    fn process_entry(
        context: &RunContext,
        source: PathBuf,
        claimed: &mut HashSet<PathBuf>,
    ) -> Option<MoveRecord> {
        if context.is_protected(&source) {
            tracing::debug!(source = %source.display(), "leaving rule file in place");
            return Some(MoveRecord::skipped(source, "rule file in use"));
        }

        // Follows symlinks: a link to a directory is a directory here.
        let metadata = match fs::metadata(&source) {
            Ok(metadata) => metadata,
            Err(e) => {
                let link = fs::symlink_metadata(&source)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                let reason = if link {
                    "broken symbolic link".to_string()
                } else {
                    format!("could not read metadata: {}", e)
                };
                tracing::debug!(source = %source.display(), %reason, "skipping entry");
                return Some(MoveRecord::skipped(source, reason));
            }
        };

        if metadata.is_dir() {
            return None;
        }
        if !metadata.is_file() {
            tracing::debug!(source = %source.display(), "skipping special file");
            return Some(MoveRecord::skipped(source, "not a regular file"));
        }

        let plan = match Self::plan_move(context.target(), context.rules(), &source, claimed) {
            Ok(Some(plan)) => plan,
            Ok(None) => return Some(MoveRecord::skipped(source, "file name is not valid UTF-8")),
            Err(e) => {
                tracing::warn!(source = %source.display(), error = %e, "could not plan move");
                return Some(MoveRecord {
                    source,
                    folder: None,
                    destination: None,
                    outcome: MoveOutcome::Failed {
                        reason: e.to_string(),
                    },
                });
            }
        };
        claimed.insert(plan.destination.clone());

        tracing::debug!(
            source = %plan.source.display(),
            folder = %plan.folder,
            destination = %plan.destination.display(),
            "planned move"
        );

        let outcome = match context.mode() {
            RunMode::DryRun => MoveOutcome::WouldMove,
            RunMode::Execute => match Self::execute_move(&plan) {
                Ok(()) => MoveOutcome::Moved,
                Err(e) => {
                    tracing::warn!(source = %plan.source.display(), error = %e, "move failed");
                    MoveOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            },
        };

        Some(MoveRecord::planned(plan, outcome))
    }

    /// Computes where `source` should go.
    ///
    /// `claimed` holds destinations already handed out in this run, so that
    /// dry runs disambiguate exactly like real runs do. Returns `Ok(None)` when
    /// the file name is not valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `MoveError::CollisionExhausted` when no free name is found
    /// within [`MAX_COLLISION_ATTEMPTS`].
    pub fn plan_move(
        target: &Path,
        rules: &ExtensionMap,
        source: &Path,
        claimed: &HashSet<PathBuf>,
    ) -> Result<Option<PlannedMove>, MoveError> {
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };

        let (_, extension) = split_extension(name);
        let folder = rules.resolve(extension).to_string();
        let folder_dir = target.join(&folder);
        let destination = Self::free_destination(&folder_dir, name, claimed)?;

        Ok(Some(PlannedMove {
            source: source.to_path_buf(),
            folder,
            destination,
        }))
    }

    /// First of `name`, `stem (1).ext`, `stem (2).ext`, … that is neither on
    /// disk nor claimed.
    fn free_destination(
        folder_dir: &Path,
        name: &str,
        claimed: &HashSet<PathBuf>,
    ) -> Result<PathBuf, MoveError> {
        let candidate = folder_dir.join(name);
        if !is_taken(&candidate, claimed) {
            return Ok(candidate);
        }

        let (stem, extension) = split_extension(name);
        for n in 1..=MAX_COLLISION_ATTEMPTS {
            let candidate = folder_dir.join(format!("{} ({}){}", stem, n, extension));
            if !is_taken(&candidate, claimed) {
                return Ok(candidate);
            }
        }

        Err(MoveError::CollisionExhausted {
            name: name.to_string(),
            folder: folder_dir.to_path_buf(),
            attempts: MAX_COLLISION_ATTEMPTS,
        })
    }

    /// Creates the destination folder if needed and renames the file into it.
    ///
    /// The rename is atomic: on failure the file is still at its source.
    ///
    /// # Errors
    ///
    /// Returns a [`MoveError`] if the folder cannot be created, the
    /// destination has been taken since planning, or the rename fails.
    pub fn execute_move(plan: &PlannedMove) -> Result<(), MoveError> {
        if let Some(folder_dir) = plan.destination.parent() {
            fs::create_dir_all(folder_dir).map_err(|source| MoveError::DirectoryCreation {
                path: folder_dir.to_path_buf(),
                source,
            })?;
        }

        // rename(2) replaces existing files on Unix.
        if fs::symlink_metadata(&plan.destination).is_ok() {
            return Err(MoveError::DestinationExists {
                path: plan.destination.clone(),
            });
        }

        fs::rename(&plan.source, &plan.destination).map_err(|source| MoveError::Move {
            from: plan.source.clone(),
            to: plan.destination.clone(),
            source,
        })
    }
}

fn is_taken(path: &Path, claimed: &HashSet<PathBuf>) -> bool {
    claimed.contains(path) || fs::symlink_metadata(path).is_ok()
}
