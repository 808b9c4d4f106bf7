//! foldersort - sort the files of a directory into folders by extension
//!
//! This library resolves file extensions to folder names through a
//! configurable rule set, plans non-destructive moves for the top level of a
//! directory, and either performs them or reports them as a dry run.

pub mod cli;
pub mod config;
pub mod extension_map;
pub mod file_organizer;
pub mod output;

pub use config::{ConfigError, RulesSource, load_rules};
pub use extension_map::{ExtensionMap, OTHER_FOLDER};
pub use file_organizer::{
    FileOrganizer, MoveOutcome, MoveRecord, OrganizeError, PlannedMove, RunContext, RunMode,
    RunReport, plan_and_apply,
};

pub use cli::{Cli, run_cli};
