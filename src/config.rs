//! Rule file discovery and decoding.
//!
//! A rule file maps folder names to the extensions they claim. Two formats are
//! accepted, chosen by file extension (`.json` for JSON, anything else is read
//! as TOML):
//!
//! ```toml
//! Images = [".jpg", ".jpeg", ".png"]
//! Documents = [".pdf", ".txt"]
//! Other = []
//! ```
//!
//! ```json
//! { "Images": [".jpg", ".jpeg", ".png"], "Documents": [".pdf", ".txt"], "Other": [] }
//! ```
//!
//! Folder order in the file is kept: when two folders claim the same
//! extension, the one written first wins.

use crate::extension_map::ExtensionMap;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory rule file looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".foldersort.toml";

/// Errors raised while locating, reading or validating rules.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("Could not read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid TOML/JSON mapping of folder names to extension lists.
    #[error("Invalid configuration {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    /// The rule set declares no folders at all.
    #[error("Configuration declares no folders")]
    EmptyRules,

    #[error("Invalid folder name '{folder}': {reason}")]
    InvalidFolderName { folder: String, reason: String },

    #[error("Folder '{0}' is declared more than once")]
    DuplicateFolder(String),

    #[error("Invalid extension '{extension}' for folder '{folder}': {reason}")]
    InvalidExtension {
        folder: String,
        extension: String,
        reason: String,
    },
}

/// On-disk format of a rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything but `.json` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Where the rules of a run came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesSource {
    File(PathBuf),
    BuiltIn,
}

impl fmt::Display for RulesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulesSource::File(path) => write!(f, "{}", path.display()),
            RulesSource::BuiltIn => write!(f, "built-in rules"),
        }
    }
}

/// Loads the rule set for a run.
///
/// Lookup order:
/// 1. `config_path`, if given (it must exist)
/// 2. `.foldersort.toml` in the current directory
/// 3. `<user config dir>/foldersort/config.toml`
/// 4. the built-in rules
///
/// # Errors
///
/// Returns a [`ConfigError`] if the chosen file is missing, unreadable,
/// malformed, or describes an invalid rule set.
pub fn load_rules(config_path: Option<&Path>) -> Result<(ExtensionMap, RulesSource), ConfigError> {
    if let Some(path) = config_path {
        return load_rules_from_file(path).map(|map| (map, RulesSource::File(path.to_path_buf())));
    }

    for candidate in default_locations() {
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "using discovered rule file");
            let map = load_rules_from_file(&candidate)?;
            return Ok((map, RulesSource::File(candidate)));
        }
    }

    tracing::debug!("no rule file found, using built-in rules");
    Ok((ExtensionMap::default(), RulesSource::BuiltIn))
}

/// Reads and validates a rule file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist, `ConfigError::Io`
/// if it cannot be read, `ConfigError::Parse` if decoding fails, and the
/// validation errors of [`ExtensionMap::from_entries`].
pub fn load_rules_from_file(path: &Path) -> Result<ExtensionMap, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_rules(&content, ConfigFormat::from_path(path)).map_err(|e| match e {
        ConfigError::Parse { reason, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// Decodes rule file contents in the given format.
///
/// Parse failures carry an empty path; [`load_rules_from_file`] fills it in.
pub fn parse_rules(content: &str, format: ConfigFormat) -> Result<ExtensionMap, ConfigError> {
    let parse_error = |reason: String| ConfigError::Parse {
        path: PathBuf::new(),
        reason,
    };

    let RuleEntries(entries) = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?
        }
    };

    ExtensionMap::from_entries(entries)
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(config_dir) = dirs::config_dir() {
        locations.push(config_dir.join("foldersort").join("config.toml"));
    }
    locations
}

/// Folder entries in the order the file declares them.
///
/// Deserialized through a map visitor so that neither format sorts the keys;
/// duplicate keys are passed through and rejected by validation.
struct RuleEntries(Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for RuleEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RuleEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of folder names to lists of extensions")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((folder, extensions)) =
                    access.next_entry::<String, Vec<String>>()?
                {
                    entries.push((folder, extensions));
                }
                Ok(RuleEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension_map::OTHER_FOLDER;
    use tempfile::TempDir;

    #[test]
    fn test_parse_toml_rules() {
        let map = parse_rules(
            r#"
Images = [".jpg", ".png"]
Documents = [".txt"]
Other = []
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(map.resolve(".png"), "Images");
        assert_eq!(map.resolve(".txt"), "Documents");
        assert_eq!(map.resolve(".zip"), OTHER_FOLDER);
    }

    #[test]
    fn test_parse_json_rules() {
        let map = parse_rules(
            r#"{"Images": [".jpg"], "Documents": [".txt"], "Other": []}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(map.resolve(".jpg"), "Images");
        assert_eq!(map.resolve(".txt"), "Documents");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_toml_keeps_declaration_order() {
        let map = parse_rules(
            r#"
Zeta = [".txt"]
Alpha = [".txt", ".md"]
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(map.folders().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
        assert_eq!(map.resolve(".txt"), "Zeta");
        assert_eq!(map.resolve(".md"), "Alpha");
    }

    #[test]
    fn test_json_keeps_declaration_order() {
        let map = parse_rules(
            r#"{"Zeta": [".txt"], "Alpha": [".txt"]}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(map.resolve(".txt"), "Zeta");
    }

    #[test]
    fn test_json_duplicate_folder_rejected() {
        let result = parse_rules(
            r#"{"Images": [".jpg"], "Images": [".png"]}"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::DuplicateFolder(_))));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(
            parse_rules("", ConfigFormat::Toml),
            Err(ConfigError::EmptyRules)
        ));
        assert!(matches!(
            parse_rules("{}", ConfigFormat::Json),
            Err(ConfigError::EmptyRules)
        ));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        assert!(matches!(
            parse_rules(r#"Images = ".jpg""#, ConfigFormat::Toml),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            parse_rules(r#"[".jpg"]"#, ConfigFormat::Json),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            parse_rules(r#"{"Images": [1, 2]}"#, ConfigFormat::Json),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_extension_in_file_rejected() {
        let result = parse_rules(r#"Images = ["jpg"]"#, ConfigFormat::Toml);
        assert!(matches!(result, Err(ConfigError::InvalidExtension { .. })));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("rules.json")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("rules.JSON")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("rules.toml")),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new(".foldersort")),
            ConfigFormat::Toml
        );
    }

    #[test]
    fn test_load_rules_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("rules.json");
        fs::write(&path, r#"{"Pictures": [".jpg"]}"#).expect("Failed to write config");

        let (map, source) = load_rules(Some(path.as_path())).expect("Failed to load rules");
        assert_eq!(map.resolve(".jpg"), "Pictures");
        assert_eq!(source, RulesSource::File(path));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("missing.toml");

        let result = load_rules(Some(path.as_path()));
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_parse_error_reports_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "Images = [").expect("Failed to write config");

        match load_rules_from_file(&path) {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_rules_source_display() {
        assert_eq!(RulesSource::BuiltIn.to_string(), "built-in rules");
        assert_eq!(
            RulesSource::File(PathBuf::from("rules.toml")).to_string(),
            "rules.toml"
        );
    }
}
