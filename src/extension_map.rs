//! Extension-to-folder rules.
//!
//! An [`ExtensionMap`] maps folder names to the file extensions they claim and
//! answers the one question the organizer asks of it: which folder does a file
//! with this extension belong in?
//!
//! # Examples
//!
//! ```
//! use foldersort::extension_map::{ExtensionMap, OTHER_FOLDER};
//!
//! let map = ExtensionMap::from_entries(vec![
//!     ("Images".to_string(), vec![".jpg".to_string(), ".png".to_string()]),
//!     ("Documents".to_string(), vec![".txt".to_string()]),
//! ])
//! .unwrap();
//!
//! assert_eq!(map.resolve(".JPG"), "Images");
//! assert_eq!(map.resolve(".txt"), "Documents");
//! assert_eq!(map.resolve(".zip"), OTHER_FOLDER);
//! assert_eq!(map.resolve(""), OTHER_FOLDER);
//! ```

use crate::config::ConfigError;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Folder that receives every file whose extension no rule claims.
pub const OTHER_FOLDER: &str = "Other";

/// One folder and the extensions it claims, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FolderRule {
    name: String,
    extensions: Vec<String>,
}

/// Validated folder-to-extensions rule set.
///
/// Folders keep the order in which they were declared. Extensions are stored
/// lowercased and compared case-insensitively.
///
/// When the same extension is declared under several folders, the folder
/// declared first wins and later claims are ignored (a warning is logged for
/// each one).
#[derive(Debug, Clone)]
pub struct ExtensionMap {
    folders: Vec<FolderRule>,
    lookup: HashMap<String, usize>,
}

impl ExtensionMap {
    /// Builds a map from `(folder, extensions)` pairs in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule set is empty, a folder name is
    /// empty, is `.` or `..`, contains a path separator or is declared twice,
    /// or if an extension does not look like `.ext`.
    pub fn from_entries(entries: Vec<(String, Vec<String>)>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyRules);
        }

        let mut folders: Vec<FolderRule> = Vec::with_capacity(entries.len());
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for (name, extensions) in entries {
            validate_folder_name(&name)?;
            if folders.iter().any(|rule| rule.name == name) {
                return Err(ConfigError::DuplicateFolder(name));
            }

            let index = folders.len();
            let mut normalized = Vec::with_capacity(extensions.len());
            for extension in extensions {
                validate_extension(&name, &extension)?;
                let lowered = extension.to_lowercase();

                match lookup.entry(lowered.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(index);
                    }
                    Entry::Occupied(slot) => {
                        let owner = *slot.get();
                        if owner != index {
                            tracing::warn!(
                                extension = %lowered,
                                kept = %folders[owner].name,
                                ignored = %name,
                                "extension declared under several folders; keeping the first"
                            );
                        }
                    }
                }

                if !normalized.contains(&lowered) {
                    normalized.push(lowered);
                }
            }

            folders.push(FolderRule {
                name,
                extensions: normalized,
            });
        }

        Ok(Self { folders, lookup })
    }

    /// Returns the folder a file with `extension` belongs in.
    ///
    /// `extension` is the filename suffix including its dot (`".pdf"`); a bare
    /// `"pdf"` is accepted too. Empty or unclaimed extensions resolve to
    /// [`OTHER_FOLDER`].
    pub fn resolve(&self, extension: &str) -> &str {
        let trimmed = extension.trim_start_matches('.');
        if trimmed.is_empty() {
            return OTHER_FOLDER;
        }

        let key = format!(".{}", trimmed.to_lowercase());
        self.lookup
            .get(&key)
            .map(|&index| self.folders[index].name.as_str())
            .unwrap_or(OTHER_FOLDER)
    }

    /// Folder names in declaration order.
    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.folders.iter().map(|rule| rule.name.as_str())
    }

    /// The lowercased extensions declared for `folder`, if the folder exists.
    pub fn extensions(&self, folder: &str) -> Option<&[String]> {
        self.folders
            .iter()
            .find(|rule| rule.name == folder)
            .map(|rule| rule.extensions.as_slice())
    }

    /// Number of declared folders.
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// Always false for a successfully built map.
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

impl Default for ExtensionMap {
    /// The built-in rules used when no configuration file is found.
    fn default() -> Self {
        let entries = DEFAULT_RULES
            .iter()
            .map(|(folder, extensions)| {
                (
                    folder.to_string(),
                    extensions.iter().map(|ext| ext.to_string()).collect(),
                )
            })
            .collect();

        // Built-in rules are static and known to be valid.
        match Self::from_entries(entries) {
            Ok(map) => map,
            Err(e) => unreachable!("built-in rules are invalid: {e}"),
        }
    }
}

const DEFAULT_RULES: &[(&str, &[&str])] = &[
    (
        "Documents",
        &[
            ".pdf", ".doc", ".docx", ".txt", ".odt", ".rtf", ".epub", ".csv", ".xls", ".xlsx",
        ],
    ),
    (
        "Images",
        &[
            ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".ico", ".svg",
        ],
    ),
    ("Videos", &[".mp4", ".mov", ".avi", ".mkv", ".wmv"]),
    ("Audio", &[".mp3", ".wav", ".flac", ".aac"]),
    ("Archives", &[".zip", ".rar", ".7z", ".tar", ".gz"]),
    ("Applications", &[".exe", ".dmg", ".pkg", ".msi", ".iso"]),
];

fn validate_folder_name(name: &str) -> Result<(), ConfigError> {
    let reason = if name.trim().is_empty() {
        Some("folder name is empty")
    } else if name == "." || name == ".." {
        Some("folder name must not be '.' or '..'")
    } else if name.contains(['/', '\\']) {
        Some("folder name must not contain a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidFolderName {
            folder: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn validate_extension(folder: &str, extension: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidExtension {
        folder: folder.to_string(),
        extension: extension.to_string(),
        reason: reason.to_string(),
    };

    let Some(suffix) = extension.strip_prefix('.') else {
        return Err(invalid("extensions must start with '.'"));
    };
    if suffix.is_empty() {
        return Err(invalid("extension has nothing after the dot"));
    }
    // Only the final suffix of a filename is ever compared.
    if suffix.contains('.') {
        return Err(invalid("only single suffixes such as '.gz' can match"));
    }
    if suffix.contains(['/', '\\']) {
        return Err(invalid("extension must not contain a path separator"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(rules: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        rules
            .iter()
            .map(|(folder, exts)| {
                (
                    folder.to_string(),
                    exts.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect()
    }

    fn sample_map() -> ExtensionMap {
        ExtensionMap::from_entries(entries(&[
            ("Images", &[".jpg", ".png"]),
            ("Documents", &[".txt", ".pdf"]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_resolve_declared_extensions() {
        let map = sample_map();
        assert_eq!(map.resolve(".jpg"), "Images");
        assert_eq!(map.resolve(".png"), "Images");
        assert_eq!(map.resolve(".txt"), "Documents");
        assert_eq!(map.resolve(".pdf"), "Documents");
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let map = sample_map();
        assert_eq!(map.resolve(".JPG"), "Images");
        assert_eq!(map.resolve(".Pdf"), "Documents");

        let upper = ExtensionMap::from_entries(entries(&[("Images", &[".PNG"])])).unwrap();
        assert_eq!(upper.resolve(".png"), "Images");
    }

    #[test]
    fn test_resolve_unknown_and_empty_fall_back_to_other() {
        let map = sample_map();
        assert_eq!(map.resolve(".zip"), OTHER_FOLDER);
        assert_eq!(map.resolve(""), OTHER_FOLDER);
        assert_eq!(map.resolve("."), OTHER_FOLDER);
    }

    #[test]
    fn test_resolve_accepts_bare_extension() {
        let map = sample_map();
        assert_eq!(map.resolve("jpg"), "Images");
    }

    #[test]
    fn test_first_declared_folder_wins() {
        let map = ExtensionMap::from_entries(entries(&[
            ("Texts", &[".txt"]),
            ("Documents", &[".txt", ".pdf"]),
        ]))
        .unwrap();

        assert_eq!(map.resolve(".txt"), "Texts");
        assert_eq!(map.resolve(".pdf"), "Documents");
    }

    #[test]
    fn test_duplicate_across_case_keeps_first() {
        let map = ExtensionMap::from_entries(entries(&[
            ("Pictures", &[".JPG"]),
            ("Images", &[".jpg"]),
        ]))
        .unwrap();
        assert_eq!(map.resolve(".jpg"), "Pictures");
    }

    #[test]
    fn test_other_with_no_extensions_is_allowed() {
        let map = ExtensionMap::from_entries(entries(&[
            ("Images", &[".jpg"]),
            ("Other", &[]),
        ]))
        .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve(".zip"), OTHER_FOLDER);
        assert_eq!(map.extensions("Other"), Some(&[][..]));
    }

    #[test]
    fn test_explicit_other_can_claim_extensions() {
        let map = ExtensionMap::from_entries(entries(&[("Other", &[".tmp"])])).unwrap();
        assert_eq!(map.resolve(".tmp"), OTHER_FOLDER);
        assert_eq!(map.resolve(".jpg"), OTHER_FOLDER);
    }

    #[test]
    fn test_folders_keep_declaration_order() {
        let map = ExtensionMap::from_entries(entries(&[
            ("Zeta", &[".z"]),
            ("Alpha", &[".a"]),
            ("Mid", &[".m"]),
        ]))
        .unwrap();

        let names: Vec<&str> = map.folders().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_extensions_are_lowercased_and_deduplicated() {
        let map =
            ExtensionMap::from_entries(entries(&[("Images", &[".JPG", ".jpg", ".Png"])])).unwrap();
        assert_eq!(
            map.extensions("Images"),
            Some(&[".jpg".to_string(), ".png".to_string()][..])
        );
        assert_eq!(map.extensions("Missing"), None);
    }

    #[test]
    fn test_empty_rules_rejected() {
        let result = ExtensionMap::from_entries(Vec::new());
        assert!(matches!(result, Err(ConfigError::EmptyRules)));
    }

    #[test]
    fn test_invalid_folder_names_rejected() {
        for name in ["", "  ", ".", "..", "a/b", "a\\b"] {
            let result = ExtensionMap::from_entries(entries(&[(name, &[".txt"])]));
            assert!(
                matches!(result, Err(ConfigError::InvalidFolderName { .. })),
                "folder name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_duplicate_folder_rejected() {
        let result = ExtensionMap::from_entries(entries(&[
            ("Images", &[".jpg"]),
            ("Images", &[".png"]),
        ]));
        assert!(matches!(result, Err(ConfigError::DuplicateFolder(name)) if name == "Images"));
    }

    #[test]
    fn test_invalid_extensions_rejected() {
        for ext in ["jpg", ".", ".tar.gz", "./x", ""] {
            let result = ExtensionMap::from_entries(entries(&[("Files", &[ext])]));
            assert!(
                matches!(result, Err(ConfigError::InvalidExtension { .. })),
                "extension {:?} should be rejected",
                ext
            );
        }
    }

    #[test]
    fn test_default_rules() {
        let map = ExtensionMap::default();
        assert_eq!(map.resolve(".pdf"), "Documents");
        assert_eq!(map.resolve(".PNG"), "Images");
        assert_eq!(map.resolve(".mkv"), "Videos");
        assert_eq!(map.resolve(".flac"), "Audio");
        assert_eq!(map.resolve(".7z"), "Archives");
        assert_eq!(map.resolve(".iso"), "Applications");
        assert_eq!(map.resolve(".unknown"), OTHER_FOLDER);
        assert!(!map.is_empty());
    }
}
