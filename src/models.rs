//! Core data models for the library exporter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ExportError;

/// Reserved index key holding the total asset count
pub const ALL_KEY: &str = "all";

/// Modification-time index (`mtime.json`)
///
/// Maps asset id to its last-known modification time in milliseconds since
/// the epoch. The reserved `"all"` entry holds the total asset count and is
/// never an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MtimeIndex(pub HashMap<String, i64>);

impl MtimeIndex {
    /// Total asset count from the `"all"` entry
    pub fn total(&self) -> Option<i64> {
        self.0.get(ALL_KEY).copied()
    }

    /// Asset entries sorted by id, without the `"all"` entry
    pub fn assets(&self) -> Vec<(&str, i64)> {
        let mut entries: Vec<(&str, i64)> = self
            .0
            .iter()
            .filter(|(id, _)| id.as_str() != ALL_KEY)
            .map(|(id, mtime)| (id.as_str(), *mtime))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Library-wide metadata document (`metadata.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryInfo {
    /// Physical folder tree
    #[serde(default)]
    pub folders: Vec<Folder>,
    /// Rule-defined smart folders
    #[serde(default)]
    pub smart_folders: Vec<SmartFolder>,
}

/// A physical folder in the library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children: Vec<Folder>,
}

/// A named, rule-defined virtual grouping of assets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartFolder {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub children: Vec<SmartFolder>,
}

/// How the rules of a condition combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchMode {
    /// Every rule must hold
    #[default]
    And,
    /// At least one rule must hold
    Or,
}

/// A group of rules, optionally negated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "match", default)]
    pub match_mode: MatchMode,
    /// `"TRUE"` keeps the combined result, `"FALSE"` negates it
    #[serde(default = "default_boolean")]
    pub boolean: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_boolean() -> String {
    "TRUE".to_string()
}

impl Condition {
    /// Whether the condition result is negated
    pub fn is_negated(&self) -> bool {
        self.boolean.eq_ignore_ascii_case("FALSE")
    }
}

/// A single smart-folder rule
///
/// Property and method stay as strings so that unknown ones surface as
/// per-asset rule errors instead of failing the library load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub property: String,
    pub method: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Per-asset metadata (`images/<id>.info/metadata.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetInfo {
    pub id: String,
    /// Display name, also the content file stem
    pub name: String,
    /// File extension without the dot
    pub ext: String,
    pub is_deleted: bool,
    pub tags: Vec<String>,
    /// Ids of the physical folders the asset belongs to
    pub folders: Vec<String>,
    pub annotation: String,
    pub url: String,
    pub star: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub size: Option<i64>,
}

impl AssetInfo {
    /// Content file name: `<name>.<ext>`, or just the name without an extension
    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.ext)
        }
    }
}

/// What happened to a single asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetOutcome {
    /// Content was copied to the destination
    Copied { bytes: u64 },
    /// Destination already up to date, left untouched
    UpToDate,
    /// Asset is flagged deleted and was skipped
    Deleted,
}

impl AssetOutcome {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetOutcome::Copied { .. } => "copied",
            AssetOutcome::UpToDate => "up_to_date",
            AssetOutcome::Deleted => "deleted",
        }
    }
}

/// Result of an export run
#[derive(Debug, Default, Serialize)]
pub struct ExportResult {
    /// Number of asset entries in the index
    pub total_assets: u64,
    /// Assets whose content was copied
    pub copied: u64,
    /// Assets already up to date
    pub up_to_date: u64,
    /// Assets skipped because they are flagged deleted
    pub deleted: u64,
    /// Assets whose task failed
    pub failed: u64,
    /// Total bytes written to the destination
    pub bytes_copied: u64,
    /// Per-asset errors, one per failed task
    #[serde(skip)]
    pub errors: Vec<ExportError>,
    /// Total export duration in milliseconds
    pub duration_ms: u64,
}

impl ExportResult {
    /// Create a new empty export result
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one asset task
    pub fn record(&mut self, outcome: Result<AssetOutcome, ExportError>) {
        match outcome {
            Ok(AssetOutcome::Copied { bytes }) => {
                self.copied += 1;
                self.bytes_copied += bytes;
            }
            Ok(AssetOutcome::UpToDate) => self.up_to_date += 1,
            Ok(AssetOutcome::Deleted) => self.deleted += 1,
            Err(err) => {
                self.failed += 1;
                self.errors.push(err);
            }
        }
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if every asset exported without error
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportErrorKind;

    #[test]
    fn test_mtime_index_skips_all_entry() {
        let index: MtimeIndex =
            serde_json::from_str(r#"{"all": 2, "b": 2000, "a": 1000}"#).unwrap();

        assert_eq!(index.total(), Some(2));
        assert_eq!(index.assets(), vec![("a", 1000), ("b", 2000)]);
    }

    #[test]
    fn test_asset_info_defaults() {
        let info: AssetInfo = serde_json::from_str(r#"{"isDeleted": true}"#).unwrap();
        assert!(info.is_deleted);
        assert!(info.name.is_empty());
        assert!(info.tags.is_empty());
        assert_eq!(info.star, None);
    }

    #[test]
    fn test_asset_file_name() {
        let mut info = AssetInfo {
            name: "x".to_string(),
            ext: "jpg".to_string(),
            ..Default::default()
        };
        assert_eq!(info.file_name(), "x.jpg");

        info.ext.clear();
        assert_eq!(info.file_name(), "x");
    }

    #[test]
    fn test_library_info_parses_smart_folders() {
        let json = r#"{
            "folders": [{"id": "f1", "name": "Trips", "children": [{"id": "f2", "name": "Rome"}]}],
            "smartFolders": [{
                "id": "s1",
                "name": "Cats",
                "conditions": [{"match": "OR", "boolean": "FALSE",
                    "rules": [{"property": "tags", "method": "union", "value": ["cat"]}]}]
            }],
            "applicationVersion": "3.0.0"
        }"#;
        let info: LibraryInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.folders[0].children[0].id, "f2");
        let condition = &info.smart_folders[0].conditions[0];
        assert_eq!(condition.match_mode, MatchMode::Or);
        assert!(condition.is_negated());
        assert_eq!(condition.rules[0].property, "tags");
    }

    #[test]
    fn test_export_result_record() {
        let mut result = ExportResult::new();
        result.record(Ok(AssetOutcome::Copied { bytes: 10 }));
        result.record(Ok(AssetOutcome::UpToDate));
        result.record(Ok(AssetOutcome::Deleted));
        result.record(Err(ExportError::new(ExportErrorKind::CopyFailed, "boom")));

        assert_eq!(result.copied, 1);
        assert_eq!(result.bytes_copied, 10);
        assert_eq!(result.up_to_date, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.is_success());
    }

    #[test]
    fn test_export_result_default() {
        let result = ExportResult::new();
        assert_eq!(result.error_count(), 0);
        assert!(result.is_success());
    }
}
