//! Configuration for the library exporter

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ExportError;

/// Default interval between progress messages (milliseconds)
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Configuration for an export run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Library root directory
    pub library: PathBuf,

    /// Output directory receiving the export
    pub output: PathBuf,

    /// Re-copy every asset regardless of timestamps
    pub overwrite: bool,

    /// Delete the whole output directory before exporting
    pub force: bool,

    /// Place assets under the path of their matching smart folder
    pub group_by_smart_folder: bool,

    /// Number of worker threads
    /// 0 means auto-detect (available parallelism)
    pub num_threads: usize,

    /// Whether to write JSON progress lines to stderr
    pub show_progress: bool,

    /// Minimum interval between progress messages
    pub progress_interval_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::new(),
            output: PathBuf::new(),
            overwrite: false,
            force: false,
            group_by_smart_folder: false,
            num_threads: 0,
            show_progress: false,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl ExportConfig {
    /// Create a new config for the given library and output directory
    pub fn new(library: PathBuf, output: PathBuf) -> Self {
        Self {
            library,
            output,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::new()
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ExportError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExportError::config(path.to_path_buf(), format!("read config failed: {}", e))
                .with_source(e)
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ExportError::config(path.to_path_buf(), format!("parse config failed: {}", e))
                .with_source(e)
        })
    }

    /// Get the effective number of worker threads
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.num_threads
        }
    }
}

/// Builder for ExportConfig
#[derive(Debug, Default)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config
    pub fn from_config(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Set the library root
    pub fn library(mut self, library: PathBuf) -> Self {
        self.config.library = library;
        self
    }

    /// Set the output directory
    pub fn output(mut self, output: PathBuf) -> Self {
        self.config.output = output;
        self
    }

    /// Enable or disable forced re-copy
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.config.overwrite = enabled;
        self
    }

    /// Enable or disable cleaning the output directory first
    pub fn force(mut self, enabled: bool) -> Self {
        self.config.force = enabled;
        self
    }

    /// Enable or disable smart-folder grouping
    pub fn group_by_smart_folder(mut self, enabled: bool) -> Self {
        self.config.group_by_smart_folder = enabled;
        self
    }

    /// Set the number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Enable or disable stderr progress output
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Set the progress interval
    pub fn progress_interval_ms(mut self, interval: u64) -> Self {
        self.config.progress_interval_ms = interval;
        self
    }

    /// Build the config
    pub fn build(self) -> ExportConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportErrorKind;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert!(!config.overwrite);
        assert!(!config.force);
        assert!(!config.group_by_smart_folder);
        assert_eq!(config.progress_interval_ms, DEFAULT_PROGRESS_INTERVAL_MS);
    }

    #[test]
    fn test_config_builder() {
        let config = ExportConfig::builder()
            .library(PathBuf::from("/lib"))
            .output(PathBuf::from("/out"))
            .overwrite(true)
            .group_by_smart_folder(true)
            .num_threads(4)
            .build();

        assert_eq!(config.library, PathBuf::from("/lib"));
        assert_eq!(config.output, PathBuf::from("/out"));
        assert!(config.overwrite);
        assert!(!config.force);
        assert!(config.group_by_smart_folder);
        assert_eq!(config.num_threads, 4);
    }

    #[test]
    fn test_effective_threads() {
        let config = ExportConfig::builder().num_threads(8).build();
        assert_eq!(config.effective_threads(), 8);

        let auto_config = ExportConfig::default();
        assert!(auto_config.effective_threads() > 0);
    }

    #[test]
    fn test_from_json_file_partial() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("export.json");
        std::fs::write(&path, r#"{"library": "/lib", "force": true}"#).unwrap();

        let config = ExportConfig::from_json_file(&path).unwrap();
        assert_eq!(config.library, PathBuf::from("/lib"));
        assert!(config.force);
        assert!(!config.overwrite);
        assert_eq!(config.progress_interval_ms, DEFAULT_PROGRESS_INTERVAL_MS);
    }

    #[test]
    fn test_from_json_file_missing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nope.json");
        let err = ExportConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.kind, ExportErrorKind::ConfigInvalid);
        assert_eq!(err.path, Some(path));
    }

    #[test]
    fn test_from_json_file_malformed() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("export.json");
        std::fs::write(&path, "{\"force\": ").unwrap();

        let err = ExportConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.kind, ExportErrorKind::ConfigInvalid);
        assert!(err.message.starts_with("parse config failed"));
    }
}
