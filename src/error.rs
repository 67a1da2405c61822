//! Error types for the library exporter

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed underlying cause carried by an [`ExportError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error kinds that can occur during an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportErrorKind {
    /// Cleaning the output directory before export failed
    DestinationPrepFailed,
    /// An index, library or asset metadata document is missing or malformed
    MetadataUnreadable,
    /// The smart-folder rules are structurally inconsistent
    InvalidRule,
    /// Copying an asset to the destination failed
    CopyFailed,
    /// The worker pool could not be started
    WorkerPool,
    /// The export configuration file is missing or malformed
    ConfigInvalid,
}

impl ExportErrorKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportErrorKind::DestinationPrepFailed => "DestinationPrepFailed",
            ExportErrorKind::MetadataUnreadable => "MetadataUnreadable",
            ExportErrorKind::InvalidRule => "InvalidRule",
            ExportErrorKind::CopyFailed => "CopyFailed",
            ExportErrorKind::WorkerPool => "WorkerPool",
            ExportErrorKind::ConfigInvalid => "ConfigInvalid",
        }
    }
}

impl fmt::Display for ExportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step of an asset copy that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStep {
    OpenSource,
    StatDestination,
    CreateDir,
    OpenDestination,
    Stream,
    SetTimes,
}

impl CopyStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStep::OpenSource => "open source",
            CopyStep::StatDestination => "stat destination",
            CopyStep::CreateDir => "create directory",
            CopyStep::OpenDestination => "open destination",
            CopyStep::Stream => "stream copy",
            CopyStep::SetTimes => "set times",
        }
    }
}

impl fmt::Display for CopyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents an error that occurred during an export
#[derive(Debug, Error)]
#[error("{kind}: {message}{}{}", asset_suffix(.asset), path_suffix(.path))]
pub struct ExportError {
    /// The kind of error
    pub kind: ExportErrorKind,
    /// The asset the error is scoped to, if any
    pub asset: Option<String>,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// The copy step that failed (copy errors only)
    pub step: Option<CopyStep>,
    /// Human-readable error message
    pub message: String,
    /// Underlying cause
    #[source]
    pub source: Option<BoxError>,
}

fn asset_suffix(asset: &Option<String>) -> String {
    asset
        .as_ref()
        .map(|id| format!(" (asset: {})", id))
        .unwrap_or_default()
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" (path: {})", p.display()))
        .unwrap_or_default()
}

impl ExportError {
    /// Create a new export error
    pub fn new(kind: ExportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            asset: None,
            path: None,
            step: None,
            message: message.into(),
            source: None,
        }
    }

    /// Scope the error to an asset
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    /// Attach the path the error occurred at
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Create a destination preparation error
    pub fn destination_prep(path: PathBuf, source: std::io::Error) -> Self {
        Self::new(
            ExportErrorKind::DestinationPrepFailed,
            format!("failed to clean output directory: {}", source),
        )
        .with_path(path)
        .with_source(source)
    }

    /// Create a metadata error for an unreadable or malformed document
    pub fn metadata(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ExportErrorKind::MetadataUnreadable, message).with_path(path)
    }

    /// Create an invalid smart-folder rule error
    pub fn invalid_rule(folder: &str, message: impl Into<String>) -> Self {
        Self::new(
            ExportErrorKind::InvalidRule,
            format!("smart folder '{}': {}", folder, message.into()),
        )
    }

    /// Create a copy error for the given step
    pub fn copy_failed(step: CopyStep, path: PathBuf, source: std::io::Error) -> Self {
        let mut err = Self::new(
            ExportErrorKind::CopyFailed,
            format!("{} failed: {}", step, source),
        )
        .with_path(path)
        .with_source(source);
        err.step = Some(step);
        err
    }

    /// Create a configuration file error
    pub fn config(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ExportErrorKind::ConfigInvalid, message).with_path(path)
    }

    /// Create a worker pool error
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Self::new(ExportErrorKind::WorkerPool, message)
    }

    /// Whether this error aborts the whole export rather than a single asset
    pub fn is_export_fatal(&self) -> bool {
        match self.kind {
            ExportErrorKind::DestinationPrepFailed
            | ExportErrorKind::WorkerPool
            | ExportErrorKind::ConfigInvalid => true,
            ExportErrorKind::MetadataUnreadable => self.asset.is_none(),
            ExportErrorKind::InvalidRule | ExportErrorKind::CopyFailed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_copy_error_keeps_cause_and_context() {
        let cause = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = ExportError::copy_failed(CopyStep::SetTimes, PathBuf::from("/out/x.jpg"), cause)
            .with_asset("a1");

        assert_eq!(err.kind, ExportErrorKind::CopyFailed);
        assert_eq!(err.step, Some(CopyStep::SetTimes));
        assert!(err.source().is_some());

        let text = err.to_string();
        assert!(text.starts_with("CopyFailed: set times failed"));
        assert!(text.contains("(asset: a1)"));
        assert!(text.contains("/out/x.jpg"));
    }

    #[test]
    fn test_metadata_error_scope() {
        let library_wide = ExportError::metadata(PathBuf::from("mtime.json"), "missing");
        assert!(library_wide.is_export_fatal());

        let per_asset = ExportError::metadata(PathBuf::from("a.info"), "missing").with_asset("a");
        assert!(!per_asset.is_export_fatal());
    }

    #[test]
    fn test_config_error_is_export_fatal() {
        let err = ExportError::config(PathBuf::from("export.json"), "parse config failed");
        assert_eq!(err.kind, ExportErrorKind::ConfigInvalid);
        assert!(err.is_export_fatal());
        assert!(err.to_string().starts_with("ConfigInvalid: parse config failed"));
    }

    #[test]
    fn test_invalid_rule_is_task_fatal() {
        let err = ExportError::invalid_rule("Cats", "unknown property 'color'").with_asset("a1");
        assert!(!err.is_export_fatal());
        assert!(err.to_string().contains("smart folder 'Cats'"));
    }
}
