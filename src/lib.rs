//! Incremental exporter for sidecar-metadata media libraries
//!
//! This library copies a library's assets into a plain directory tree,
//! optionally grouped by smart-folder rules, re-copying only what changed
//! since the previous export. Per-asset work runs on a bounded rayon pool.

pub mod category;
pub mod config;
pub mod copy;
pub mod error;
pub mod exporter;
pub mod library;
pub mod models;
pub mod progress;
pub mod store;

pub use category::{CategoryResolver, UNCATEGORIZED_DIR};
pub use config::ExportConfig;
pub use copy::{needs_copy, CopyEngine, CopyOutcome};
pub use error::{CopyStep, ExportError, ExportErrorKind};
pub use exporter::{destination_path, export, Exporter};
pub use library::Library;
pub use models::{AssetInfo, AssetOutcome, ExportResult, LibraryInfo, MtimeIndex, SmartFolder};
pub use progress::{
    DoneMessage, ErrorProgressMessage, ProgressCounter, ProgressMessage, ProgressReporter,
    ProgressSink, ProgressWriter, StartMessage,
};
pub use store::{FileStat, FileStore, FileTimes, OsFileStore, SourceFile, SourceStore};
