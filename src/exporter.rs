//! Export scheduler - fans per-asset work out to a bounded worker pool

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::category::{CategoryResolver, UNCATEGORIZED_DIR};
use crate::config::ExportConfig;
use crate::copy::{CopyEngine, CopyOutcome};
use crate::error::ExportError;
use crate::library::Library;
use crate::models::{AssetOutcome, ExportResult};
use crate::progress::ProgressSink;
use crate::store::{FileStore, OsFileStore, SourceStore};

/// Runs exports against a pair of stores
pub struct Exporter {
    source: Arc<dyn SourceStore>,
    dest: Arc<dyn FileStore>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run state shared read-only by every task
struct TaskContext<'a> {
    library: &'a Library,
    resolver: Option<&'a CategoryResolver>,
    output: &'a Path,
    engine: CopyEngine<'a>,
}

impl Exporter {
    /// Exporter reading and writing the local filesystem
    pub fn new() -> Self {
        Self {
            source: Arc::new(OsFileStore),
            dest: Arc::new(OsFileStore),
            progress: None,
        }
    }

    /// Read the library through another store
    pub fn with_source(mut self, source: Arc<dyn SourceStore>) -> Self {
        self.source = source;
        self
    }

    /// Write the export through another store
    pub fn with_dest(mut self, dest: Arc<dyn FileStore>) -> Self {
        self.dest = dest;
        self
    }

    /// Report progress into a sink
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Export the library at `config.library` into `config.output`
    ///
    /// Returns `Err` only for failures that abort the run before any asset
    /// is scheduled. Per-asset failures are collected in
    /// [`ExportResult::errors`] after every task has run.
    pub fn export(&self, config: &ExportConfig) -> Result<ExportResult, ExportError> {
        let start = Instant::now();
        let output = config.output.as_path();
        log::info!(
            "Exporting {} -> {}",
            config.library.display(),
            output.display()
        );

        if config.force {
            log::info!("Removing output directory {}", output.display());
            self.dest
                .remove_all(output)
                .map_err(|e| ExportError::destination_prep(output.to_path_buf(), e))?;
        }

        let library = Library::with_source(config.library.clone(), Arc::clone(&self.source));
        let index = library.load_mtime_index()?;
        let library_info = library.load_library_info()?;
        let resolver = CategoryResolver::new(&library_info);

        let total = index.total().unwrap_or(0).max(0) as u64;
        let progress = self.progress.as_deref();
        if let Some(progress) = progress {
            progress.set_total(total);
        }

        let entries = index.assets();
        let num_threads = config.effective_threads();
        log::info!(
            "{} assets, {} smart folders, {} workers",
            entries.len(),
            resolver.len(),
            num_threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("export-{}", i))
            .build()
            .map_err(|e| ExportError::worker_pool(format!("failed to build worker pool: {}", e)))?;

        let ctx = TaskContext {
            library: &library,
            resolver: config.group_by_smart_folder.then_some(&resolver),
            output,
            engine: CopyEngine::new(self.source.as_ref(), self.dest.as_ref(), config.overwrite)
                .with_progress(progress),
        };

        // Every task runs to completion; failures are only collected
        let outcomes: Vec<Result<AssetOutcome, ExportError>> = pool.install(|| {
            entries
                .par_iter()
                .map(|(id, recorded_ms)| {
                    let outcome = export_asset(&ctx, id, *recorded_ms);
                    match &outcome {
                        Ok(done) => {
                            log::debug!("{}: {}", id, done.as_str());
                            if let Some(progress) = progress {
                                progress.asset_done(done);
                            }
                        }
                        Err(err) => {
                            log::warn!("{}", err);
                            if let Some(progress) = progress {
                                progress.asset_failed(err);
                            }
                        }
                    }
                    outcome
                })
                .collect()
        });

        let mut result = ExportResult::new();
        result.total_assets = entries.len() as u64;
        for outcome in outcomes {
            result.record(outcome);
        }
        result.duration_ms = start.elapsed().as_millis() as u64;

        if let Some(progress) = progress {
            progress.finish();
        }
        log::info!(
            "Export finished: {} copied, {} up to date, {} deleted, {} failed in {}ms",
            result.copied,
            result.up_to_date,
            result.deleted,
            result.failed,
            result.duration_ms
        );
        Ok(result)
    }
}

/// Export a library on the local filesystem
pub fn export(config: &ExportConfig) -> Result<ExportResult, ExportError> {
    Exporter::new().export(config)
}

/// Destination of an asset file
///
/// `category` is `None` when grouping is disabled; an empty category maps to
/// the uncategorized folder.
pub fn destination_path(output: &Path, category: Option<&Path>, file_name: &str) -> PathBuf {
    match category {
        None => output.join(file_name),
        Some(c) if c.as_os_str().is_empty() => output.join(UNCATEGORIZED_DIR).join(file_name),
        Some(c) => output.join(c).join(file_name),
    }
}

fn export_asset(
    ctx: &TaskContext<'_>,
    id: &str,
    recorded_ms: i64,
) -> Result<AssetOutcome, ExportError> {
    let info = ctx.library.load_asset(id)?;
    if info.is_deleted {
        return Ok(AssetOutcome::Deleted);
    }

    let file_name = info.file_name();
    let src = ctx.library.asset_content_path(id, &info);
    let category = match ctx.resolver {
        Some(resolver) => Some(resolver.resolve(&info).map_err(|e| e.with_asset(id))?),
        None => None,
    };
    let dst = destination_path(ctx.output, category.as_deref(), &file_name);

    match ctx
        .engine
        .copy_if_changed(&src, &dst, recorded_ms)
        .map_err(|e| e.with_asset(id))?
    {
        CopyOutcome::Copied { bytes } => Ok(AssetOutcome::Copied { bytes }),
        CopyOutcome::UpToDate => Ok(AssetOutcome::UpToDate),
    }
}
