//! Incremental copy engine
//!
//! Copies one asset's content to its destination unless the destination is
//! already up to date, then stamps the destination with the source's
//! filesystem times so the next run compares equal.

use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{CopyStep, ExportError};
use crate::progress::{ProgressSink, ProgressWriter};
use crate::store::{unix_millis, FileStore, SourceStore};

/// Result of a copy attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { bytes: u64 },
    UpToDate,
}

/// Decide whether the destination must be (re)written
///
/// `recorded_ms` is the asset's modification time from the index.
pub fn needs_copy(
    src_modified: SystemTime,
    dst_modified: Option<SystemTime>,
    recorded_ms: i64,
    overwrite: bool,
) -> bool {
    match dst_modified {
        None => true,
        Some(dst) => overwrite || src_modified != dst || recorded_ms != unix_millis(dst),
    }
}

/// Copies assets from a source store into a destination store
pub struct CopyEngine<'a> {
    source: &'a dyn SourceStore,
    dest: &'a dyn FileStore,
    progress: Option<&'a dyn ProgressSink>,
    overwrite: bool,
}

impl<'a> CopyEngine<'a> {
    pub fn new(source: &'a dyn SourceStore, dest: &'a dyn FileStore, overwrite: bool) -> Self {
        Self {
            source,
            dest,
            progress: None,
            overwrite,
        }
    }

    /// Tee copied bytes into a progress sink
    pub fn with_progress(mut self, progress: Option<&'a dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Copy `src` to `dst` if the destination is missing or stale
    ///
    /// An up-to-date destination is left untouched and reported as
    /// [`CopyOutcome::UpToDate`]. Any failure leaves the destination as the
    /// failed step left it.
    pub fn copy_if_changed(
        &self,
        src: &Path,
        dst: &Path,
        recorded_ms: i64,
    ) -> Result<CopyOutcome, ExportError> {
        let source = self
            .source
            .open(src)
            .map_err(|e| ExportError::copy_failed(CopyStep::OpenSource, src.to_path_buf(), e))?;

        let dst_stat = self
            .dest
            .stat(dst)
            .map_err(|e| ExportError::copy_failed(CopyStep::StatDestination, dst.to_path_buf(), e))?;
        if let Some(stat) = &dst_stat {
            if stat.is_dir {
                return Err(ExportError::copy_failed(
                    CopyStep::StatDestination,
                    dst.to_path_buf(),
                    io::Error::new(io::ErrorKind::Other, "destination is a directory"),
                ));
            }
        }

        let dst_modified = dst_stat.map(|s| s.times.modified);
        if !needs_copy(source.times.modified, dst_modified, recorded_ms, self.overwrite) {
            return Ok(CopyOutcome::UpToDate);
        }

        self.ensure_parent_dir(dst)?;

        let writer = self
            .dest
            .create(dst)
            .map_err(|e| ExportError::copy_failed(CopyStep::OpenDestination, dst.to_path_buf(), e))?;
        let mut writer = ProgressWriter::new(writer, self.progress);
        let mut reader = source.reader;
        io::copy(&mut reader, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| ExportError::copy_failed(CopyStep::Stream, dst.to_path_buf(), e))?;
        let bytes = writer.written();
        // Close the destination before stamping times so no buffered write lands after
        drop(writer);

        self.dest
            .set_times(dst, source.times)
            .map_err(|e| ExportError::copy_failed(CopyStep::SetTimes, dst.to_path_buf(), e))?;

        Ok(CopyOutcome::Copied { bytes })
    }

    /// Create the destination's parent directories
    ///
    /// Another task creating the same directory concurrently is not an error.
    fn ensure_parent_dir(&self, dst: &Path) -> Result<(), ExportError> {
        let Some(parent) = dst.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        match self.dest.create_dir_all(parent) {
            Ok(()) => Ok(()),
            Err(e) => match self.dest.stat(parent) {
                Ok(Some(stat)) if stat.is_dir => Ok(()),
                _ => Err(ExportError::copy_failed(
                    CopyStep::CreateDir,
                    parent.to_path_buf(),
                    e,
                )),
            },
        }
    }
}
