//! Library metadata loading
//!
//! A library root holds `mtime.json` (the modification-time index),
//! `metadata.json` (smart folders and the folder tree) and one
//! `images/<id>.info/` directory per asset with its own `metadata.json`
//! next to the content file.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ExportError;
use crate::models::{AssetInfo, LibraryInfo, MtimeIndex, ALL_KEY};
use crate::store::{OsFileStore, SourceStore};

/// Index file name
pub const MTIME_FILE: &str = "mtime.json";

/// Library and asset metadata file name
pub const METADATA_FILE: &str = "metadata.json";

/// Directory holding the per-asset `.info` directories
pub const IMAGES_DIR: &str = "images";

/// A library on disk, read through a [`SourceStore`]
#[derive(Clone)]
pub struct Library {
    root: PathBuf,
    source: Arc<dyn SourceStore>,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("root", &self.root).finish()
    }
}

impl Library {
    /// Open a library on the local filesystem
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_source(root, Arc::new(OsFileStore))
    }

    /// Open a library read through the given store
    pub fn with_source(root: impl Into<PathBuf>, source: Arc<dyn SourceStore>) -> Self {
        Self {
            root: root.into(),
            source,
        }
    }

    /// Load the modification-time index
    ///
    /// Fails if the document is missing, malformed, or lacks the `"all"` entry.
    pub fn load_mtime_index(&self) -> Result<MtimeIndex, ExportError> {
        let path = self.root.join(MTIME_FILE);
        let index: MtimeIndex = self.read_json(&path)?;
        if index.total().is_none() {
            return Err(ExportError::metadata(
                path,
                format!("field '{}' not exists", ALL_KEY),
            ));
        }
        Ok(index)
    }

    /// Load the library-wide metadata document
    pub fn load_library_info(&self) -> Result<LibraryInfo, ExportError> {
        self.read_json(&self.root.join(METADATA_FILE))
    }

    /// Load one asset's metadata; errors are scoped to that asset
    pub fn load_asset(&self, id: &str) -> Result<AssetInfo, ExportError> {
        let path = self.asset_dir(id).join(METADATA_FILE);
        let mut info: AssetInfo = self.read_json(&path).map_err(|e| e.with_asset(id))?;
        if info.id.is_empty() {
            info.id = id.to_string();
        }
        Ok(info)
    }

    /// Directory holding an asset's metadata and content
    pub fn asset_dir(&self, id: &str) -> PathBuf {
        self.root.join(IMAGES_DIR).join(format!("{}.info", id))
    }

    /// Path of an asset's content file
    pub fn asset_content_path(&self, id: &str, info: &AssetInfo) -> PathBuf {
        self.asset_dir(id).join(info.file_name())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ExportError> {
        let file = self.source.open(path).map_err(|e| {
            ExportError::metadata(path.to_path_buf(), format!("read failed: {}", e)).with_source(e)
        })?;
        serde_json::from_reader(file.reader).map_err(|e| {
            ExportError::metadata(path.to_path_buf(), format!("parse failed: {}", e)).with_source(e)
        })
    }
}
