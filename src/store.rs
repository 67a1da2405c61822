//! Storage interfaces for reading the library and writing the export
//!
//! Source reads and destination writes go through separate traits so the
//! library and the output tree can live on different backends.

use filetime::FileTime;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Access and modification times of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    pub accessed: SystemTime,
    pub modified: SystemTime,
}

impl FileTimes {
    /// Build from filesystem metadata
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let modified = FileTime::from_last_modification_time(metadata);
        let accessed = FileTime::from_last_access_time(metadata);
        Self {
            accessed: to_system_time(accessed),
            modified: to_system_time(modified),
        }
    }
}

/// What a store reports about an existing path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub len: u64,
    pub times: FileTimes,
}

/// An opened source file together with its filesystem times
pub struct SourceFile {
    pub reader: Box<dyn Read + Send>,
    pub times: FileTimes,
    pub len: u64,
}

/// Read side: the library's documents and content files
pub trait SourceStore: Send + Sync {
    /// Open a file for reading
    fn open(&self, path: &Path) -> io::Result<SourceFile>;
}

/// Write side: a hierarchical file store receiving the export
pub trait FileStore: Send + Sync {
    /// Create a directory and all its ancestors; existing directories are not an error
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory tree; a missing path is not an error
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Stat a path, `None` if it does not exist
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>>;

    /// Open a file for writing, creating or truncating it
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// Set access and modification times
    fn set_times(&self, path: &Path, times: FileTimes) -> io::Result<()>;
}

/// Both stores backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileStore;

impl SourceStore for OsFileStore {
    fn open(&self, path: &Path) -> io::Result<SourceFile> {
        let file = fs::File::open(path)?;
        let metadata = file.metadata()?;
        Ok(SourceFile {
            times: FileTimes::from_metadata(&metadata),
            len: metadata.len(),
            reader: Box::new(io::BufReader::new(file)),
        })
    }
}

impl FileStore for OsFileStore {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(Some(FileStat {
                is_dir: metadata.is_dir(),
                len: metadata.len(),
                times: FileTimes::from_metadata(&metadata),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let file = fs::File::create(path)?;
        Ok(Box::new(io::BufWriter::new(file)))
    }

    fn set_times(&self, path: &Path, times: FileTimes) -> io::Result<()> {
        filetime::set_file_times(
            path,
            FileTime::from_system_time(times.accessed),
            FileTime::from_system_time(times.modified),
        )
    }
}

fn to_system_time(time: FileTime) -> SystemTime {
    let nanos = time.nanoseconds();
    let seconds = time.unix_seconds();
    if seconds >= 0 {
        UNIX_EPOCH + std::time::Duration::new(seconds as u64, nanos)
    } else {
        UNIX_EPOCH - std::time::Duration::new(seconds.unsigned_abs(), 0)
            + std::time::Duration::new(0, nanos)
    }
}

/// Milliseconds since the epoch, negative before it
pub fn unix_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}
