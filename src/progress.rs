//! Progress reporting for export operations
//!
//! Export tasks report through a [`ProgressSink`] shared by every worker.
//! [`ProgressReporter`] is the sink used by the CLI: it writes JSON lines to
//! stderr for external callers.

use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::models::{AssetOutcome, ExportResult};

/// Receives progress updates from concurrently running export tasks
pub trait ProgressSink: Send + Sync {
    /// Total size hint for the run
    fn set_total(&self, total: u64);

    /// Bytes written to the destination
    fn add_bytes(&self, bytes: u64);

    /// An asset task finished successfully
    fn asset_done(&self, _outcome: &AssetOutcome) {}

    /// An asset task failed
    fn asset_failed(&self, _error: &ExportError) {}

    /// The run is over
    fn finish(&self) {}
}

/// Writer that forwards to `inner` and counts written bytes into a sink
pub struct ProgressWriter<'a, W> {
    inner: W,
    sink: Option<&'a dyn ProgressSink>,
    written: u64,
}

impl<'a, W: Write> ProgressWriter<'a, W> {
    pub fn new(inner: W, sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            inner,
            sink,
            written: 0,
        }
    }

    /// Bytes written through this writer
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for ProgressWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        if let Some(sink) = self.sink {
            sink.add_bytes(n as u64);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// In-memory sink counting bytes and finished assets
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: AtomicU64,
    bytes: AtomicU64,
    assets: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn assets(&self) -> u64 {
        self.assets.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ProgressCounter {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn add_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn asset_done(&self, _outcome: &AssetOutcome) {
        self.assets.fetch_add(1, Ordering::Relaxed);
    }
}

/// Start message sent when export begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    pub library: String,
    pub output: String,
    pub overwrite: bool,
    pub force: bool,
    pub group_by_smart_folder: bool,
}

impl StartMessage {
    /// Create a new start message
    pub fn new(seq: u64, ts: u64, config: &ExportConfig) -> Self {
        Self {
            msg_type: "start",
            seq,
            ts,
            library: config.library.to_string_lossy().to_string(),
            output: config.output.to_string_lossy().to_string(),
            overwrite: config.overwrite,
            force: config.force,
            group_by_smart_folder: config.group_by_smart_folder,
        }
    }
}

/// Progress message sent during export
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Assets finished so far
    #[serde(rename = "n")]
    pub assets_done: u64,
    /// Total assets expected
    #[serde(rename = "t")]
    pub total: u64,
    /// Bytes copied so far
    #[serde(rename = "b")]
    pub bytes: u64,
}

impl ProgressMessage {
    pub fn new(seq: u64, ts: u64, assets_done: u64, total: u64, bytes: u64) -> Self {
        Self {
            msg_type: "p",
            seq,
            ts,
            assets_done,
            total,
            bytes,
        }
    }
}

/// Error message sent when an asset fails
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error type/category
    pub error_type: String,
    /// Error message description
    pub message: String,
    /// Asset that failed (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorProgressMessage {
    /// Create from an export error
    pub fn from_error(seq: u64, ts: u64, error: &ExportError) -> Self {
        Self {
            msg_type: "err",
            seq,
            ts,
            error_type: error.kind.as_str().to_string(),
            message: error.message.clone(),
            asset: error.asset.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        }
    }
}

/// Done message sent when export completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    #[serde(rename = "ta")]
    pub total_assets: u64,
    #[serde(rename = "cp")]
    pub copied: u64,
    #[serde(rename = "ut")]
    pub up_to_date: u64,
    #[serde(rename = "dl")]
    pub deleted: u64,
    #[serde(rename = "bc")]
    pub bytes_copied: u64,
    /// Number of errors encountered
    #[serde(rename = "ec")]
    pub error_count: usize,
    /// Total export duration in milliseconds
    pub ms: u64,
}

impl DoneMessage {
    pub fn new(seq: u64, ts: u64, result: &ExportResult) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            total_assets: result.total_assets,
            copied: result.copied,
            up_to_date: result.up_to_date,
            deleted: result.deleted,
            bytes_copied: result.bytes_copied,
            error_count: result.error_count(),
            ms: result.duration_ms,
        }
    }
}

/// Progress reporter writing JSON lines to stderr
///
/// Safe to share between worker threads. Progress messages are throttled to
/// one per `interval_ms`; start, error and done messages are always sent.
pub struct ProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Last report time
    last_report: Mutex<Instant>,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
    counter: ProgressCounter,
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(now),
            seq: AtomicU64::new(0),
            start_time: now,
            counter: ProgressCounter::new(),
        }
    }

    /// Check whether the interval elapsed, claiming the slot if so
    fn claim_report_slot(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let Ok(mut last) = self.last_report.lock() else {
            return false;
        };
        if last.elapsed().as_millis() as u64 >= self.interval_ms {
            *last = Instant::now();
            true
        } else {
            false
        }
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            let mut stderr = io::stderr().lock();
            writeln!(stderr, "{}", json).ok();
            stderr.flush().ok();
        }
    }

    /// Report export start
    pub fn report_start(&self, config: &ExportConfig) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage::new(self.next_seq(), self.current_timestamp(), config);
        self.output_to_stderr(&msg);
    }

    /// Report progress if the interval elapsed
    ///
    /// Returns true if a message was actually sent.
    pub fn report_progress(&self) -> bool {
        if !self.claim_report_slot() {
            return false;
        }
        self.emit_progress();
        true
    }

    fn emit_progress(&self) {
        let msg = ProgressMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            self.counter.assets(),
            self.counter.total(),
            self.counter.bytes(),
        );
        self.output_to_stderr(&msg);
    }

    /// Report a failed asset immediately
    pub fn report_error(&self, error: &ExportError) {
        if !self.enabled {
            return;
        }
        let msg = ErrorProgressMessage::from_error(self.next_seq(), self.current_timestamp(), error);
        self.output_to_stderr(&msg);
    }

    /// Report export completion
    pub fn report_done(&self, result: &ExportResult) {
        if !self.enabled {
            return;
        }
        let msg = DoneMessage::new(self.next_seq(), self.current_timestamp(), result);
        self.output_to_stderr(&msg);
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Counters accumulated so far
    pub fn counter(&self) -> &ProgressCounter {
        &self.counter
    }
}

impl ProgressSink for ProgressReporter {
    fn set_total(&self, total: u64) {
        self.counter.set_total(total);
    }

    fn add_bytes(&self, bytes: u64) {
        self.counter.add_bytes(bytes);
        self.report_progress();
    }

    fn asset_done(&self, outcome: &AssetOutcome) {
        self.counter.asset_done(outcome);
        self.report_progress();
    }

    fn asset_failed(&self, error: &ExportError) {
        self.report_error(error);
    }

    /// Flush a final progress line regardless of the interval
    fn finish(&self) {
        if self.enabled {
            self.emit_progress();
        }
    }
}
