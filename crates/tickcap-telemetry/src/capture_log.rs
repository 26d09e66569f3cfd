//! Raw-message capture log.
//!
//! Every decoded transport frame is appended as a tab-separated
//! `<timestamp>\t<raw message>` line for post-session audit and replay.
//! Append mode keeps existing data across restarts; each line is
//! independent, so an interrupted write corrupts at most one entry.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::TelemetryResult;

/// Append-only audit log for raw transport messages.
pub struct CaptureLog {
    path: PathBuf,
    writer: BufWriter<File>,
    lines_written: usize,
}

impl CaptureLog {
    /// Open the capture log in append mode, creating it if needed.
    pub fn open(path: &Path) -> TelemetryResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        info!(path = %path.display(), "Capture log opened (append mode)");

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines_written: 0,
        })
    }

    /// Append one raw message with its resolved timestamp.
    pub fn record(&mut self, timestamp: &str, raw: &str) -> TelemetryResult<()> {
        writeln!(self.writer, "{timestamp}\t{raw}")?;
        self.lines_written += 1;
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> TelemetryResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Lines recorded since this log was opened.
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CaptureLog {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(?e, "Failed to flush capture log on drop");
        }
    }
}
