//! JSONL snapshot recorder

use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::rc_input::{RcInputReader, RcInputState};
use crate::status::{StatusReader, StatusState};

/// One telemetry record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub rc: RcInputState,
    pub status: StatusState,
}

impl DeviceSnapshot {
    /// Capture both caches now
    pub fn capture(rc: &RcInputReader, status: &StatusReader) -> Self {
        Self {
            timestamp_ms: Utc::now().timestamp_millis(),
            rc: rc.snapshot(),
            status: status.snapshot(),
        }
    }
}

/// Appends [`DeviceSnapshot`]s to a JSONL file
#[derive(Debug)]
pub struct SnapshotLogger {
    writer: BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl SnapshotLogger {
    /// Open `path` for appending, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns `RcioError::Io` if the directory or file cannot be created
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Recording telemetry to {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records: 0,
        })
    }

    /// Append one snapshot as a single line
    pub fn record(&mut self, snapshot: &DeviceSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot).map_err(io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Number of snapshots written by this logger
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
