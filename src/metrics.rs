//! Diagnostic counters for shard workers
//!
//! Counters are owned by a single worker and only ever touched from its event
//! loop, so they are plain integers.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::shard::ShardId;

/// Diagnostic counters for one shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShardMetrics {
    /// Flushes forced by the buffer reaching capacity
    pub commits: u64,
    /// Non-empty batches appended to a journal file
    pub flushes: u64,
    /// Records appended to journal files
    pub records_written: u64,
    /// Bytes appended to journal files
    pub bytes_written: u64,
    /// Hour files opened
    pub rotations: u64,
    /// Records discarded without reaching disk
    pub dropped_records: u64,
    /// Failed batch appends
    pub write_errors: u64,
    /// Total time spent appending batches, in microseconds
    pub flush_time_us: u64,
}

impl ShardMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the capacity-triggered flush count
    pub fn increment_commits(&mut self) {
        self.commits += 1;
    }

    /// Increment the rotation count
    pub fn increment_rotations(&mut self) {
        self.rotations += 1;
    }

    /// Record a successful batch append
    pub fn record_flush(&mut self, records: usize, bytes: usize, duration: Duration) {
        self.flushes += 1;
        self.records_written += records as u64;
        self.bytes_written += bytes as u64;
        self.flush_time_us += duration.as_micros() as u64;
    }

    /// Record a failed batch append
    pub fn record_write_error(&mut self, records: usize) {
        self.write_errors += 1;
        self.dropped_records += records as u64;
    }

    /// Record records discarded for any other reason
    pub fn add_dropped(&mut self, records: usize) {
        self.dropped_records += records as u64;
    }

    /// Average time per batch append
    pub fn avg_flush_time(&self) -> Duration {
        if self.flushes == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.flush_time_us / self.flushes)
    }
}

/// Snapshot answered to a status query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardStatus {
    /// Shard id
    pub shard: ShardId,
    /// Hour of day the open file belongs to
    pub current_hour: u32,
    /// Path of the open file, if any
    pub current_path: Option<PathBuf>,
    /// Bytes appended to the open file since it was opened
    pub file_bytes: u64,
    /// Buffer threshold after jitter
    pub buffer_capacity: usize,
    /// Records waiting for the next flush
    pub queued: usize,
    /// Diagnostic counters
    pub metrics: ShardMetrics,
}

impl ShardStatus {
    /// Render the snapshot as JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
