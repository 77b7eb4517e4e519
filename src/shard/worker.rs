//! The per-shard journal state machine
//!
//! [`JournalWorker`] owns everything one shard mutates: the open hour file,
//! the pending record buffer and the diagnostic counters. It is driven by a
//! single event loop (see [`crate::shard::spawn_shard`]) and never shared.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{JournalConfig, OpenMode};
use crate::error::{Error, Result};
use crate::hook::SharedHook;
use crate::journal::JournalFile;
use crate::metrics::{ShardMetrics, ShardStatus};
use crate::record::{encode_batch, Record};
use crate::shard::period::{next_rotation_delay, HourSlot};
use crate::shard::ShardId;

/// Buffer threshold for one shard: `configured` plus a jitter in `1..=configured`
pub fn buffer_capacity<R: Rng>(configured: usize, rng: &mut R) -> usize {
    let configured = configured.max(1);
    configured + rng.gen_range(1..=configured)
}

/// What a write did with its record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record is waiting in the buffer
    Queued,
    /// The buffer was full; it was flushed together with the record
    Committed,
}

/// State of a single journal shard
pub struct JournalWorker {
    /// Shard id
    id: ShardId,
    /// Root directory for journal files
    log_dir: PathBuf,
    /// How hour files are opened
    open_mode: OpenMode,
    /// Sync after each flush
    sync_on_flush: bool,
    /// Offset past the hour boundary for rotation
    rotation_grace: Duration,
    /// File for the current hour
    current_file: Option<JournalFile>,
    /// Hour of day `current_file` belongs to
    current_hour: u32,
    /// Record count that forces a flush
    buffer_capacity: usize,
    /// Pending records in arrival order
    queue: Vec<Record>,
    /// Diagnostic counters
    metrics: ShardMetrics,
    /// Wall-clock source
    clock: Arc<dyn Clock>,
    /// Sink for errors nobody else will see
    hook: SharedHook,
}

impl JournalWorker {
    /// Create a worker with no file open yet
    pub fn new(
        id: ShardId,
        config: &JournalConfig,
        buffer_capacity: usize,
        clock: Arc<dyn Clock>,
        hook: SharedHook,
    ) -> Self {
        let current_hour = HourSlot::containing(&clock.now()).hour;
        Self {
            id,
            log_dir: config.log_dir.clone(),
            open_mode: config.open_mode,
            sync_on_flush: config.sync_on_flush,
            rotation_grace: Duration::from_secs(config.rotation_grace_secs),
            current_file: None,
            current_hour,
            buffer_capacity: buffer_capacity.max(1),
            queue: Vec::with_capacity(buffer_capacity.max(1)),
            metrics: ShardMetrics::new(),
            clock,
            hook,
        }
    }

    /// Create a worker and open its first hour file
    ///
    /// Returns the worker and the delay until its next rotation.
    pub fn start(
        id: ShardId,
        config: &JournalConfig,
        buffer_capacity: usize,
        clock: Arc<dyn Clock>,
        hook: SharedHook,
    ) -> Result<(Self, Duration)> {
        let mut worker = Self::new(id, config, buffer_capacity, clock, hook);
        let next = worker.rotate()?;
        info!(
            shard = id,
            capacity = worker.buffer_capacity,
            hour = worker.current_hour,
            "journal shard started"
        );
        Ok((worker, next))
    }

    /// Buffer a record, flushing immediately if the buffer is already full
    pub fn write(&mut self, record: Record) -> WriteOutcome {
        if self.queue.len() >= self.buffer_capacity {
            self.queue.push(record);
            self.flush();
            self.metrics.increment_commits();
            WriteOutcome::Committed
        } else {
            self.queue.push(record);
            WriteOutcome::Queued
        }
    }

    /// Append all buffered records to the open file in one write
    ///
    /// Returns the number of records that reached the file. The buffer is
    /// empty afterwards whether or not the write succeeded.
    pub fn flush(&mut self) -> usize {
        if self.queue.is_empty() {
            return 0;
        }

        let records = std::mem::take(&mut self.queue);
        let count = records.len();

        let Some(file) = self.current_file.as_mut() else {
            warn!(shard = self.id, records = count, "no journal file open, dropping batch");
            self.metrics.add_dropped(count);
            return 0;
        };

        let batch = encode_batch(&records);
        let start = Instant::now();
        let mut result = file.append(batch.as_bytes());
        if result.is_ok() && self.sync_on_flush {
            result = file.sync();
        }

        match result {
            Ok(()) => {
                self.metrics.record_flush(count, batch.len(), start.elapsed());
                debug!(shard = self.id, records = count, bytes = batch.len(), "flushed batch");
                count
            }
            Err(e) => {
                self.metrics.record_write_error(count);
                warn!(shard = self.id, records = count, error = %e, "batch append failed");
                self.hook.report(self.id, &e);
                0
            }
        }
    }

    /// Close the current hour file and open the file for the hour it is now
    ///
    /// Returns the delay until the next rotation is due. On error no file is
    /// left open and the shard cannot continue.
    pub fn rotate(&mut self) -> Result<Duration> {
        self.flush();
        self.close_current();

        let now = self.clock.now();
        let slot = HourSlot::containing(&now);
        let path = slot.file_path(&self.log_dir, self.id);

        let file = JournalFile::open(&path, self.open_mode)?;
        self.current_file = Some(file);
        self.current_hour = slot.hour;
        self.queue.clear();
        self.metrics.increment_rotations();

        let next = next_rotation_delay(&now, self.rotation_grace);
        info!(
            shard = self.id,
            path = %path.display(),
            next_rotation_secs = next.as_secs(),
            "rotated journal file"
        );
        Ok(next)
    }

    /// Flush and close; safe to call more than once
    pub fn shutdown(&mut self) {
        let flushed = self.flush();
        if self.close_current() {
            info!(
                shard = self.id,
                flushed,
                avg_flush_us = self.metrics.avg_flush_time().as_micros() as u64,
                "journal shard stopped"
            );
        }
    }

    /// Snapshot of the worker's state
    pub fn status(&self) -> ShardStatus {
        ShardStatus {
            shard: self.id,
            current_hour: self.current_hour,
            current_path: self.current_file.as_ref().map(|f| f.path().to_path_buf()),
            file_bytes: self.current_file.as_ref().map_or(0, JournalFile::bytes_written),
            buffer_capacity: self.buffer_capacity,
            queued: self.queue.len(),
            metrics: self.metrics,
        }
    }

    /// Count a write that failed validation and report it
    pub fn reject(&mut self, error: &Error) {
        self.metrics.add_dropped(1);
        warn!(shard = self.id, error = %error, "rejected record");
        self.hook.report(self.id, error);
    }

    /// Forward an error to the hook
    pub fn report(&self, error: &Error) {
        self.hook.report(self.id, error);
    }

    /// Shard id
    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Hour of day of the open file
    pub fn current_hour(&self) -> u32 {
        self.current_hour
    }

    /// Buffer threshold
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Records waiting to be flushed
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Diagnostic counters
    pub fn metrics(&self) -> &ShardMetrics {
        &self.metrics
    }

    /// Returns whether a file was open
    fn close_current(&mut self) -> bool {
        let Some(file) = self.current_file.take() else {
            return false;
        };
        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            warn!(shard = self.id, path = %path.display(), error = %e, "closing journal file failed");
            self.hook.report(self.id, &e);
        }
        true
    }
}

impl Drop for JournalWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for JournalWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalWorker")
            .field("id", &self.id)
            .field("current_hour", &self.current_hour)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("queued", &self.queue.len())
            .finish()
    }
}
