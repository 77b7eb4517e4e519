//! Shard event loops
//!
//! Each shard runs as one tokio task that owns its [`JournalWorker`] and
//! processes one event at a time: rotation timer, periodic flush timer, then
//! commands from [`ShardHandle`]s, in that priority order.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::JournalConfig;
use crate::error::{Error, Result};
use crate::hook::SharedHook;
use crate::metrics::ShardStatus;
use crate::record::{Metric, Record};
use crate::shard::worker::{buffer_capacity, JournalWorker};
use crate::shard::ShardId;

/// Synchronous requests a shard answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Snapshot of the shard's state
    Status,
    /// Anything else; answered with [`Error::BadRequest`]
    Other(String),
}

/// Replies to [`Request`]s
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Reply to [`Request::Status`]
    Status(ShardStatus),
}

/// Asynchronous notifications a shard accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Flush the buffer now
    Flush,
    /// Anything else; logged and ignored
    Other(String),
}

enum Command {
    Write {
        key: String,
        timestamp: i64,
        metrics: Vec<Metric>,
    },
    Call {
        request: Request,
        reply: oneshot::Sender<Result<Response>>,
    },
    Signal(Signal),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable address of a running shard
#[derive(Debug, Clone)]
pub struct ShardHandle {
    id: ShardId,
    tx: mpsc::UnboundedSender<Command>,
}

impl ShardHandle {
    /// Shard id
    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Queue a write; never blocks and never reports failure to the caller
    pub fn write<I, M>(&self, key: impl Into<String>, timestamp: i64, metrics: I)
    where
        I: IntoIterator<Item = M>,
        M: Into<Metric>,
    {
        let command = Command::Write {
            key: key.into(),
            timestamp,
            metrics: metrics.into_iter().map(Into::into).collect(),
        };
        if self.tx.send(command).is_err() {
            debug!(shard = self.id, "write to stopped shard dropped");
        }
    }

    /// Send a synchronous request and wait for the answer
    pub async fn request(&self, request: Request) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Call { request, reply })
            .map_err(|_| Error::ShardClosed(self.id))?;
        rx.await.map_err(|_| Error::ShardClosed(self.id))?
    }

    /// Current hour and diagnostic counters
    pub async fn status(&self) -> Result<ShardStatus> {
        match self.request(Request::Status).await? {
            Response::Status(status) => Ok(status),
        }
    }

    /// Send an asynchronous signal
    pub fn signal(&self, signal: Signal) {
        if self.tx.send(Command::Signal(signal)).is_err() {
            debug!(shard = self.id, "signal to stopped shard dropped");
        }
    }

    /// Flush, close the current file and stop the event loop
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown { reply })
            .map_err(|_| Error::ShardClosed(self.id))?;
        rx.await.map_err(|_| Error::ShardClosed(self.id))
    }

    /// Whether the event loop has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start shard `id` on the current tokio runtime
///
/// The first hour file is opened before this returns, so directory or file
/// errors surface here. The join handle resolves when the loop stops: `Ok`
/// after a shutdown, or the fatal error of a failed scheduled rotation.
pub fn spawn_shard(
    id: ShardId,
    config: &JournalConfig,
    clock: Arc<dyn Clock>,
    hook: SharedHook,
) -> Result<(ShardHandle, JoinHandle<Result<()>>)> {
    config.validate()?;

    let mut rng = shard_rng(id, config.jitter_seed);
    let capacity = buffer_capacity(config.buffer_size, &mut rng);
    let (worker, rotate_in) = JournalWorker::start(id, config, capacity, clock, hook)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let timers = Timers {
        rotate_in,
        first_flush: config.initial_flush_delay(id),
        flush_every: config.flush_interval(),
    };
    let task = tokio::spawn(run(worker, rx, timers));

    Ok((ShardHandle { id, tx }, task))
}

/// Per-shard RNG mixing the shard id into a seed
fn shard_rng(id: ShardId, seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(rand::random);
    StdRng::seed_from_u64(seed ^ u64::from(id).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

struct Timers {
    rotate_in: Duration,
    first_flush: Duration,
    flush_every: Duration,
}

async fn run(
    mut worker: JournalWorker,
    mut rx: mpsc::UnboundedReceiver<Command>,
    timers: Timers,
) -> Result<()> {
    let rotation = time::sleep(timers.rotate_in);
    let flush = time::sleep(timers.first_flush);
    tokio::pin!(rotation, flush);

    loop {
        tokio::select! {
            biased;

            () = &mut rotation => {
                match worker.rotate() {
                    Ok(next) => rotation.as_mut().reset(Instant::now() + next),
                    Err(e) => {
                        error!(shard = worker.id(), error = %e, "scheduled rotation failed, stopping shard");
                        worker.report(&e);
                        return Err(e);
                    }
                }
            }

            () = &mut flush => {
                worker.flush();
                flush.as_mut().reset(Instant::now() + timers.flush_every);
            }

            command = rx.recv() => match command {
                Some(Command::Write { key, timestamp, metrics }) => {
                    match Record::new(key, timestamp, metrics) {
                        Ok(record) => {
                            worker.write(record);
                        }
                        Err(e) => worker.reject(&e),
                    }
                }
                Some(Command::Call { request, reply }) => {
                    let _ = reply.send(answer(&worker, request));
                }
                Some(Command::Signal(signal)) => match signal {
                    Signal::Flush => {
                        worker.flush();
                    }
                    Signal::Other(name) => {
                        warn!(shard = worker.id(), signal = %name, "ignoring unknown signal");
                    }
                },
                Some(Command::Shutdown { reply }) => {
                    worker.shutdown();
                    let _ = reply.send(());
                    return Ok(());
                }
                None => {
                    info!(shard = worker.id(), "all handles dropped, stopping shard");
                    worker.shutdown();
                    return Ok(());
                }
            },
        }
    }
}

fn answer(worker: &JournalWorker, request: Request) -> Result<Response> {
    match request {
        Request::Status => Ok(Response::Status(worker.status())),
        Request::Other(name) => {
            error!(shard = worker.id(), request = %name, "bad request");
            Err(Error::bad_request(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::hook::logging_hook;
    use chrono::{Local, TimeZone};
    use parking_lot::Mutex;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn clock_at(h: u32, m: u32) -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Local.with_ymd_and_hms(2024, 6, 15, h, m, 0).unwrap(),
        ))
    }

    fn hour_file(root: &Path, hour: u32, id: ShardId) -> PathBuf {
        root.join("2024-06-15")
            .join(format!("{:02}", hour))
            .join(format!("{}.journal", id))
    }

    fn config(root: &Path) -> JournalConfig {
        JournalConfig::new()
            .with_log_dir(root)
            .with_buffer_size(100)
            .with_jitter_seed(1)
    }

    #[test]
    fn test_shard_rng_is_seeded_per_shard() {
        use rand::Rng;

        let a: u64 = shard_rng(1, Some(9)).gen();
        let b: u64 = shard_rng(1, Some(9)).gen();
        let c: u64 = shard_rng(2, Some(9)).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_shutdown_flushes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) =
            spawn_shard(3, &config(dir.path()), clock_at(12, 30), logging_hook()).unwrap();

        handle.write("k1", 100, [("v", 1)]);
        handle.write("k2", 101, [("v", 1)]);
        handle.write("k3", 102, [("v", 1)]);
        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(
            fs::read_to_string(hour_file(dir.path(), 12, 3)).unwrap(),
            "k1@100:v=1\nk2@101:v=1\nk3@102:v=1\n"
        );
        assert!(handle.is_closed());
        assert!(matches!(handle.status().await, Err(Error::ShardClosed(3))));
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_periodic_flush_fires_after_staggered_delay() {
        let dir = tempfile::tempdir().unwrap();
        // First flush at 2000 + 5 * 40 ms
        let (handle, _task) =
            spawn_shard(5, &config(dir.path()), clock_at(12, 30), logging_hook()).unwrap();
        let path = hour_file(dir.path(), 12, 5);

        handle.write("a", 1, [("v", 1)]);
        let status = handle.status().await.unwrap();
        assert_eq!(status.queued, 1);

        time::sleep(Duration::from_millis(2150)).await;
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fs::read_to_string(&path).unwrap(), "a@1:v=1\n");

        // Rearmed at the plain interval
        handle.write("b", 2, [("v", 1)]);
        time::sleep(Duration::from_millis(2050)).await;
        assert_eq!(fs::read_to_string(&path).unwrap(), "a@1:v=1\nb@2:v=1\n");

        let status = handle.status().await.unwrap();
        assert_eq!(status.metrics.flushes, 2);
        assert_eq!(status.metrics.commits, 0);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_scheduled_rotation_moves_to_next_hour() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock_at(12, 59);
        let config = config(dir.path()).with_flush_interval_ms(24 * 60 * 60 * 1000);
        let (handle, _task) = spawn_shard(1, &config, clock.clone(), logging_hook()).unwrap();

        handle.write("a", 1, [("v", 1)]);
        handle.write("b", 2, [("v", 1)]);
        assert_eq!(handle.status().await.unwrap().current_hour, 12);

        // Rotation is due at 13:01:00, two minutes away
        clock.advance(chrono::Duration::minutes(2));
        time::sleep(Duration::from_secs(121)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.current_hour, 13);
        assert_eq!(status.metrics.rotations, 2);
        assert_eq!(
            fs::read_to_string(hour_file(dir.path(), 12, 1)).unwrap(),
            "a@1:v=1\nb@2:v=1\n"
        );
        assert_eq!(fs::read_to_string(hour_file(dir.path(), 13, 1)).unwrap(), "");
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_bad_request_and_unknown_signal_keep_shard_running() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _task) =
            spawn_shard(2, &config(dir.path()), clock_at(9, 0), logging_hook()).unwrap();

        let err = handle
            .request(Request::Other("compact".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(ref name) if name == "compact"));

        handle.signal(Signal::Other("reload".to_string()));
        handle.write("x", 7, [("v", 3)]);
        handle.signal(Signal::Flush);

        let status = handle.status().await.unwrap();
        assert_eq!(status.queued, 0);
        assert_eq!(status.metrics.flushes, 1);
        assert_eq!(
            fs::read_to_string(hour_file(dir.path(), 9, 2)).unwrap(),
            "x@7:v=3\n"
        );
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_invalid_record_is_reported_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook: SharedHook = Arc::new(move |shard: ShardId, e: &Error| {
            sink.lock().push((shard, e.to_string()));
        });

        let (handle, _task) = spawn_shard(8, &config(dir.path()), clock_at(9, 0), hook).unwrap();
        handle.write("bad@key", 1, [("v", 1)]);
        handle.write("good", 2, [("v", 1)]);

        let status = handle.status().await.unwrap();
        assert_eq!(status.metrics.dropped_records, 1);
        assert_eq!(status.queued, 1);
        handle.shutdown().await.unwrap();

        assert_eq!(
            fs::read_to_string(hour_file(dir.path(), 9, 8)).unwrap(),
            "good@2:v=1\n"
        );
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 8);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_dropping_all_handles_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) =
            spawn_shard(6, &config(dir.path()), clock_at(4, 15), logging_hook()).unwrap();

        handle.write("last", 9, [("v", 1)]);
        drop(handle);
        task.await.unwrap().unwrap();

        assert_eq!(
            fs::read_to_string(hour_file(dir.path(), 4, 6)).unwrap(),
            "last@9:v=1\n"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_startup_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let result = spawn_shard(1, &config(&blocker), clock_at(9, 0), logging_hook());
        assert!(matches!(result, Err(Error::Rotation { .. })));
    }
}
