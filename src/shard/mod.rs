//! Per-shard journal workers
//!
//! Every shard is an independent worker identified by an integer id. It owns
//! its hour files under `<log_dir>/<YYYY-MM-DD>/<HH>/<id>.journal`, buffers
//! writes in memory and flushes them on a size threshold, on a periodic timer
//! and before each hourly rotation.

mod actor;
mod manager;
mod period;
mod worker;

pub use actor::{spawn_shard, Request, Response, ShardHandle, Signal};
pub use manager::ShardManager;
pub use period::{next_rotation_delay, HourSlot, JOURNAL_EXTENSION};
pub use worker::{buffer_capacity, JournalWorker, WriteOutcome};

/// Shard ID type
pub type ShardId = u32;
