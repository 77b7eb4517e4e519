//! Buffered, hourly-rotated metric journals
//!
//! Producers hand time-stamped metric writes to a shard without waiting on
//! disk. Each shard batches its records and appends them as lines to a file
//! for the current local hour:
//!
//! ```text
//! <log_dir>/<YYYY-MM-DD>/<HH>/<id>.journal
//! <key>@<unix-timestamp>:<name1>=<value1>|<name2>=<value2>
//! ```
//!
//! ```no_run
//! use shard_journal::{JournalConfig, ShardManager};
//!
//! # async fn demo() -> shard_journal::Result<()> {
//! let manager = ShardManager::new(JournalConfig::new().with_log_dir("/var/lib/journal"))?;
//! manager.start_range(0..4)?;
//! manager.write(2, "cpu.host1", 1_700_000_000, [("user", 12), ("system", 3)])?;
//! manager.shutdown_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod hook;
pub mod journal;
pub mod metrics;
pub mod record;
pub mod shard;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{JournalConfig, OpenMode};
pub use error::{Error, Result};
pub use hook::{ErrorHook, LoggingHook, SharedHook};
pub use metrics::{ShardMetrics, ShardStatus};
pub use record::{Metric, MetricValue, Record};
pub use shard::{spawn_shard, Request, Response, ShardHandle, ShardId, ShardManager, Signal};
