//! Hourly journal periods
//!
//! Maps a local wall-clock time to the hour file that is active at that time
//! and computes when the next rotation is due.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Timelike};

use crate::shard::ShardId;

const SECS_PER_HOUR: u64 = 60 * 60;

/// File extension of journal files
pub const JOURNAL_EXTENSION: &str = "journal";

/// One local calendar hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HourSlot {
    /// Local calendar date
    pub date: NaiveDate,
    /// Hour of day, 0-23
    pub hour: u32,
}

impl fmt::Display for HourSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", self.date.format("%Y-%m-%d"), self.hour)
    }
}

impl HourSlot {
    /// The hour containing `time`
    pub fn containing(time: &DateTime<Local>) -> Self {
        Self {
            date: time.date_naive(),
            hour: time.hour(),
        }
    }

    /// Directory holding every shard's file for this hour
    pub fn dir(&self, log_dir: &Path) -> PathBuf {
        log_dir
            .join(self.date.format("%Y-%m-%d").to_string())
            .join(format!("{:02}", self.hour))
    }

    /// Journal file of shard `id` for this hour
    pub fn file_path(&self, log_dir: &Path, id: ShardId) -> PathBuf {
        self.dir(log_dir).join(format!("{}.{}", id, JOURNAL_EXTENSION))
    }
}

/// Time from `now` until the next hour boundary plus `grace`
pub fn next_rotation_delay(now: &DateTime<Local>, grace: Duration) -> Duration {
    let into_hour = Duration::new(
        u64::from(now.minute()) * 60 + u64::from(now.second()),
        // Leap-second nanos (>= 1e9) are clamped to the end of the second
        now.nanosecond().min(999_999_999),
    );
    Duration::from_secs(SECS_PER_HOUR)
        .saturating_sub(into_hour)
        .saturating_add(grace)
}
