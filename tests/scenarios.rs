use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use shard_journal::shard::{buffer_capacity, JournalWorker, WriteOutcome};
use shard_journal::{
    spawn_shard, FixedClock, JournalConfig, LoggingHook, Metric, Record, SharedHook, ShardId,
};

fn clock_at(h: u32, m: u32) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Local.with_ymd_and_hms(2024, 6, 15, h, m, 0).unwrap(),
    ))
}

fn hook() -> SharedHook {
    Arc::new(LoggingHook)
}

fn hour_file(root: &Path, hour: u32, id: ShardId) -> PathBuf {
    root.join("2024-06-15")
        .join(format!("{:02}", hour))
        .join(format!("{}.journal", id))
}

fn v1(key: &str, ts: i64) -> Record {
    Record::new(key, ts, vec![Metric::new("v", 1)]).unwrap()
}

#[test]
fn scenario_a_capacity_three_waits_for_periodic_flush() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::new().with_log_dir(dir.path()).with_buffer_size(2);
    let (mut worker, _) = JournalWorker::start(1, &config, 3, clock_at(11, 0), hook()).unwrap();

    assert_eq!(worker.write(v1("k1", 100)), WriteOutcome::Queued);
    assert_eq!(worker.write(v1("k2", 101)), WriteOutcome::Queued);
    assert_eq!(worker.write(v1("k3", 102)), WriteOutcome::Queued);
    assert_eq!(worker.queued(), 3);

    // Periodic flush
    worker.flush();
    assert_eq!(
        fs::read_to_string(hour_file(dir.path(), 11, 1)).unwrap(),
        "k1@100:v=1\nk2@101:v=1\nk3@102:v=1\n"
    );
}

#[test]
fn scenario_b_third_write_forces_flush() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::new().with_log_dir(dir.path());
    let (mut worker, _) = JournalWorker::start(1, &config, 2, clock_at(11, 0), hook()).unwrap();

    worker.write(v1("k1", 100));
    worker.write(v1("k2", 101));
    assert_eq!(worker.write(v1("k3", 102)), WriteOutcome::Committed);

    assert_eq!(worker.queued(), 0);
    assert_eq!(
        fs::read_to_string(hour_file(dir.path(), 11, 1)).unwrap(),
        "k1@100:v=1\nk2@101:v=1\nk3@102:v=1\n"
    );
}

#[test]
fn scenario_c_rotation_splits_hours() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock_at(11, 58);
    let config = JournalConfig::new().with_log_dir(dir.path());
    let (mut worker, _) = JournalWorker::start(4, &config, 10, clock.clone(), hook()).unwrap();

    worker.write(v1("before1", 1));
    worker.write(v1("before2", 2));

    clock.advance(chrono::Duration::minutes(3));
    worker.rotate().unwrap();

    assert_eq!(
        fs::read_to_string(hour_file(dir.path(), 11, 4)).unwrap(),
        "before1@1:v=1\nbefore2@2:v=1\n"
    );
    assert_eq!(fs::read_to_string(hour_file(dir.path(), 12, 4)).unwrap(), "");
}

#[test_log::test(tokio::test(start_paused = true))]
async fn scenario_d_status_after_five_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::new()
        .with_log_dir(dir.path())
        .with_buffer_size(5)
        .with_jitter_seed(11);
    let (handle, task) = spawn_shard(0, &config, clock_at(21, 40), hook()).unwrap();

    for ts in 0..5 {
        handle.write("m", ts, [("v", ts)]);
    }

    let status = handle.status().await.unwrap();
    assert_eq!(status.current_hour, 21);
    assert_eq!(status.queued, 5);
    assert!(status.buffer_capacity >= 6 && status.buffer_capacity <= 10);
    assert_eq!(status.metrics.commits, 0);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[test]
fn capacity_bounds_hold_for_many_seeds() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    for seed in 0..500u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let capacity = buffer_capacity(100, &mut rng);
        assert!((101..=200).contains(&capacity));
    }
}
