use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::JournalConfig;
use crate::error::{Error, Result};
use crate::hook::{logging_hook, SharedHook};
use crate::metrics::ShardStatus;
use crate::record::Metric;
use crate::shard::{spawn_shard, ShardHandle, ShardId};

/// A registered shard and its event loop task
struct ShardEntry {
    handle: ShardHandle,
    task: JoinHandle<Result<()>>,
}

/// Registry of running shards, addressed by id
pub struct ShardManager {
    /// Configuration shared by every shard
    config: JournalConfig,
    /// Wall-clock source handed to each shard
    clock: Arc<dyn Clock>,
    /// Error hook handed to each shard
    hook: SharedHook,
    /// Running shards
    shards: RwLock<HashMap<ShardId, ShardEntry>>,
}

impl ShardManager {
    /// Create an empty manager
    pub fn new(config: JournalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            hook: logging_hook(),
            shards: RwLock::new(HashMap::new()),
        })
    }

    /// Use a different wall-clock source for shards started afterwards
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different error hook for shards started afterwards
    pub fn with_hook(mut self, hook: SharedHook) -> Self {
        self.hook = hook;
        self
    }

    /// Shared configuration
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Start shard `id`; must be called from within a tokio runtime
    pub fn start(&self, id: ShardId) -> Result<ShardHandle> {
        let mut shards = self.shards.write();
        if shards.contains_key(&id) {
            return Err(Error::ShardExists(id));
        }

        let (handle, task) = spawn_shard(id, &self.config, self.clock.clone(), self.hook.clone())?;
        shards.insert(
            id,
            ShardEntry {
                handle: handle.clone(),
                task,
            },
        );

        Ok(handle)
    }

    /// Start every shard in `ids`, stopping at the first failure
    pub fn start_range<I>(&self, ids: I) -> Result<Vec<ShardHandle>>
    where
        I: IntoIterator<Item = ShardId>,
    {
        ids.into_iter().map(|id| self.start(id)).collect()
    }

    /// Handle for shard `id`
    pub fn get(&self, id: ShardId) -> Option<ShardHandle> {
        self.shards.read().get(&id).map(|entry| entry.handle.clone())
    }

    /// Queue a write on shard `id`
    pub fn write<I, M>(&self, id: ShardId, key: impl Into<String>, timestamp: i64, metrics: I) -> Result<()>
    where
        I: IntoIterator<Item = M>,
        M: Into<Metric>,
    {
        let handle = self.get(id).ok_or(Error::ShardNotFound(id))?;
        handle.write(key, timestamp, metrics);
        Ok(())
    }

    /// Status of shard `id`
    pub async fn status(&self, id: ShardId) -> Result<ShardStatus> {
        let handle = self.get(id).ok_or(Error::ShardNotFound(id))?;
        handle.status().await
    }

    /// Stop shard `id` and wait for its event loop to finish
    ///
    /// Returns the loop's own error if it had already stopped on a failed
    /// rotation.
    pub async fn stop(&self, id: ShardId) -> Result<()> {
        let entry = self
            .shards
            .write()
            .remove(&id)
            .ok_or(Error::ShardNotFound(id))?;

        // A loop that already exited reports why through its task
        if let Err(e) = entry.handle.shutdown().await {
            if !matches!(e, Error::ShardClosed(_)) {
                return Err(e);
            }
        }

        match entry.task.await {
            Ok(result) => result,
            Err(join_error) => Err(Error::other(format!(
                "shard {} task failed: {}",
                id, join_error
            ))),
        }
    }

    /// Stop every shard; returns the first error after trying all of them
    pub async fn shutdown_all(&self) -> Result<()> {
        let ids = self.shard_ids();
        let mut first_error = None;

        for id in ids {
            if let Err(e) = self.stop(id).await {
                warn!(shard = id, error = %e, "shard did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }

        info!("all journal shards stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Ids of registered shards, ascending
    pub fn shard_ids(&self) -> Vec<ShardId> {
        let mut ids: Vec<ShardId> = self.shards.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered shards
    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    /// Whether no shards are registered
    pub fn is_empty(&self) -> bool {
        self.shards.read().is_empty()
    }
}

impl std::fmt::Debug for ShardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("log_dir", &self.config.log_dir)
            .field("shards", &self.shard_ids())
            .finish()
    }
}
