//! Error reporting for fire-and-forget paths
//!
//! Writes and timer-driven flushes have no caller to return an error to.
//! Failures on those paths are handed to an [`ErrorHook`] instead.

use std::sync::Arc;

use crate::error::Error;
use crate::shard::ShardId;

/// Receives errors that cannot be returned to a caller
pub trait ErrorHook: Send + Sync {
    /// Report an error raised by shard `shard`
    fn report(&self, shard: ShardId, error: &Error);
}

impl<F> ErrorHook for F
where
    F: Fn(ShardId, &Error) + Send + Sync,
{
    fn report(&self, shard: ShardId, error: &Error) {
        self(shard, error)
    }
}

/// Hook that logs every report
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook;

impl ErrorHook for LoggingHook {
    fn report(&self, shard: ShardId, error: &Error) {
        tracing::error!(shard, error = %error, "journal shard error");
    }
}

/// Shared hook handle
pub type SharedHook = Arc<dyn ErrorHook>;

/// The default hook
pub fn logging_hook() -> SharedHook {
    Arc::new(LoggingHook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook: SharedHook = Arc::new(move |shard: ShardId, error: &Error| {
            sink.lock().push((shard, error.to_string()));
        });

        hook.report(3, &Error::flush("/tmp/3.journal", "disk full"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 3);
        assert!(seen[0].1.contains("disk full"));
    }
}
