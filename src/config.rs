//! Configuration for the journal
//!
//! This module provides configuration options shared by every shard worker.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::shard::ShardId;

/// How a rotation target is opened when a file already exists at that path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum OpenMode {
    /// Keep existing contents and append after them
    Append,
    /// Discard existing contents
    Truncate,
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::Append
    }
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl OpenMode {
    /// Parse an open mode from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "truncate" => Ok(Self::Truncate),
            _ => Err(Error::config(format!("Unknown open mode: {}", s))),
        }
    }

    /// Get the name of the open mode
    pub fn name(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Truncate => "truncate",
        }
    }
}

/// Configuration options for journal shards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct JournalConfig {
    // Storage configuration
    /// Root directory for journal files
    pub log_dir: PathBuf,
    /// How existing hour files are opened
    pub open_mode: OpenMode,
    /// Whether to sync file data after every flush
    pub sync_on_flush: bool,

    // Buffering
    /// Configured buffer capacity in records, before jitter
    pub buffer_size: usize,
    /// Optional seed for the capacity jitter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_seed: Option<u64>,

    // Timing
    /// Interval between periodic flushes in milliseconds
    pub flush_interval_ms: u64,
    /// Extra initial flush delay per shard id in milliseconds
    pub flush_stagger_ms: u64,
    /// Seconds past the hour boundary at which rotation fires
    pub rotation_grace_secs: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("journal"),
            open_mode: OpenMode::default(),
            sync_on_flush: false,

            buffer_size: 100,
            jitter_seed: None,

            flush_interval_ms: 2000,
            flush_stagger_ms: 40,
            rotation_grace_secs: 60,
        }
    }
}

impl JournalConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root directory for journal files
    pub fn with_log_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set how existing hour files are opened
    pub fn with_open_mode(mut self, mode: OpenMode) -> Self {
        self.open_mode = mode;
        self
    }

    /// Set whether to sync after every flush
    pub fn with_sync_on_flush(mut self, sync: bool) -> Self {
        self.sync_on_flush = sync;
        self
    }

    /// Set the configured buffer capacity
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set a fixed jitter seed
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    /// Set the periodic flush interval
    pub fn with_flush_interval_ms(mut self, interval: u64) -> Self {
        self.flush_interval_ms = interval;
        self
    }

    /// Set the per-shard flush stagger
    pub fn with_flush_stagger_ms(mut self, stagger: u64) -> Self {
        self.flush_stagger_ms = stagger;
        self
    }

    /// Set the rotation grace offset
    pub fn with_rotation_grace_secs(mut self, secs: u64) -> Self {
        self.rotation_grace_secs = secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::config("Log directory must not be empty"));
        }

        if self.buffer_size < 1 {
            return Err(Error::config("Buffer size must be at least 1"));
        }

        if self.flush_interval_ms < 1 {
            return Err(Error::config("Flush interval must be at least 1ms"));
        }

        if self.rotation_grace_secs >= 3600 {
            return Err(Error::config(
                "Rotation grace must be shorter than one hour",
            ));
        }

        Ok(())
    }

    /// Get the periodic flush interval as a Duration
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Delay before a shard's first periodic flush
    pub fn initial_flush_delay(&self, id: ShardId) -> Duration {
        Duration::from_millis(
            self.flush_interval_ms
                .saturating_add(u64::from(id).saturating_mul(self.flush_stagger_ms)),
        )
    }

    /// Create a human-readable string representation of the configuration
    pub fn to_string_pretty(&self) -> String {
        let mut result = String::new();

        result.push_str("=== Journal Configuration ===\n\n");

        result.push_str("Storage Configuration:\n");
        result.push_str(&format!("  Log Directory: {:?}\n", self.log_dir));
        result.push_str(&format!("  Open Mode: {}\n", self.open_mode));
        result.push_str(&format!("  Sync On Flush: {}\n", self.sync_on_flush));

        result.push_str("\nBuffering:\n");
        result.push_str(&format!("  Buffer Size: {}\n", self.buffer_size));
        if let Some(seed) = self.jitter_seed {
            result.push_str(&format!("  Jitter Seed: {}\n", seed));
        }

        result.push_str("\nTiming:\n");
        result.push_str(&format!("  Flush Interval: {} ms\n", self.flush_interval_ms));
        result.push_str(&format!("  Flush Stagger: {} ms\n", self.flush_stagger_ms));
        result.push_str(&format!("  Rotation Grace: {} s\n", self.rotation_grace_secs));

        result
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
