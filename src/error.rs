//! Error handling for the journal
//!
//! This module provides error types and result aliases for journal operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::shard::ShardId;

/// Errors that can occur in journal operations
#[derive(Error, Debug)]
pub enum Error {
    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors related to configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Directory creation or file open failed while rotating
    #[error("Rotation error for {path:?}: {message}")]
    Rotation {
        path: PathBuf,
        message: String,
    },

    /// Appending a batch to the open file failed
    #[error("Flush error for {path:?}: {message}")]
    Flush {
        path: PathBuf,
        message: String,
    },

    /// A record that cannot be represented in the line format
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A request the shard does not understand
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The shard's event loop is no longer running
    #[error("Shard {0} is closed")]
    ShardClosed(ShardId),

    /// A shard with this id is already registered
    #[error("Shard {0} already exists")]
    ShardExists(ShardId),

    /// No shard with this id is registered
    #[error("Shard {0} not found")]
    ShardNotFound(ShardId),

    /// Generic error type for other cases
    #[error("{0}")]
    Other(String),
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new rotation error
    pub fn rotation(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Rotation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new flush error
    pub fn flush(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Flush {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid record error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }

    /// Create a new bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a new generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Check if this is an I/O error
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Check if the shard cannot keep running after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Rotation { .. })
    }

    /// Get a user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Rotation { .. } => {
                Some("Check that the log directory exists and is writable".to_string())
            }
            Self::Flush { .. } => Some("Check available disk space".to_string()),
            Self::Io(err) if err.kind() == io::ErrorKind::NotFound => {
                Some("The specified file or directory does not exist".to_string())
            }
            Self::Io(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                Some("You don't have permission to access this file or directory".to_string())
            }
            Self::ShardClosed(_) => Some("Restart the shard before writing to it".to_string()),
            _ => None,
        }
    }
}
