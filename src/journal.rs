//! Hour journal files
//!
//! A [`JournalFile`] is the exclusively-owned, append-only handle a shard
//! writes its flushed batches to. Opening creates any missing directories.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::OpenMode;
use crate::error::{Error, Result};

/// An open journal file
#[derive(Debug)]
pub struct JournalFile {
    /// Path of the open file
    path: PathBuf,
    /// Underlying file handle
    file: File,
    /// Bytes appended through this handle
    bytes_written: u64,
}

impl JournalFile {
    /// Open `path` for writing, creating parent directories as needed
    pub fn open(path: impl Into<PathBuf>, mode: OpenMode) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::rotation(
                    &path,
                    format!("Failed to create directory {}: {}", parent.display(), e),
                )
            })?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            OpenMode::Append => options.append(true),
            OpenMode::Truncate => options.write(true).truncate(true),
        };

        let file = options
            .open(&path)
            .map_err(|e| Error::rotation(&path, format!("Failed to open journal file: {}", e)))?;

        Ok(Self {
            path,
            file,
            bytes_written: 0,
        })
    }

    /// Append `bytes` in a single write
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .map_err(|e| Error::flush(&self.path, format!("Failed to append batch: {}", e)))?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Sync file data to disk
    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_data()
            .map_err(|e| Error::flush(&self.path, format!("Failed to sync journal file: {}", e)))
    }

    /// Path of the open file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended through this handle
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Close the file, reporting any error from the final sync
    pub fn close(self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| Error::flush(&self.path, format!("Failed to close journal file: {}", e)))
    }
}
