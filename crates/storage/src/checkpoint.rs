// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted checkpoint cursor
//!
//! The checkpoint is a single text file holding the cursor of the most
//! recently published change event. It is a resume hint: on startup events
//! at or before it are not republished. Writes go to a sibling temp file
//! that is fsync'd and renamed over the target, so a crash leaves either the
//! old or the new cursor, never a torn one.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walcast_core::{CursorError, Position};

/// Errors from checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt checkpoint in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: CursorError,
    },
}

/// The checkpoint file; only the hub writes it
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the file can be created and written, without touching its contents
    pub fn ensure_writable(&self) -> Result<(), CheckpointError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map(drop)
            .map_err(|source| self.io_error(source))
    }

    /// Read the stored cursor; a missing or empty file is `None`
    pub fn load(&self) -> Result<Option<Position>, CheckpointError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let cursor = contents.trim();
        if cursor.is_empty() {
            return Ok(None);
        }

        Position::from_cursor(cursor)
            .map(Some)
            .map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Read the stored cursor, treating any failure as "start from the epoch"
    pub fn load_or_epoch(&self) -> Position {
        match self.load() {
            Ok(Some(cursor)) => cursor,
            Ok(None) => Position::ZERO,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable checkpoint, replaying from the epoch");
                Position::ZERO
            }
        }
    }

    /// Replace the stored cursor
    pub fn store(&self, cursor: Position) -> Result<(), CheckpointError> {
        let temp_path = self.temp_path();
        let write = || -> io::Result<()> {
            let mut file = File::create(&temp_path)?;
            writeln!(file, "{}", cursor)?;
            file.sync_all()?;
            // Atomic replace (rename is atomic on POSIX)
            std::fs::rename(&temp_path, &self.path)
        };

        write().map_err(|source| {
            let _ = std::fs::remove_file(&temp_path);
            self.io_error(source)
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("checkpoint"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
