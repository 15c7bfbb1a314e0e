// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Segment decoding

mod crc;
mod xlog;

#[cfg(any(test, feature = "test-support"))]
mod builder;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use xlog::{PgXlogDecoder, SegmentName, XLOG_BLCKSZ, XLOG_SEG_SIZE};

#[cfg(any(test, feature = "test-support"))]
pub use builder::{SegmentBuilder, DATABASE, TABLESPACE};
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DecodeCall, FakeDecoder};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walcast_core::LogRecord;

/// Errors from segment decoding
///
/// Malformed content inside a segment is not an error: decoding stops at
/// the last valid record, which is the normal state of a segment that is
/// still being written.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot read segment {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not a log segment file name: {0}")]
    FileName(PathBuf),
    #[error("segment {0} lies beyond the 4 GiB log file range")]
    OutOfRange(PathBuf),
}

/// Turns one segment file into records
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait SegmentDecoder: Clone + Send + Sync + 'static {
    /// Decode the records of `path` positioned strictly after `start_offset`,
    /// in file order
    fn decode(&self, path: &Path, start_offset: u32) -> Result<Vec<LogRecord>, DecodeError>;
}
