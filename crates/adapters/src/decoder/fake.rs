// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake segment decoder for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DecodeError, SegmentDecoder};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walcast_core::LogRecord;

/// Recorded decode call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeCall {
    pub path: PathBuf,
    pub start_offset: u32,
}

#[derive(Debug, Clone)]
enum Scripted {
    Records(Vec<LogRecord>),
    Failure(String),
}

#[derive(Default)]
struct FakeState {
    segments: HashMap<PathBuf, Scripted>,
    calls: Vec<DecodeCall>,
}

/// Decoder that serves scripted records per path
///
/// Unknown paths decode to nothing. Scripted records are filtered by
/// `start_offset` the same way a real decoder filters them.
#[derive(Clone, Default)]
pub struct FakeDecoder {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records `path` decodes to
    pub fn set_records(&self, path: impl Into<PathBuf>, records: Vec<LogRecord>) {
        self.lock()
            .segments
            .insert(path.into(), Scripted::Records(records));
    }

    /// Make every decode of `path` fail
    pub fn set_failure(&self, path: impl Into<PathBuf>, message: impl Into<String>) {
        self.lock()
            .segments
            .insert(path.into(), Scripted::Failure(message.into()));
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DecodeCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SegmentDecoder for FakeDecoder {
    fn decode(&self, path: &Path, start_offset: u32) -> Result<Vec<LogRecord>, DecodeError> {
        let mut state = self.lock();
        state.calls.push(DecodeCall {
            path: path.to_path_buf(),
            start_offset,
        });

        match state.segments.get(path) {
            None => Ok(Vec::new()),
            Some(Scripted::Records(records)) => Ok(records
                .iter()
                .filter(|record| record.position.offset > start_offset)
                .cloned()
                .collect()),
            Some(Scripted::Failure(message)) => Err(DecodeError::Io {
                path: path.to_path_buf(),
                source: io::Error::other(message.clone()),
            }),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
