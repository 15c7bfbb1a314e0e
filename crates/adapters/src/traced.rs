// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::decoder::{DecodeError, SegmentDecoder};
use std::path::Path;
use walcast_core::LogRecord;

/// Wrapper that adds tracing to any SegmentDecoder
#[derive(Clone)]
pub struct TracedDecoder<D> {
    inner: D,
}

impl<D> TracedDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: SegmentDecoder> SegmentDecoder for TracedDecoder<D> {
    fn decode(&self, path: &Path, start_offset: u32) -> Result<Vec<LogRecord>, DecodeError> {
        let span = tracing::debug_span!("segment.decode", path = %path.display(), start_offset);
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let result = self.inner.decode(path, start_offset);
        let elapsed = start.elapsed();

        match &result {
            Ok(records) => tracing::debug!(
                records = records.len(),
                last = ?records.last().map(|r| r.position.cursor()),
                elapsed_ms = elapsed.as_millis() as u64,
                "decoded"
            ),
            Err(e) => tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "decode failed"
            ),
        }

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
