// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction aggregation
//!
//! The aggregator turns the decoder's record stream into change events in
//! commit order. Row records wait in a single backlog until a commit record
//! for their transaction arrives; at that point they are emitted in their
//! original relative order.
//!
//! The database recycles segment files, so old content can reappear under a
//! new name. A record is only accepted when its position is strictly past the
//! high-water mark *and* its transaction id is not below the highest one seen.
//!
//! Aborted transactions are never purged: their rows stay in the backlog.

use crate::event::ChangeEvent;
use crate::position::Position;
use crate::record::{LogRecord, RecordClass};

/// Highest accepted position together with its transaction id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark {
    pub position: Position,
    pub xid: u32,
}

impl Watermark {
    pub const fn new(position: Position, xid: u32) -> Self {
        Self { position, xid }
    }

    /// Whether a record passes the recycled-segment guard
    pub fn admits(&self, record: &LogRecord) -> bool {
        record.xid >= self.xid && record.position > self.position
    }
}

/// Result of feeding one record to the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    /// Failed the monotonicity guard; state untouched
    Rejected,
    /// Row record added to the backlog
    Buffered,
    /// Commit record; these events are ready to publish, in order
    Committed(Vec<ChangeEvent>),
    /// Accepted for the watermark only
    Observed,
}

impl Ingest {
    pub fn into_events(self) -> Vec<ChangeEvent> {
        match self {
            Ingest::Committed(events) => events,
            Ingest::Rejected | Ingest::Buffered | Ingest::Observed => Vec::new(),
        }
    }
}

/// Buffers row operations until their transaction commits
#[derive(Debug, Default)]
pub struct Aggregator {
    highest: Watermark,
    backlog: Vec<LogRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a known watermark
    pub fn with_watermark(highest: Watermark) -> Self {
        Self {
            highest,
            backlog: Vec::new(),
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.highest
    }

    pub fn backlog(&self) -> &[LogRecord] {
        &self.backlog
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Feed the next record in arrival order
    pub fn ingest(&mut self, record: LogRecord) -> Ingest {
        if !self.highest.admits(&record) {
            tracing::trace!(
                position = %record.position,
                xid = record.xid,
                watermark = %self.highest.position,
                "record below watermark"
            );
            return Ingest::Rejected;
        }
        self.highest = Watermark::new(record.position, record.xid);

        match record.kind.class() {
            RecordClass::Commit => Ingest::Committed(self.flush(record.xid)),
            RecordClass::Row(_) => {
                self.backlog.push(record);
                Ingest::Buffered
            }
            RecordClass::Other => Ingest::Observed,
        }
    }

    /// Remove and convert every backlog entry belonging to `xid`
    fn flush(&mut self, xid: u32) -> Vec<ChangeEvent> {
        let (committed, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.backlog)
            .into_iter()
            .partition(|record| record.xid == xid);
        self.backlog = pending;

        committed
            .iter()
            .filter_map(ChangeEvent::from_record)
            .collect()
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
