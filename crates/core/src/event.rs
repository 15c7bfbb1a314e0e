// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change events and the line frames subscribers receive

use crate::position::Position;
use crate::record::{HeapTarget, LogRecord, RecordClass, RowOp};
use serde::{Deserialize, Serialize};

/// A committed row operation, published once per buffered record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Source position of the row record; doubles as the resume cursor
    pub cursor: Position,
    pub xid: u32,
    pub op: RowOp,
    #[serde(flatten)]
    pub target: HeapTarget,
}

impl ChangeEvent {
    /// Build the event for a row record; `None` for any other kind
    pub fn from_record(record: &LogRecord) -> Option<Self> {
        match record.kind.class() {
            RecordClass::Row(op) => Some(Self {
                cursor: record.position,
                xid: record.xid,
                op,
                target: record.target.unwrap_or_default(),
            }),
            RecordClass::Commit | RecordClass::Other => None,
        }
    }
}

/// One line on the subscriber stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Change(ChangeEvent),
    /// Sent on an idle subscription so clients can tell quiet from wedged
    Keepalive { cursor: Position },
}

impl Frame {
    /// Encode as a single JSON line, without the trailing newline
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
