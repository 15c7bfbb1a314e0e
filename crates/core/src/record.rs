// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoded log records
//!
//! A [`LogRecord`] is what the segment decoder hands to the aggregator. Only
//! the resource manager id and info byte matter for routing; the heap target
//! is carried through to change events untouched.

use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource manager ids as written in each record header
pub mod rmgr {
    pub const XLOG: u8 = 0;
    pub const XACT: u8 = 1;
    pub const SMGR: u8 = 2;
    pub const CLOG: u8 = 3;
    pub const DBASE: u8 = 4;
    pub const TBLSPC: u8 = 5;
    pub const MULTIXACT: u8 = 6;
    pub const RELMAP: u8 = 7;
    pub const STANDBY: u8 = 8;
    pub const HEAP2: u8 = 9;
    pub const HEAP: u8 = 10;
    pub const BTREE: u8 = 11;
    pub const HASH: u8 = 12;
    pub const GIN: u8 = 13;
    pub const GIST: u8 = 14;
    pub const SEQ: u8 = 15;
}

/// Info codes for `rmgr::XACT` records
pub mod xact {
    pub const COMMIT: u8 = 0x00;
    pub const PREPARE: u8 = 0x10;
    pub const ABORT: u8 = 0x20;
    pub const COMMIT_PREPARED: u8 = 0x30;
    pub const ABORT_PREPARED: u8 = 0x40;
    pub const ASSIGNMENT: u8 = 0x50;
}

/// Info codes for `rmgr::HEAP` records (after masking with [`heap::OPMASK`])
pub mod heap {
    pub const OPMASK: u8 = 0x70;
    pub const INSERT: u8 = 0x00;
    pub const DELETE: u8 = 0x10;
    pub const UPDATE: u8 = 0x20;
    pub const MOVE: u8 = 0x30;
    pub const HOT_UPDATE: u8 = 0x40;
    pub const NEWPAGE: u8 = 0x50;
    pub const LOCK: u8 = 0x60;
    pub const INPLACE: u8 = 0x70;
    /// Set alongside the op code when the record initializes a fresh page
    pub const INIT_PAGE: u8 = 0x80;
}

/// Resource manager id plus the rmgr-specific info bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKind {
    pub rmid: u8,
    pub info: u8,
}

impl RecordKind {
    pub const fn new(rmid: u8, info: u8) -> Self {
        Self { rmid, info }
    }

    pub const fn commit() -> Self {
        Self::new(rmgr::XACT, xact::COMMIT)
    }

    pub const fn abort() -> Self {
        Self::new(rmgr::XACT, xact::ABORT)
    }

    pub const fn heap(op: u8) -> Self {
        Self::new(rmgr::HEAP, op)
    }

    /// Route this record: commit, buffered row change, or nothing
    pub fn class(&self) -> RecordClass {
        match self.rmid {
            rmgr::XACT if self.info == xact::COMMIT => RecordClass::Commit,
            rmgr::HEAP => match RowOp::from_heap_info(self.info) {
                Some(op) => RecordClass::Row(op),
                None => RecordClass::Other,
            },
            _ => RecordClass::Other,
        }
    }
}

/// How the aggregator treats a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    /// Transaction commit: flush that transaction's buffered rows
    Commit,
    /// Row change awaiting its transaction's outcome
    Row(RowOp),
    /// Everything else only advances the high-water mark
    Other,
}

/// The mutating heap operations that become change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOp {
    Insert,
    Delete,
    Update,
    HotUpdate,
}

impl RowOp {
    pub fn from_heap_info(info: u8) -> Option<Self> {
        match info & heap::OPMASK {
            heap::INSERT => Some(RowOp::Insert),
            heap::DELETE => Some(RowOp::Delete),
            heap::UPDATE => Some(RowOp::Update),
            heap::HOT_UPDATE => Some(RowOp::HotUpdate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowOp::Insert => "insert",
            RowOp::Delete => "delete",
            RowOp::Update => "update",
            RowOp::HotUpdate => "hot_update",
        }
    }
}

impl fmt::Display for RowOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuple id: heap block number plus line pointer offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tid {
    pub block: u32,
    pub offset: u16,
}

impl Tid {
    pub const fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }
}

/// Relation and tuple ids a heap record touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapTarget {
    pub tablespace: u32,
    pub database: u32,
    pub relation: u32,
    /// Old tuple for updates and in-place updates
    pub from: Option<Tid>,
    pub to: Tid,
}

/// One decoded record from a log segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub kind: RecordKind,
    pub position: Position,
    pub xid: u32,
    /// Present for heap records whose payload was decoded
    pub target: Option<HeapTarget>,
}

impl LogRecord {
    pub fn new(kind: RecordKind, position: Position, xid: u32) -> Self {
        Self {
            kind,
            position,
            xid,
            target: None,
        }
    }

    pub fn with_target(mut self, target: HeapTarget) -> Self {
        self.target = Some(target);
        self
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
