// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log positions and their cursor encoding
//!
//! A [`Position`] orders records by segment id first, then by offset within
//! the segment. Its cursor form is 16 upper-case hex digits (8 per field),
//! so comparing two cursors as strings gives the same answer as comparing
//! the positions numerically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of the fixed-width cursor string
pub const CURSOR_LEN: usize = 16;

/// Errors from parsing cursors or LSN notation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("cursor must be {CURSOR_LEN} hex digits, got {0} characters")]
    Length(usize),
    #[error("cursor is not hexadecimal: {0}")]
    NotHex(String),
    #[error("invalid LSN (expected X/Y): {0}")]
    Lsn(String),
}

/// Physical place of a record in the log's total order
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Position {
    /// Log file id (reused by the database when segments are recycled)
    pub segment: u32,
    /// Byte offset of the record within the log file
    pub offset: u32,
}

impl Position {
    /// The epoch position; every real record is after it
    pub const ZERO: Position = Position {
        segment: 0,
        offset: 0,
    };

    pub const fn new(segment: u32, offset: u32) -> Self {
        Self { segment, offset }
    }

    /// Encode as the fixed-width resume cursor
    pub fn cursor(&self) -> String {
        self.to_string()
    }

    /// Parse a cursor, accepting either letter case
    pub fn from_cursor(cursor: &str) -> Result<Self, CursorError> {
        if cursor.len() != CURSOR_LEN {
            return Err(CursorError::Length(cursor.chars().count()));
        }
        if !cursor.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CursorError::NotHex(cursor.to_string()));
        }
        let (segment, offset) = cursor.split_at(CURSOR_LEN / 2);
        let parse = |s: &str| {
            u32::from_str_radix(s, 16).map_err(|_| CursorError::NotHex(cursor.to_string()))
        };
        Ok(Self::new(parse(segment)?, parse(offset)?))
    }

    /// Render in the database's `X/Y` LSN notation
    pub fn lsn(&self) -> String {
        format!("{:X}/{:X}", self.segment, self.offset)
    }

    /// Parse the database's `X/Y` LSN notation
    pub fn from_lsn(lsn: &str) -> Result<Self, CursorError> {
        let (segment, offset) = lsn
            .split_once('/')
            .ok_or_else(|| CursorError::Lsn(lsn.to_string()))?;
        let parse =
            |s: &str| u32::from_str_radix(s, 16).map_err(|_| CursorError::Lsn(lsn.to_string()));
        Ok(Self::new(parse(segment)?, parse(offset)?))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}{:08X}", self.segment, self.offset)
    }
}

impl FromStr for Position {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_cursor(s)
    }
}

impl From<Position> for String {
    fn from(position: Position) -> Self {
        position.cursor()
    }
}

impl TryFrom<String> for Position {
    type Error = CursorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_cursor(&value)
    }
}

#[cfg(test)]
#[path = "position_tests.rs"]
mod tests;
