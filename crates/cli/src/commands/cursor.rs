// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `walcast cursor <value>` - Convert between LSNs and cursors

use anyhow::Context;
use clap::Args;
use walcast_core::Position;

#[derive(Args)]
pub struct CursorArgs {
    /// An `X/Y` LSN or a 16-digit cursor
    pub value: String,
}

/// Parse either notation into a position
pub fn parse_position(value: &str) -> anyhow::Result<Position> {
    if value.contains('/') {
        Position::from_lsn(value).with_context(|| format!("not an LSN: {}", value))
    } else {
        Position::from_cursor(value).with_context(|| format!("not a cursor: {}", value))
    }
}

/// An LSN becomes a cursor and a cursor becomes an LSN
pub fn convert(value: &str) -> anyhow::Result<String> {
    let position = parse_position(value)?;
    if value.contains('/') {
        Ok(position.cursor())
    } else {
        Ok(position.lsn())
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
