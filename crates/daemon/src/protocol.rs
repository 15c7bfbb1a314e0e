// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber line protocol
//!
//! The client opens with `start` (replay everything retained) or
//! `start <cursor>` (everything after that cursor). The server answers a
//! bad opening line with [`ERROR_LINE`] and keeps waiting; after a good one
//! it streams one JSON [`Frame`] per line until the connection drops.

use std::io;

use thiserror::Error;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use walcast_core::{CursorError, Frame, Position};

/// Reply to any line that is not a valid start request
pub const ERROR_LINE: &str = "error: must send either \"start\" or \"start <logid>\"";

/// Longest client line kept; longer lines are discarded up to their newline
pub const MAX_LINE_LEN: usize = 1024;

/// One line read from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// Line text, invalid UTF-8 replaced
    Text(String),
    /// Line exceeded [`MAX_LINE_LEN`]; its bytes were dropped
    Overlong,
}

/// Newline-delimited client reader that never fails on content
///
/// Unlike `LinesCodec`, bad bytes and oversized lines are items, not
/// errors, so the stream keeps going after them.
#[derive(Debug)]
pub struct ClientLineCodec {
    max_len: usize,
    /// Skipping the tail of an overlong line
    discarding: bool,
}

impl ClientLineCodec {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            discarding: false,
        }
    }
}

impl Default for ClientLineCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

impl Decoder for ClientLineCodec {
    type Item = ClientLine;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ClientLine>, io::Error> {
        loop {
            let newline = buf.iter().position(|b| *b == b'\n');

            if self.discarding {
                match newline {
                    Some(at) => {
                        buf.advance(at + 1);
                        self.discarding = false;
                    }
                    None => {
                        buf.clear();
                        return Ok(None);
                    }
                }
                continue;
            }

            return match newline {
                Some(at) if at <= self.max_len => {
                    let line = buf.split_to(at + 1);
                    Ok(Some(text_line(&line[..at])))
                }
                Some(at) => {
                    buf.advance(at + 1);
                    Ok(Some(ClientLine::Overlong))
                }
                None if buf.len() > self.max_len => {
                    buf.clear();
                    self.discarding = true;
                    Ok(Some(ClientLine::Overlong))
                }
                None => Ok(None),
            };
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<ClientLine>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if self.discarding || buf.is_empty() {
            buf.clear();
            return Ok(None);
        }
        let line = buf.split_to(buf.len());
        Ok(Some(text_line(&line)))
    }
}

fn text_line(bytes: &[u8]) -> ClientLine {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    ClientLine::Text(String::from_utf8_lossy(bytes).into_owned())
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("expected a start request, got {0:?}")]
    NotStart(String),
    #[error("bad start cursor: {0}")]
    Cursor(#[from] CursorError),
    #[error("unexpected text after the cursor: {0:?}")]
    Trailing(String),
    #[error("line longer than {MAX_LINE_LEN} bytes")]
    Overlong,
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Parse an opening line into the cursor to resume after
///
/// The keyword is case-insensitive and the cursor accepts either case.
pub fn parse_start(line: &str) -> Result<Position, ProtocolError> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some(keyword) if keyword.eq_ignore_ascii_case("start") => {}
        _ => return Err(ProtocolError::NotStart(line.to_string())),
    }

    let cursor = match tokens.next() {
        Some(token) => Position::from_cursor(token)?,
        None => Position::ZERO,
    };
    if let Some(extra) = tokens.next() {
        return Err(ProtocolError::Trailing(extra.to_string()));
    }
    Ok(cursor)
}

/// Encode a frame as one newline-terminated line
pub fn encode_line(frame: &Frame) -> Result<String, ProtocolError> {
    let mut line = frame.encode()?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
