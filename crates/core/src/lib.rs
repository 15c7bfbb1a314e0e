// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! walcast-core: data model and pure state for the WAL change feed
//!
//! This crate provides:
//! - Log positions and their string-sortable cursor encoding
//! - Decoded log records and their routing classes
//! - The transaction aggregator that turns records into change events
//! - The bounded history buffer subscribers catch up from

pub mod aggregator;
pub mod event;
pub mod history;
pub mod position;
pub mod record;

pub use aggregator::{Aggregator, Ingest, Watermark};
pub use event::{ChangeEvent, Frame};
pub use history::{HistoryBuffer, DEFAULT_CAPACITY};
pub use position::{CursorError, Position, CURSOR_LEN};
pub use record::{HeapTarget, LogRecord, RecordClass, RecordKind, RowOp, Tid};
