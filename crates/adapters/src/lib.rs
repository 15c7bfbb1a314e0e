// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the log directory: segment decoding and file discovery

pub mod decoder;
pub mod discovery;
pub mod traced;

pub use decoder::{DecodeError, PgXlogDecoder, SegmentDecoder, SegmentName};
pub use discovery::{
    is_segment_name, list_segments, DiscoveryError, SegmentEvent, SegmentWatcher,
};
pub use traced::TracedDecoder;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use decoder::{DecodeCall, FakeDecoder, SegmentBuilder};
