// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! walcast-daemon: the change feed server
//!
//! Wires segment discovery, decoding, and aggregation into the hub, and
//! serves the hub's history to TCP subscribers.

pub mod hub;
pub mod lifecycle;
pub mod pipeline;
pub mod protocol;
pub mod server;

pub use hub::{Backfill, Hub, HubError, HubHandle, HubStatus};
pub use lifecycle::{startup, Config, DaemonState, LifecycleError};
pub use server::SessionConfig;
