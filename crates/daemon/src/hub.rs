// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History and subscription actor
//!
//! The hub is the single owner of the change history, the checkpoint file,
//! and the set of idle subscribers. Everything else talks to it through a
//! [`HubHandle`]; messages are handled one at a time in arrival order.
//!
//! A catch-up answers with every retained event past the caller's cursor and
//! registers a one-shot wake in the same step, so a publish that lands after
//! the answer always wakes the caller. Waiters whose session went away are
//! pruned on every registration and publish.
//!
//! Every advance hands the new cursor to a checkpoint writer task. The loop
//! never waits on the disk; when writes lag, the writer skips straight to
//! the newest cursor.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use walcast_core::{ChangeEvent, HistoryBuffer, Position};
use walcast_storage::CheckpointFile;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub has stopped")]
    Closed,
}

/// Answer to a catch-up: the missed events plus a wake for the next publish
#[derive(Debug)]
pub struct Backfill {
    pub events: Vec<ChangeEvent>,
    /// Resolves on the next publish; errors if the hub stops first
    pub wake: oneshot::Receiver<()>,
}

/// Point-in-time view of hub state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubStatus {
    pub retained: usize,
    pub capacity: usize,
    /// Cursor of the newest published event, or the restored checkpoint
    pub floor: Position,
    pub waiters: usize,
}

#[derive(Debug)]
pub enum HubMessage {
    Publish(ChangeEvent),
    CatchUp {
        after: Position,
        reply: oneshot::Sender<Backfill>,
    },
    Status {
        reply: oneshot::Sender<HubStatus>,
    },
}

/// Cloneable sender side of the hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubMessage>,
}

impl HubHandle {
    /// Append an event; waits while the hub's queue is full
    pub async fn publish(&self, event: ChangeEvent) -> Result<(), HubError> {
        self.tx
            .send(HubMessage::Publish(event))
            .await
            .map_err(|_| HubError::Closed)
    }

    pub async fn catch_up(&self, after: Position) -> Result<Backfill, HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubMessage::CatchUp { after, reply })
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn status(&self) -> Result<HubStatus, HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubMessage::Status { reply })
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

pub struct Hub {
    rx: mpsc::Receiver<HubMessage>,
    history: HistoryBuffer,
    checkpoint: CheckpointFile,
    /// Checkpoint read at startup; publishes at or below it are replays
    restored: Position,
    /// Newest published cursor; never decreases
    floor: Position,
    /// Feeds the checkpoint writer while `run` is active
    advanced: Option<watch::Sender<Position>>,
    waiters: Vec<oneshot::Sender<()>>,
}

impl Hub {
    /// Create a hub resuming after `restored` and the handle that feeds it
    pub fn new(
        capacity: usize,
        checkpoint: CheckpointFile,
        restored: Position,
        queue_depth: usize,
    ) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let hub = Self {
            rx,
            history: HistoryBuffer::new(capacity),
            checkpoint,
            restored,
            floor: restored,
            advanced: None,
            waiters: Vec::new(),
        };
        (hub, HubHandle { tx })
    }

    /// Process messages until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(
            capacity = self.history.capacity(),
            checkpoint = %self.restored,
            "hub started"
        );

        let (advanced, latest) = watch::channel(self.restored);
        self.advanced = Some(advanced);
        let writer = tokio::spawn(write_checkpoints(self.checkpoint.clone(), latest));

        while let Some(message) = self.rx.recv().await {
            self.handle(message);
        }

        // Closing the channel lets the writer store the last cursor and exit
        self.advanced = None;
        if let Err(e) = writer.await {
            tracing::warn!(error = %e, "checkpoint writer failed");
        }
        tracing::info!(floor = %self.floor, "hub stopped");
    }

    fn handle(&mut self, message: HubMessage) {
        match message {
            HubMessage::Publish(event) => self.publish(event),
            HubMessage::CatchUp { after, reply } => self.catch_up(after, reply),
            HubMessage::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn publish(&mut self, event: ChangeEvent) {
        if event.cursor <= self.floor {
            if event.cursor <= self.restored {
                tracing::debug!(cursor = %event.cursor, "skipping event published before restart");
            } else {
                tracing::warn!(
                    cursor = %event.cursor,
                    floor = %self.floor,
                    xid = event.xid,
                    "dropping event behind an already published cursor"
                );
            }
            return;
        }

        self.floor = event.cursor;
        if let Some(advanced) = &self.advanced {
            advanced.send_replace(event.cursor);
        }
        if let Some(evicted) = self.history.push(event) {
            tracing::trace!(cursor = %evicted.cursor, "evicted from history");
        }

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn catch_up(&mut self, after: Position, reply: oneshot::Sender<Backfill>) {
        self.waiters.retain(|waiter| !waiter.is_closed());

        let (wake, wake_rx) = oneshot::channel();
        let backfill = Backfill {
            events: self.history.since(after),
            wake: wake_rx,
        };
        if reply.send(backfill).is_ok() {
            self.waiters.push(wake);
        }
    }

    fn status(&self) -> HubStatus {
        HubStatus {
            retained: self.history.len(),
            capacity: self.history.capacity(),
            floor: self.floor,
            waiters: self.waiters.iter().filter(|w| !w.is_closed()).count(),
        }
    }
}

/// Store each advanced cursor until the hub closes the channel
///
/// Best effort: a failed write is logged and the next advance writes again.
async fn write_checkpoints(checkpoint: CheckpointFile, mut latest: watch::Receiver<Position>) {
    while latest.changed().await.is_ok() {
        let cursor = *latest.borrow_and_update();
        let file = checkpoint.clone();
        match tokio::task::spawn_blocking(move || file.store(cursor)).await {
            Ok(Ok(())) => tracing::trace!(%cursor, "checkpoint saved"),
            Ok(Err(e)) => tracing::warn!(%cursor, error = %e, "checkpoint write failed"),
            Err(e) => tracing::warn!(%cursor, error = %e, "checkpoint task failed"),
        }
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
