// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Segment feed and the decode/aggregate task
//!
//! The feed hands segment events downstream: the startup listing first, then
//! live change notifications. The pipeline decodes each changed path from the
//! offset it last reached in that file, runs the records through the
//! aggregator, and publishes committed events to the hub. A removed path
//! loses its offset, so a file later created under that name starts at zero.
//! Every hand-off is a bounded queue, so a slow hub stalls decoding instead
//! of growing memory.

use crate::hub::{HubError, HubHandle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walcast_adapters::{DecodeError, SegmentDecoder, SegmentEvent, SegmentWatcher};
use walcast_core::{Aggregator, LogRecord};

/// Backlog size of the first high-water warning; each later one doubles it
pub const BACKLOG_WARN_START: usize = 10_000;

/// Source of segment events: a startup listing followed by live notifications
pub struct SegmentFeed {
    initial: Vec<PathBuf>,
    live: mpsc::Receiver<SegmentEvent>,
    /// Kept alive for as long as the feed runs
    watcher: Option<SegmentWatcher>,
}

impl SegmentFeed {
    pub fn new(initial: Vec<PathBuf>, live: mpsc::Receiver<SegmentEvent>) -> Self {
        Self {
            initial,
            live,
            watcher: None,
        }
    }

    pub fn with_watcher(mut self, watcher: SegmentWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Forward events to `out` until cancelled or either side closes
    ///
    /// Notifications that pile up while `out` is full are coalesced: an
    /// event repeating the latest one waiting for its path is dropped.
    pub async fn run(mut self, out: mpsc::Sender<SegmentEvent>, cancel: CancellationToken) {
        let initial = std::mem::take(&mut self.initial);
        tracing::info!(segments = initial.len(), "replaying existing segments");
        for path in initial {
            if !forward(&out, SegmentEvent::Changed(path), &cancel).await {
                return;
            }
        }

        loop {
            let first = tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.live.recv() => match next {
                    Some(event) => event,
                    None => break,
                },
            };

            let mut batch = vec![first];
            while let Ok(event) = self.live.try_recv() {
                let latest = batch.iter().rev().find(|e| e.path() == event.path());
                if latest != Some(&event) {
                    batch.push(event);
                }
            }
            for event in batch {
                if !forward(&out, event, &cancel).await {
                    return;
                }
            }
        }

        if let Some(watcher) = self.watcher.take() {
            tracing::debug!(dir = %watcher.dir().display(), "segment watch stopped");
        }
    }
}

async fn forward(
    out: &mpsc::Sender<SegmentEvent>,
    event: SegmentEvent,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = out.send(event) => sent.is_ok(),
    }
}

/// Highest decoded offset per segment file
#[derive(Debug, Default)]
pub struct SegmentTracker {
    offsets: HashMap<PathBuf, u32>,
}

impl SegmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset to resume decoding `path` after; zero for a file not seen yet
    pub fn start_offset(&self, path: &Path) -> u32 {
        self.offsets.get(path).copied().unwrap_or(0)
    }

    /// Record the furthest record decoded from `path`
    pub fn advance(&mut self, path: &Path, records: &[LogRecord]) {
        let Some(last) = records.iter().map(|r| r.position.offset).max() else {
            return;
        };
        let offset = self.offsets.entry(path.to_path_buf()).or_insert(0);
        *offset = (*offset).max(last);
    }

    pub fn forget(&mut self, path: &Path) {
        self.offsets.remove(path);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Decodes segments and publishes committed row changes
pub struct Pipeline<D> {
    decoder: D,
    aggregator: Aggregator,
    tracker: SegmentTracker,
    hub: HubHandle,
    backlog_warn_at: usize,
}

impl<D: SegmentDecoder> Pipeline<D> {
    pub fn new(decoder: D, hub: HubHandle) -> Self {
        Self {
            decoder,
            aggregator: Aggregator::new(),
            tracker: SegmentTracker::new(),
            hub,
            backlog_warn_at: BACKLOG_WARN_START,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn tracker(&self) -> &SegmentTracker {
        &self.tracker
    }

    /// Decode one segment notification; returns the number of events published
    ///
    /// A decode failure skips the segment. Only a stopped hub is an error.
    pub async fn process(&mut self, path: PathBuf) -> Result<usize, HubError> {
        let start_offset = self.tracker.start_offset(&path);
        let decoder = self.decoder.clone();
        let decode_path = path.clone();
        let decoded =
            tokio::task::spawn_blocking(move || decoder.decode(&decode_path, start_offset)).await;

        let records = match decoded {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                if let DecodeError::Io { source, .. } = &e {
                    if source.kind() == io::ErrorKind::NotFound {
                        self.tracker.forget(&path);
                    }
                }
                tracing::debug!(path = %path.display(), error = %e, "segment skipped");
                return Ok(0);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "decode task failed");
                return Ok(0);
            }
        };
        self.tracker.advance(&path, &records);

        let mut published = 0;
        for record in records {
            for event in self.aggregator.ingest(record).into_events() {
                self.hub.publish(event).await?;
                published += 1;
            }
        }

        self.check_backlog();
        Ok(published)
    }

    fn check_backlog(&mut self) {
        let backlog = self.aggregator.backlog_len();
        if backlog >= self.backlog_warn_at {
            tracing::warn!(
                backlog,
                "pending row backlog is growing; aborted transactions are never purged"
            );
            while self.backlog_warn_at <= backlog {
                self.backlog_warn_at = self.backlog_warn_at.saturating_mul(2);
            }
        }
    }

    /// Apply one feed event; returns the number of events published
    pub async fn handle(&mut self, event: SegmentEvent) -> Result<usize, HubError> {
        match event {
            SegmentEvent::Changed(path) => self.process(path).await,
            SegmentEvent::Removed(path) => {
                tracing::debug!(path = %path.display(), "segment removed");
                self.tracker.forget(&path);
                Ok(0)
            }
        }
    }

    /// Handle segment events until cancelled, the feed closes, or the hub stops
    pub async fn run(
        mut self,
        mut segments: mpsc::Receiver<SegmentEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = segments.recv() => match next {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Err(e) = self.handle(event).await {
                tracing::error!(error = %e, "pipeline stopping");
                break;
            }
        }

        let watermark = self.aggregator.watermark();
        tracing::info!(
            position = %watermark.position,
            xid = watermark.xid,
            backlog = self.aggregator.backlog_len(),
            "pipeline stopped"
        );
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
