// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Segment file discovery
//!
//! Segments are found twice: once by listing the directory at startup, and
//! then continuously from filesystem notifications. Only names of exactly
//! 24 upper-case hex digits count; `.history`, `.partial`, `archive_status`
//! and friends are ignored.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from directory listing and watching
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// A change to one segment file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentEvent {
    /// Created or written; decode what is new
    Changed(PathBuf),
    /// Deleted or renamed away
    Removed(PathBuf),
}

impl SegmentEvent {
    pub fn path(&self) -> &Path {
        match self {
            SegmentEvent::Changed(path) | SegmentEvent::Removed(path) => path,
        }
    }
}

/// Whether a file name looks like a log segment
pub fn is_segment_name(name: &str) -> bool {
    name.len() == 24
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

fn is_segment_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(is_segment_name)
}

/// Segment files currently in `dir`, in name order
///
/// Name order is log order within a timeline.
pub fn list_segments(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let list_error = |source| DiscoveryError::List {
        path: dir.to_path_buf(),
        source,
    };

    let mut segments = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_error)? {
        let entry = entry.map_err(list_error)?;
        let path = entry.path();
        if is_segment_path(&path) && path.is_file() {
            segments.push(path);
        }
    }
    segments.sort();
    Ok(segments)
}

/// Forwards create, modify, and remove notifications for segment files
///
/// Notifications arrive on the watcher's own thread and are pushed into a
/// bounded channel, blocking that thread while the channel is full. Dropping
/// the watcher stops notifications and closes the channel.
pub struct SegmentWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl SegmentWatcher {
    pub fn start(dir: &Path, tx: mpsc::Sender<SegmentEvent>) -> Result<Self, DiscoveryError> {
        let watch_error = |source| DiscoveryError::Watch {
            path: dir.to_path_buf(),
            source,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for event in segment_events(event) {
                        if tx.blocking_send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "segment watch error"),
            },
            Config::default(),
        )
        .map_err(watch_error)?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;
        tracing::info!(dir = %dir.display(), "watching for segment changes");

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Translate one notification into segment events, dropping other files
fn segment_events(event: Event) -> Vec<SegmentEvent> {
    let events: Vec<SegmentEvent> = match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(SegmentEvent::Changed).collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(SegmentEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.into_iter().map(SegmentEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let from = paths.next().map(SegmentEvent::Removed);
            from.into_iter().chain(paths.map(SegmentEvent::Changed)).collect()
        }
        EventKind::Modify(_) => event.paths.into_iter().map(SegmentEvent::Changed).collect(),
        _ => Vec::new(),
    };
    events
        .into_iter()
        .filter(|event| is_segment_path(event.path()))
        .collect()
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
