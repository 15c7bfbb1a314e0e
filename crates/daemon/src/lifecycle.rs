// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use walcast_adapters::{
    list_segments, DiscoveryError, PgXlogDecoder, SegmentWatcher, TracedDecoder,
};
use walcast_storage::{CheckpointError, CheckpointFile};

use crate::hub::{Hub, HubError, HubHandle, HubStatus};
use crate::pipeline::{Pipeline, SegmentFeed};
use crate::server::{self, SessionConfig};

/// Decoder the daemon runs with
pub type DaemonDecoder = TracedDecoder<PgXlogDecoder>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the database writes its log segments into
    pub path: PathBuf,
    /// Checkpoint file
    pub statefile: PathBuf,
    /// TCP listen address
    pub listen: String,
    /// History capacity
    pub buffer: usize,
    /// Idle keepalive interval; `None` disables keepalives
    pub keepalive: Option<Duration>,
    /// Per-write deadline for a client
    pub write_timeout: Duration,
    /// Bound of every internal queue
    pub queue_depth: usize,
    /// How long shutdown waits for tasks to drain
    pub shutdown_grace: Duration,
    /// Log file; stderr when unset
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Config with default settings for the given directories
    pub fn new(path: impl Into<PathBuf>, statefile: impl Into<PathBuf>) -> Self {
        let session = SessionConfig::default();
        Self {
            path: path.into(),
            statefile: statefile.into(),
            listen: "0.0.0.0:8989".to_string(),
            buffer: walcast_core::DEFAULT_CAPACITY,
            keepalive: session.keepalive,
            write_timeout: session.write_timeout,
            queue_depth: 1024,
            shutdown_grace: Duration::from_secs(5),
            log_file: None,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            keepalive: self.keepalive,
            write_timeout: self.write_timeout,
        }
    }
}

/// Running daemon
pub struct DaemonState {
    pub config: Config,
    local_addr: SocketAddr,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    /// When daemon started
    pub start_time: Instant,
}

impl DaemonState {
    /// Address the listener actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn status(&self) -> Result<HubStatus, HubError> {
        self.hub.status().await
    }

    /// Shutdown the daemon gracefully
    ///
    /// Stops accepting, lets sessions and the pipeline observe cancellation,
    /// then waits for the hub to write its final checkpoint. Each wait is
    /// bounded by `grace`.
    pub async fn shutdown(self, grace: Duration) {
        info!("Shutting down daemon...");
        self.cancel.cancel();
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(
                tasks = self.tracker.len(),
                "tasks still running after shutdown grace period"
            );
        }

        // The hub exits once the last handle is gone
        drop(self.hub);
        match tokio::time::timeout(grace, self.hub_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "hub task failed"),
            Err(_) => warn!("hub did not stop within shutdown grace period"),
        }

        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Daemon shutdown complete"
        );
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("WAL directory not found at {0}: {1}")]
    WalDirNotFound(PathBuf, std::io::Error),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("History buffer must hold at least one event")]
    EmptyBuffer,

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
///
/// Every check that can fail runs before any task is spawned, so an error
/// leaves nothing running.
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    let start_time = Instant::now();

    let metadata = std::fs::metadata(&config.path)
        .map_err(|e| LifecycleError::WalDirNotFound(config.path.clone(), e))?;
    if !metadata.is_dir() {
        return Err(LifecycleError::NotADirectory(config.path.clone()));
    }
    if config.buffer == 0 {
        return Err(LifecycleError::EmptyBuffer);
    }

    let checkpoint = CheckpointFile::new(&config.statefile);
    checkpoint.ensure_writable()?;
    let restored = checkpoint.load_or_epoch();

    let listener = TcpListener::bind(&config.listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen.clone(), e))?;
    let local_addr = listener.local_addr()?;

    // Watch before listing so a segment written in between is not missed
    let (live_tx, live_rx) = mpsc::channel(config.queue_depth.max(1));
    let watcher = SegmentWatcher::start(&config.path, live_tx)?;
    let initial = list_segments(&config.path)?;

    let (hub, handle) = Hub::new(config.buffer, checkpoint, restored, config.queue_depth);
    let hub_task = tokio::spawn(hub.run());

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    let (segments_tx, segments_rx) = mpsc::channel(config.queue_depth.max(1));
    tracker.spawn(
        SegmentFeed::new(initial, live_rx)
            .with_watcher(watcher)
            .run(segments_tx, cancel.clone()),
    );

    let decoder: DaemonDecoder = TracedDecoder::new(PgXlogDecoder::new());
    tracker.spawn(Pipeline::new(decoder, handle.clone()).run(segments_rx, cancel.clone()));

    tracker.spawn(server::serve(
        listener,
        handle.clone(),
        config.session(),
        cancel.clone(),
        tracker.clone(),
    ));

    info!(
        path = %config.path.display(),
        statefile = %config.statefile.display(),
        addr = %local_addr,
        checkpoint = %restored,
        "Daemon started in {:?}",
        start_time.elapsed()
    );

    Ok(DaemonState {
        config: config.clone(),
        local_addr,
        hub: handle,
        hub_task,
        cancel,
        tracker,
        start_time,
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
