// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! walcast daemon (walcastd)
//!
//! Tails a PostgreSQL WAL directory and streams committed row changes to
//! TCP subscribers.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use walcast_daemon::lifecycle::{self, Config, LifecycleError};

#[derive(Parser, Debug)]
#[command(
    name = "walcastd",
    version,
    about = "Stream committed row changes from a WAL directory"
)]
struct Args {
    /// Directory the database writes its WAL segments into
    #[arg(long, env = "WALCAST_PATH")]
    path: PathBuf,

    /// File holding the last published cursor
    #[arg(long, env = "WALCAST_STATEFILE")]
    statefile: PathBuf,

    /// TCP listen address
    #[arg(long, env = "WALCAST_LISTEN", default_value = "0.0.0.0:8989")]
    listen: String,

    /// Number of change events kept for catch-up
    #[arg(long, env = "WALCAST_BUFFER", default_value_t = 1000,
          value_parser = clap::value_parser!(u32).range(1..))]
    buffer: u32,

    /// Idle seconds before a keepalive frame; 0 disables keepalives
    #[arg(long, env = "WALCAST_KEEPALIVE_SECS", default_value_t = 30)]
    keepalive_secs: u64,

    /// Seconds a write to a client may take before it is disconnected
    #[arg(long, env = "WALCAST_WRITE_TIMEOUT_SECS", default_value_t = 10)]
    write_timeout_secs: u64,

    /// Bound of every internal queue
    #[arg(long, env = "WALCAST_QUEUE_DEPTH", default_value_t = 1024)]
    queue_depth: usize,

    /// Seconds shutdown waits for sessions and the pipeline to drain
    #[arg(long, env = "WALCAST_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    shutdown_grace_secs: u64,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "WALCAST_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config::new(self.path, self.statefile);
        config.listen = self.listen;
        config.buffer = self.buffer as usize;
        config.keepalive =
            (self.keepalive_secs > 0).then_some(Duration::from_secs(self.keepalive_secs));
        config.write_timeout = Duration::from_secs(self.write_timeout_secs);
        config.queue_depth = self.queue_depth;
        config.shutdown_grace = Duration::from_secs(self.shutdown_grace_secs);
        config.log_file = self.log_file;
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config();

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting walcastd for {}", config.path.display());

    // Start daemon
    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Daemon ready, listening on {}", daemon.local_addr());

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
    }

    daemon.shutdown(config.shutdown_grace).await;

    info!("Daemon stopped");
    drop(log_guard);
    Ok(())
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_file) = &config.log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    // Create log directory if needed
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let name = log_file.file_name().ok_or_else(|| {
        LifecycleError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("log file has no name: {}", log_file.display()),
        ))
    })?;

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(Some(guard))
}
