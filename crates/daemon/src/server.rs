// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP listener and subscriber sessions.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use walcast_core::Frame;

use crate::hub::{Backfill, HubError, HubHandle};
use crate::protocol::{self, ClientLine, ClientLineCodec, ProtocolError, ERROR_LINE};

/// Delay before accepting again after an accept error
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection settings
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Idle interval before a keepalive frame; `None` disables them
    pub keepalive: Option<Duration>,
    /// Deadline for each write to the client
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive: Some(Duration::from_secs(30)),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Session errors; all of them end the connection
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("write timed out")]
    WriteTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Hub(#[from] HubError),
}

/// Accept connections until cancelled, one tracked task per session
pub async fn serve(
    listener: TcpListener,
    hub: HubHandle,
    config: SessionConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tracker.spawn(handle_connection(
                    stream,
                    peer,
                    hub.clone(),
                    config,
                    cancel.clone(),
                ));
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
    info!("stopped accepting connections");
}

/// Run one subscriber session to completion
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: HubHandle,
    config: SessionConfig,
    cancel: CancellationToken,
) {
    debug!(%peer, "client connected");
    match run_session(stream, peer, &hub, config, &cancel).await {
        Ok(()) => debug!(%peer, "client disconnected"),
        Err(e) => info!(%peer, error = %e, "session ended"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    hub: &HubHandle,
    config: SessionConfig,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    let (reader, writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, ClientLineCodec::default());
    let mut writer = BufWriter::new(writer);

    // Awaiting start
    let mut cursor = loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = lines.next() => line,
        };
        let Some(line) = line.transpose()? else {
            return Ok(());
        };
        let parsed = match line {
            ClientLine::Text(text) => protocol::parse_start(&text),
            ClientLine::Overlong => Err(ProtocolError::Overlong),
        };
        match parsed {
            Ok(cursor) => break cursor,
            Err(e) => {
                debug!(%peer, error = %e, "rejected start line");
                write_line(&mut writer, &format!("{}\n", ERROR_LINE), config.write_timeout)
                    .await?;
            }
        }
    };
    info!(%peer, %cursor, "subscriber started");

    // Tailing
    loop {
        let Backfill { events, wake } = hub.catch_up(cursor).await?;
        if !events.is_empty() {
            for event in events {
                // Strictly increasing per connection
                if event.cursor <= cursor {
                    continue;
                }
                let next = event.cursor;
                let line = protocol::encode_line(&Frame::Change(event))?;
                write_buffered(&mut writer, &line, config.write_timeout).await?;
                cursor = next;
            }
            flush(&mut writer, config.write_timeout).await?;
        }

        let mut wake = wake;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = &mut wake => break,
                _ = idle(config.keepalive) => {
                    let line = protocol::encode_line(&Frame::Keepalive { cursor })?;
                    write_line(&mut writer, &line, config.write_timeout).await?;
                }
                line = lines.next() => match line.transpose()? {
                    // Nothing is expected once tailing; extra lines are ignored
                    Some(_) => {}
                    None => return Ok(()),
                },
            }
        }
    }
}

async fn idle(keepalive: Option<Duration>) {
    match keepalive {
        Some(interval) => tokio::time::sleep(interval).await,
        None => std::future::pending().await,
    }
}

async fn write_buffered<W: AsyncWrite + Unpin>(
    writer: &mut W,
    line: &str,
    deadline: Duration,
) -> Result<(), SessionError> {
    tokio::time::timeout(deadline, writer.write_all(line.as_bytes()))
        .await
        .map_err(|_| SessionError::WriteTimeout)??;
    Ok(())
}

async fn flush<W: AsyncWrite + Unpin>(
    writer: &mut W,
    deadline: Duration,
) -> Result<(), SessionError> {
    tokio::time::timeout(deadline, writer.flush())
        .await
        .map_err(|_| SessionError::WriteTimeout)??;
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    line: &str,
    deadline: Duration,
) -> Result<(), SessionError> {
    write_buffered(writer, line, deadline).await?;
    flush(writer, deadline).await
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
