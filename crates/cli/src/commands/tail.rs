// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `walcast tail` - Subscribe and print change lines

use anyhow::{bail, Context};
use clap::Args;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use walcast_core::Frame;

use super::cursor::parse_position;

#[derive(Args)]
pub struct TailArgs {
    /// Daemon address
    #[arg(long, env = "WALCAST_ADDR", default_value = "127.0.0.1:8989")]
    pub addr: String,

    /// Resume after this cursor or `X/Y` LSN
    #[arg(long)]
    pub from: Option<String>,

    /// Also print keepalive lines
    #[arg(long)]
    pub keepalives: bool,
}

/// Build the line that opens a subscription
pub fn start_line(from: Option<&str>) -> anyhow::Result<String> {
    match from {
        None => Ok("start\n".to_string()),
        Some(value) => Ok(format!("start {}\n", parse_position(value)?.cursor())),
    }
}

/// What to print for one server line, if anything
pub fn render(line: &str, keepalives: bool) -> anyhow::Result<Option<String>> {
    if line.starts_with("error:") {
        bail!("daemon rejected subscription: {}", line);
    }
    let frame = Frame::decode(line).with_context(|| format!("unexpected line: {}", line))?;
    match frame {
        Frame::Change(_) => Ok(Some(line.to_string())),
        Frame::Keepalive { .. } if keepalives => Ok(Some(line.to_string())),
        Frame::Keepalive { .. } => Ok(None),
    }
}

pub async fn handle(args: TailArgs) -> anyhow::Result<()> {
    let start = start_line(args.from.as_deref())?;
    let stream = TcpStream::connect(&args.addr)
        .await
        .with_context(|| format!("cannot connect to {}", args.addr))?;
    let (reader, mut writer) = stream.into_split();
    writer.write_all(start.as_bytes()).await?;

    let mut lines = BufReader::new(reader).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        if let Some(out) = render(&line, args.keepalives)? {
            stdout.write_all(out.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
