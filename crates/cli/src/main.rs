// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! walcast - operator CLI for the change feed

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cursor, tail};

#[derive(Parser)]
#[command(
    name = "walcast",
    version,
    about = "walcast - committed row changes from the WAL"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a daemon and print change lines
    Tail(tail::TailArgs),
    /// Convert between X/Y LSN notation and cursors
    Cursor(cursor::CursorArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tail(args) => tail::handle(args).await,
        Commands::Cursor(args) => {
            println!("{}", cursor::convert(&args.value)?);
            Ok(())
        }
    }
}
