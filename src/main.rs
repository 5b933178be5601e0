//! # mlflow-operator
//!
//! Entry point invoked by the host for every event.
//!
//! ## Flow
//!
//! 1. **Tracing** - logs go to stderr, filtered by `RUST_LOG` (default `info`)
//! 2. **CLI** - parse the subcommand
//! 3. **Dispatch** - load state, deliver deferred and new events, save state
//!
//! Reports are printed to stdout as one JSON object per line.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mlflow_operator::cli::Cli;
use mlflow_operator::commands::execute_command;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    debug!(command = ?cli.command, "Parsed command line");

    execute_command(cli.command).await
}

/// Initialize tracing subscriber.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
