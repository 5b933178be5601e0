//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default location of the persisted operator state.
pub const DEFAULT_STATE_PATH: &str = "mlflow-operator.state.json";

/// MLflow operator
#[derive(Parser, Debug)]
#[command(name = "mlflow-operator")]
#[command(version)]
#[command(about = "Keeps an MLflow tracking server in line with its configuration and relations")]
#[command(
    long_about = "Handles host events for an MLflow tracking server running under Pebble: builds the desired service definition from config and relation data, applies it, and reports the unit status."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver events to the operator
    Dispatch(DispatchArgs),

    /// Print the Pebble layer the current config and relations call for
    Render {
        /// Operator config file (TOML, JSON or YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Persisted operator state
        #[arg(short, long, default_value = DEFAULT_STATE_PATH)]
        state: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Event as JSON, e.g. '{"kind":"config-changed"}' (repeatable)
    #[arg(short, long = "event")]
    pub events: Vec<String>,

    /// File with one JSON event per line (`-` for stdin)
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Operator config file (TOML, JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Persisted operator state
    #[arg(short, long, default_value = DEFAULT_STATE_PATH)]
    pub state: PathBuf,

    /// Pebble API base URL (overrides PEBBLE_URL)
    #[arg(long)]
    pub pebble_url: Option<String>,

    /// Application name published in ingress requests
    #[arg(long, default_value = mlflow_charm::operator::DEFAULT_APP_NAME)]
    pub app_name: String,

    /// This unit is not the leader
    #[arg(long, default_value_t = false)]
    pub not_leader: bool,

    /// Use an in-memory supervisor and leave the state file untouched
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
