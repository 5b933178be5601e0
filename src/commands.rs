//! CLI command handlers.
//!
//! All commands follow the same pattern:
//! - Zero unwraps, zero panics
//! - Errors carry context for the operator log
//! - Reports go to stdout as JSON lines, logs go to stderr

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use url::Url;

use mlflow_charm::{
    BucketProvisioner, Dispatcher, EventReport, HookContext, InMemoryBuckets, Operator,
    OperatorEvent, S3BucketProvisioner, StateStore, WorkloadContext,
};
use mlflow_core::OperatorConfig;
use mlflow_pebble::{PebbleClient, PebbleConfig};
use mlflow_reconciler::{InMemorySupervisor, Layer, ReconcilerBuilder, ReconcilerConfig, Supervisor};

use crate::cli::{Commands, DispatchArgs};

/// Execute a CLI command.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Dispatch(args) => {
            let reports = cmd_dispatch(&args).await?;
            print_reports(&reports)
        }
        Commands::Render { config, state } => {
            let yaml = cmd_render(config.as_deref(), &state)?;
            print!("{yaml}");
            Ok(())
        }
    }
}

/// Deliver the requested events and persist the resulting state.
///
/// With no events given, only previously deferred events are re-delivered.
pub async fn cmd_dispatch(args: &DispatchArgs) -> Result<Vec<EventReport>> {
    let config = load_config(args.config.as_deref())?;
    let events = read_events(args)?;
    let store = StateStore::new(&args.state);
    let state = store
        .load()
        .with_context(|| format!("Failed to load state from {}", args.state.display()))?;

    let reconciler = ReconcilerBuilder::new()
        .with_supervisor(build_supervisor(args)?)
        .build()
        .context("Failed to build reconciler")?;
    let operator = Operator::new(reconciler, state)
        .with_app_name(args.app_name.as_str())
        .with_bucket_provisioner(build_bucket_provisioner(args));
    let mut dispatcher = Dispatcher::new(operator);
    let hook = HookContext::new(config, !args.not_leader);

    info!(events = events.len(), dry_run = args.dry_run, "Dispatching");

    let mut reports = Vec::new();
    if events.is_empty() {
        reports.extend(dispatcher.redeliver(&hook).await);
    }
    for event in events {
        reports.extend(dispatcher.dispatch(event, &hook).await);
    }

    if args.dry_run {
        info!("Dry run, state not saved");
    } else {
        store
            .save(dispatcher.state())
            .with_context(|| format!("Failed to save state to {}", args.state.display()))?;
    }

    Ok(reports)
}

/// Render the layer the current config and stored relations call for.
pub fn cmd_render(config: Option<&Path>, state: &Path) -> Result<String> {
    let config = load_config(config)?;
    let state = StateStore::new(state)
        .load()
        .with_context(|| format!("Failed to load state from {}", state.display()))?;

    let spec = WorkloadContext::new(&config, &state.relations).service_spec();
    let layout = ReconcilerConfig::default();
    let layer = Layer::single(
        layout.layer_summary,
        layout.layer_description,
        layout.service_name,
        &spec,
    );

    layer.to_yaml().context("Failed to encode layer")
}

fn load_config(path: Option<&Path>) -> Result<OperatorConfig> {
    let config = match path {
        Some(path) => OperatorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => OperatorConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn read_events(args: &DispatchArgs) -> Result<Vec<OperatorEvent>> {
    let mut lines = args.events.clone();

    match args.events_file.as_deref() {
        Some(path) if path == Path::new("-") => {
            for line in std::io::stdin().lock().lines() {
                lines.push(line.context("Failed to read events from stdin")?);
            }
        }
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read events from {}", path.display()))?;
            lines.extend(content.lines().map(ToString::to_string));
        }
        None => {}
    }

    lines
        .iter()
        .map(|line| line.as_str().trim())
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).with_context(|| format!("Invalid event: {line}"))
        })
        .collect()
}

fn build_supervisor(args: &DispatchArgs) -> Result<Arc<dyn Supervisor>> {
    if args.dry_run {
        return Ok(Arc::new(InMemorySupervisor::new()));
    }

    let mut config = PebbleConfig::from_env().context("Invalid Pebble configuration")?;
    if let Some(url) = &args.pebble_url {
        config.base_url =
            Url::parse(url).with_context(|| format!("Invalid Pebble URL: {url}"))?;
    }

    let client = PebbleClient::with_config(config).context("Failed to create Pebble client")?;
    Ok(Arc::new(client))
}

fn build_bucket_provisioner(args: &DispatchArgs) -> Arc<dyn BucketProvisioner> {
    if args.dry_run {
        Arc::new(InMemoryBuckets::new())
    } else {
        Arc::new(S3BucketProvisioner::new())
    }
}

fn print_reports(reports: &[EventReport]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for report in reports {
        let line = serde_json::to_string(report).context("Failed to encode report")?;
        writeln!(out, "{line}").context("Failed to write report")?;
    }
    Ok(())
}
