//! # regsync - pipeline registry reconciler
//!
//! ## Run
//!
//! 1. **Settings** - defaults, optional TOML file, environment overrides
//! 2. **Registry client** - HTTP client for `{registry}/syncs/{id}`
//! 3. **Config feed** - polls the configuration backend for snapshots
//! 4. **Reconciliation loop** - diffs and applies one snapshot at a time
//!
//! ## Shutdown
//!
//! Ctrl+C stops the feed and asks the loop to stop. The batch in flight is
//! finished and committed before the process exits.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;
mod feed;
mod settings;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use regsync_core::Snapshot;
use regsync_reconciler::{DiffEngine, Plan, ReconcilerBuilder, ReconcilerConfig, ReconciliationLoop};
use regsync_registry::RegistryClient;

use crate::cli::{Cli, Commands};
use crate::feed::ConfigFeed;
use crate::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run(config.as_deref()).await,
        Commands::Diff {
            current,
            previous,
            category,
            undelete,
        } => diff(
            &current,
            previous.as_deref(),
            ReconcilerConfig {
                syncable_category: category,
                undelete: undelete.into(),
            },
        ),
    }
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(config_path: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config_path)?;
    info!(
        registry = %settings.registry.base_url,
        backend = %settings.feed.backend_url,
        category = %settings.reconciler.syncable_category,
        max_in_flight = settings.loop_config.max_in_flight,
        "regsync starting"
    );

    let client = RegistryClient::with_config(settings.registry.clone())
        .context("Failed to create registry client")?;
    let reconciler = ReconcilerBuilder::new()
        .with_registry(client)
        .with_config(settings.reconciler.clone())
        .build()
        .context("Invalid reconciler settings")?;

    let feed = ConfigFeed::new(settings.feed.clone()).context("Failed to create config feed")?;
    let (tx, rx) = mpsc::unbounded_channel();
    let (feed_handle, feed_task) = feed.start(tx);

    let mut reconciliation_loop =
        ReconciliationLoop::new(Arc::new(reconciler), rx, settings.loop_config.clone());
    let stopper = reconciliation_loop.stopper();
    let loop_task = tokio::spawn(async move { reconciliation_loop.run().await });

    info!("regsync is running. Press Ctrl+C to stop.");
    wait_for_shutdown().await;

    feed_handle.stop();
    stopper.stop();

    if let Err(e) = feed_task.await {
        warn!(error = %e, "Config feed task ended abnormally");
    }
    let summary = loop_task
        .await
        .context("Reconciliation loop task ended abnormally")?;

    info!(
        snapshots = summary.snapshots_processed,
        applied = summary.actions_applied,
        failed = summary.actions_failed,
        "regsync stopped"
    );
    Ok(())
}

/// Print the actions for `previous -> current` as JSON on stdout.
fn diff(current: &Path, previous: Option<&Path>, config: ReconcilerConfig) -> Result<()> {
    let plan = plan_from_files(current, previous, config)?;
    let json = serde_json::to_string_pretty(&plan.actions).context("Failed to encode actions")?;
    println!("{json}");
    Ok(())
}

fn plan_from_files(current: &Path, previous: Option<&Path>, config: ReconcilerConfig) -> Result<Plan> {
    let current = Snapshot::from_file(current).context("Failed to load current snapshot")?;
    let previous = previous
        .map(Snapshot::from_file)
        .transpose()
        .context("Failed to load previous snapshot")?;

    for problem in current.integrity_warnings(&config.syncable_category) {
        warn!(problem = %problem, "Snapshot data-integrity warning");
    }

    let engine = DiffEngine::new(config);
    let plan = engine.plan(previous.as_ref(), &current);
    for warning in &plan.warnings {
        warn!(pipeline = %warning.pipeline_id, warning = %warning.warning, "Mapping warning");
    }
    Ok(plan)
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
