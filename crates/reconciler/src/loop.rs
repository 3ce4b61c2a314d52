//! Reconciliation loop: consumes snapshots from the feed, one at a time.
//!
//! Snapshot N+1 is never looked at before snapshot N has been fully
//! reconciled and committed. A stop request lets the batch in flight finish
//! and then ends the loop before the next snapshot is taken.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use regsync_core::Snapshot;

use crate::reconciler::Reconciler;
use crate::store::SnapshotStore;

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Registry calls allowed in flight within one snapshot. 1 is sequential.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

const fn default_max_in_flight() -> usize {
    1
}

/// Handle for stopping a running loop.
#[derive(Debug, Clone)]
pub struct LoopStopper {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl LoopStopper {
    /// Ask the loop to stop after the batch in flight.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Counters accumulated over the life of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub snapshots_processed: usize,
    pub actions_applied: usize,
    pub actions_failed: usize,
}

/// Drives reconciliation from a snapshot feed.
pub struct ReconciliationLoop {
    reconciler: Arc<Reconciler>,
    feed: mpsc::UnboundedReceiver<Snapshot>,
    store: SnapshotStore,
    config: LoopConfig,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    summary: LoopSummary,
}

impl ReconciliationLoop {
    /// Create a loop reading from `feed`, starting with an empty store.
    pub fn new(
        reconciler: Arc<Reconciler>,
        feed: mpsc::UnboundedReceiver<Snapshot>,
        config: LoopConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            reconciler,
            feed,
            store: SnapshotStore::new(),
            config,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            summary: LoopSummary::default(),
        }
    }

    /// Get a handle that stops this loop.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: Arc::clone(&self.stop_tx),
        }
    }

    /// The snapshot store owned by this loop.
    pub const fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Counters so far.
    pub const fn summary(&self) -> LoopSummary {
        self.summary
    }

    /// Run until the feed closes or a stop is requested.
    pub async fn run(&mut self) -> LoopSummary {
        info!(max_in_flight = self.config.max_in_flight, "Reconciliation loop started");

        loop {
            if *self.stop_rx.borrow() {
                info!("Stop requested, leaving reconciliation loop");
                break;
            }

            let next = tokio::select! {
                biased;
                _ = self.stop_rx.changed() => continue,
                snapshot = self.feed.recv() => snapshot,
            };

            let Some(snapshot) = next else {
                info!("Snapshot feed closed, leaving reconciliation loop");
                break;
            };

            self.process(snapshot).await;
        }

        info!(
            snapshots = self.summary.snapshots_processed,
            applied = self.summary.actions_applied,
            failed = self.summary.actions_failed,
            "Reconciliation loop stopped"
        );
        self.summary
    }

    async fn process(&mut self, snapshot: Snapshot) {
        debug!(sources = snapshot.sources.len(), "Received snapshot");

        let result = self
            .reconciler
            .reconcile(&mut self.store, snapshot, self.config.max_in_flight)
            .await;

        self.summary.snapshots_processed += 1;
        self.summary.actions_applied += result.actions_taken.len();
        self.summary.actions_failed += result.actions_failed.len();
    }
}
