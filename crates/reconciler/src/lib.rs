//! Reconciliation of the external pipeline registry against configuration snapshots.
//!
//! This crate keeps the registry in step with a feed of full configuration
//! snapshots:
//!
//! - **Snapshot Store**: the one snapshot last applied to the registry
//! - **Diff Engine**: previous vs current snapshot -> ordered actions
//! - **Schema Mapper**: (source, destination) -> registry pipeline config
//! - **Reconciler**: executes a plan and commits the snapshot
//! - **Reconciliation Loop**: pulls snapshots from the feed, one at a time
//!
//! # Key Concepts
//!
//! ## Pipelines
//!
//! A pipeline is one source paired with one of its destinations, identified
//! by `sourceId_destinationId`. Only sources in the syncable category take
//! part.
//!
//! ## Actions
//!
//! - `Apply` - create or update a pipeline (`PUT`)
//! - `Remove` - delete a pipeline (`DELETE`)
//!
//! Pairs that did not change produce no action.
//!
//! # Example
//!
//! ```ignore
//! use regsync_reconciler::{LoopConfig, Reconciler, ReconcilerConfig, ReconciliationLoop};
//! use regsync_registry::RegistryClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RegistryClient::new()?;
//!     let reconciler = Arc::new(Reconciler::with_registry(client, ReconcilerConfig::default()));
//!
//!     let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//!     let mut loop_runner = ReconciliationLoop::new(reconciler, rx, LoopConfig::default());
//!
//!     // Feed snapshots through `tx`; runs until the feed closes or is stopped.
//!     loop_runner.run().await;
//!     Ok(())
//! }
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod diff;
pub mod error;
pub mod r#loop;
pub mod mapper;
pub mod reconciler;
pub mod store;
pub mod types;

// Re-export main types
pub use diff::DiffEngine;
pub use error::{Error, Result};
pub use mapper::{MappedPipeline, MappingWarning, map_config, sink_role};
pub use r#loop::{LoopConfig, LoopStopper, LoopSummary, ReconciliationLoop};
pub use reconciler::{
    ActionExecutor, DEFAULT_SYNCABLE_CATEGORY, Reconciler, ReconcilerBuilder, ReconcilerConfig,
    RegistryExecutor, UndeletePolicy,
};
pub use store::SnapshotStore;
pub use types::{PipelineWarning, Plan, ReconcileAction, ReconcileResult};
