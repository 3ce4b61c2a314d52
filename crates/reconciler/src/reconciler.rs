//! Reconciler implementation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use regsync_core::Snapshot;
use regsync_registry::RegistryClient;

use crate::diff::DiffEngine;
use crate::error::{Error, Result};
use crate::store::SnapshotStore;
use crate::types::{Plan, ReconcileAction, ReconcileResult};

/// Category tag of sources that are synced to the registry.
pub const DEFAULT_SYNCABLE_CATEGORY: &str = "cloud";

/// How a `deleted` flag flipping back to `false` is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndeletePolicy {
    /// Any change of the flag removes the pipeline, including un-deleting.
    #[default]
    Remove,
    /// Un-deleting treats the pair as new: applied unless still deleted.
    Reapply,
}

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Only sources with this category are reconciled.
    #[serde(default = "default_syncable_category")]
    pub syncable_category: String,
    /// Handling of un-deleted sources and destinations.
    #[serde(default)]
    pub undelete: UndeletePolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            syncable_category: default_syncable_category(),
            undelete: UndeletePolicy::default(),
        }
    }
}

fn default_syncable_category() -> String {
    DEFAULT_SYNCABLE_CATEGORY.to_string()
}

/// Trait for executing reconcile actions.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute an action.
    async fn execute(&self, action: &ReconcileAction) -> Result<()>;
}

/// Executor that sends actions to the pipeline registry.
pub struct RegistryExecutor {
    client: RegistryClient,
}

impl RegistryExecutor {
    /// Create a new registry executor.
    pub const fn new(client: RegistryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionExecutor for RegistryExecutor {
    async fn execute(&self, action: &ReconcileAction) -> Result<()> {
        let result = match action {
            ReconcileAction::Apply {
                pipeline_id,
                config,
            } => self.client.apply(pipeline_id, config).await,
            ReconcileAction::Remove { pipeline_id } => self.client.remove(pipeline_id).await,
        };
        result.map_err(|e| Error::action_failed(action.description(), e.to_string()))
    }
}

/// Reconciler: plans a snapshot against the store and executes the plan.
pub struct Reconciler {
    /// Diff engine.
    engine: DiffEngine,
    /// Action executor.
    executor: Arc<dyn ActionExecutor>,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(executor: Arc<dyn ActionExecutor>, config: ReconcilerConfig) -> Self {
        Self {
            engine: DiffEngine::new(config),
            executor,
        }
    }

    /// Create a reconciler that talks to the registry.
    pub fn with_registry(client: RegistryClient, config: ReconcilerConfig) -> Self {
        Self::new(Arc::new(RegistryExecutor::new(client)), config)
    }

    /// Plan `current` against the last applied snapshot, logging warnings.
    pub fn plan(&self, store: &SnapshotStore, current: &Snapshot) -> Plan {
        let plan = self.engine.plan(store.previous(), current);

        for warning in &plan.warnings {
            warn!(
                pipeline_id = %warning.pipeline_id,
                warning = %warning.warning,
                "Pipeline config mapped with fallback"
            );
        }

        plan
    }

    /// Reconcile one snapshot: plan, execute every action, then commit.
    ///
    /// Failed actions are logged and collected but never stop the pass. The
    /// snapshot is committed only after every action was attempted.
    /// `max_in_flight` above 1 runs that many registry calls concurrently.
    pub async fn reconcile(
        &self,
        store: &mut SnapshotStore,
        current: Snapshot,
        max_in_flight: usize,
    ) -> ReconcileResult {
        let integrity = current.integrity_warnings(&self.engine.config().syncable_category);
        for problem in &integrity {
            warn!(problem = %problem, "Snapshot data-integrity warning");
        }

        let plan = self.plan(store, &current);

        info!(
            first = !store.has_ever_been_set(),
            sources = current.sources.len(),
            apply = plan.apply_count(),
            remove = plan.remove_count(),
            "Starting reconciliation"
        );

        let warnings = plan.warnings.len();
        let (taken, failed) = self.apply_actions(plan.actions, max_in_flight).await;

        store.commit(current);

        let result = ReconcileResult::new(taken, failed, warnings, integrity.len());

        if result.converged {
            info!("Registry already in sync");
        } else {
            info!(
                actions_taken = result.actions_taken.len(),
                actions_failed = result.actions_failed.len(),
                "Reconciliation complete"
            );
        }

        result
    }

    /// Apply a list of actions.
    async fn apply_actions(
        &self,
        actions: Vec<ReconcileAction>,
        max_in_flight: usize,
    ) -> (Vec<ReconcileAction>, Vec<(ReconcileAction, String)>) {
        let outcomes: Vec<_> = stream::iter(actions)
            .map(|action| async move {
                debug!(action = %action.description(), "Applying action");
                let outcome = self.executor.execute(&action).await;
                (action, outcome)
            })
            .buffered(max_in_flight.max(1))
            .collect()
            .await;

        let mut taken = Vec::new();
        let mut failed = Vec::new();

        for (action, outcome) in outcomes {
            match outcome {
                Ok(()) => taken.push(action),
                Err(e) => {
                    warn!(action = %action.description(), error = %e, "Action failed");
                    failed.push((action, e.to_string()));
                }
            }
        }

        (taken, failed)
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        self.engine.config()
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    executor: Option<Arc<dyn ActionExecutor>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            executor: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Send actions to the given registry client.
    #[must_use]
    pub fn with_registry(mut self, client: RegistryClient) -> Self {
        self.executor = Some(Arc::new(RegistryExecutor::new(client)));
        self
    }

    /// Set a custom action executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the syncable source category.
    #[must_use]
    pub fn syncable_category(mut self, category: impl Into<String>) -> Self {
        self.config.syncable_category = category.into();
        self
    }

    /// Set the un-delete policy.
    #[must_use]
    pub const fn undelete_policy(mut self, policy: UndeletePolicy) -> Self {
        self.config.undelete = policy;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if no executor or registry was set, or the
    /// syncable category is empty.
    pub fn build(self) -> Result<Reconciler> {
        let executor = self
            .executor
            .ok_or_else(|| Error::invalid_config("an executor or registry client is required"))?;

        if self.config.syncable_category.is_empty() {
            return Err(Error::invalid_config("syncable category must not be empty"));
        }

        Ok(Reconciler::new(executor, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
