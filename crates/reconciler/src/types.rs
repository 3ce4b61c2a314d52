//! Core types for the reconciler.

use serde::{Deserialize, Serialize};

use regsync_core::PipelineId;
use regsync_registry::PipelineConfig;

use crate::mapper::MappingWarning;

/// Actions the reconciler can take against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Create or update a pipeline.
    Apply {
        pipeline_id: PipelineId,
        config: Box<PipelineConfig>,
    },
    /// Delete a pipeline.
    Remove { pipeline_id: PipelineId },
}

impl ReconcileAction {
    /// Build an apply action.
    pub fn apply(pipeline_id: PipelineId, config: PipelineConfig) -> Self {
        Self::Apply {
            pipeline_id,
            config: Box::new(config),
        }
    }

    /// Build a remove action.
    pub const fn remove(pipeline_id: PipelineId) -> Self {
        Self::Remove { pipeline_id }
    }

    /// Get the pipeline ID this action targets.
    pub const fn pipeline_id(&self) -> &PipelineId {
        match self {
            Self::Apply { pipeline_id, .. } | Self::Remove { pipeline_id } => pipeline_id,
        }
    }

    /// Whether this is an apply action.
    pub const fn is_apply(&self) -> bool {
        matches!(self, Self::Apply { .. })
    }

    /// Whether this is a remove action.
    pub const fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }

    /// The mapped configuration, for apply actions.
    pub fn config(&self) -> Option<&PipelineConfig> {
        match self {
            Self::Apply { config, .. } => Some(config),
            Self::Remove { .. } => None,
        }
    }

    /// Get a description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::Apply {
                pipeline_id,
                config,
            } => {
                let state = if config.paused { "paused" } else { "active" };
                format!("apply pipeline {pipeline_id} ({state})")
            }
            Self::Remove { pipeline_id } => {
                format!("remove pipeline {pipeline_id}")
            }
        }
    }
}

/// A mapping warning tied to the pipeline it was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineWarning {
    pub pipeline_id: PipelineId,
    pub warning: MappingWarning,
}

/// Output of the diff engine for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Actions in emission order.
    pub actions: Vec<ReconcileAction>,
    /// Mapping warnings raised while building apply actions.
    pub warnings: Vec<PipelineWarning>,
}

impl Plan {
    /// Whether the plan would touch the registry at all.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of apply actions.
    pub fn apply_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_apply()).count()
    }

    /// Number of remove actions.
    pub fn remove_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_remove()).count()
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileResult {
    /// Actions that were taken.
    pub actions_taken: Vec<ReconcileAction>,
    /// Actions that failed.
    pub actions_failed: Vec<(ReconcileAction, String)>,
    /// Mapping warnings logged during the pass.
    pub mapping_warnings: usize,
    /// Data-integrity warnings logged for the incoming snapshot.
    pub integrity_warnings: usize,
    /// Whether the snapshot required no registry traffic.
    pub converged: bool,
}

impl ReconcileResult {
    /// Create a new reconcile result.
    pub fn new(
        actions_taken: Vec<ReconcileAction>,
        actions_failed: Vec<(ReconcileAction, String)>,
        mapping_warnings: usize,
        integrity_warnings: usize,
    ) -> Self {
        let converged = actions_taken.is_empty() && actions_failed.is_empty();
        Self {
            actions_taken,
            actions_failed,
            mapping_warnings,
            integrity_warnings,
            converged,
        }
    }

    /// Check if all actions succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.actions_failed.is_empty()
    }

    /// Total number of attempted actions.
    pub fn attempted(&self) -> usize {
        self.actions_taken.len() + self.actions_failed.len()
    }
}
