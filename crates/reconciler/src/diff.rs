//! Diff engine: previous snapshot + current snapshot -> ordered actions.
//!
//! Two passes, in this order:
//!
//! 1. **Orphan removal** (only when a previous snapshot exists): pipelines of
//!    eligible sources or destinations that vanished from `current` are removed.
//! 2. **Transitions** over every eligible source of `current`: new pairs are
//!    applied or removed by their deletion flags, existing pairs are compared
//!    flag by flag and payload by payload.
//!
//! Stable pairs produce no action.

use std::collections::HashMap;

use itertools::Itertools;

use regsync_core::{Destination, Snapshot, Source};

use crate::mapper::map_config;
use crate::reconciler::{ReconcilerConfig, UndeletePolicy};
use crate::types::{PipelineWarning, Plan, ReconcileAction};

/// Computes reconciliation plans from snapshot pairs.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    config: ReconcilerConfig,
}

impl DiffEngine {
    /// Create a diff engine.
    pub const fn new(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Compute the actions that bring the registry from `previous` to `current`.
    ///
    /// `previous` is `None` until a snapshot has been applied; in that case
    /// every eligible pair is decided by its deletion flags alone.
    pub fn plan(&self, previous: Option<&Snapshot>, current: &Snapshot) -> Plan {
        let mut builder = PlanBuilder::default();
        let current_index = self.eligible_index(current);

        if let Some(previous) = previous {
            self.remove_orphans(previous, &current_index, &mut builder);
        }

        let previous_index = previous.map(|p| self.eligible_index(p)).unwrap_or_default();

        for source in self.eligible_sources(current) {
            match previous_index.get(source.id.as_str()) {
                None => {
                    for destination in unique_destinations(source) {
                        builder.new_pair(source, destination);
                    }
                }
                Some(prev_source) => self.transition_source(prev_source, source, &mut builder),
            }
        }

        builder.finish()
    }

    fn remove_orphans(
        &self,
        previous: &Snapshot,
        current_index: &HashMap<&str, &Source>,
        builder: &mut PlanBuilder,
    ) {
        for prev_source in self.eligible_sources(previous) {
            let current_source = current_index.get(prev_source.id.as_str());
            for prev_destination in unique_destinations(prev_source) {
                let still_present = current_source
                    .is_some_and(|source| source.destination(&prev_destination.id).is_some());
                if !still_present {
                    builder.remove(prev_source, prev_destination);
                }
            }
        }
    }

    fn transition_source(&self, prev_source: &Source, source: &Source, builder: &mut PlanBuilder) {
        if source.deleted != prev_source.deleted {
            let reapply = !source.deleted && self.config.undelete == UndeletePolicy::Reapply;
            for destination in unique_destinations(source) {
                if reapply {
                    builder.new_pair(source, destination);
                } else {
                    builder.remove(source, destination);
                }
            }
            return;
        }

        for destination in unique_destinations(source) {
            match prev_source.destination(&destination.id) {
                None => builder.new_pair(source, destination),
                Some(prev_destination) => self.transition_destination(
                    prev_source,
                    source,
                    prev_destination,
                    destination,
                    builder,
                ),
            }
        }
    }

    fn transition_destination(
        &self,
        prev_source: &Source,
        source: &Source,
        prev: &Destination,
        current: &Destination,
        builder: &mut PlanBuilder,
    ) {
        if current.deleted != prev.deleted {
            if !current.deleted && self.config.undelete == UndeletePolicy::Reapply {
                builder.new_pair(source, current);
            } else {
                builder.remove(source, current);
            }
            return;
        }

        let connection_disabled = prev.is_connection_enabled && !current.is_connection_enabled;
        if connection_disabled {
            builder.remove(source, current);
            return;
        }

        let connection_enabled = !prev.is_connection_enabled && current.is_connection_enabled;
        let changed = current.is_processor_enabled != prev.is_processor_enabled
            || connection_enabled
            || current.config != prev.config
            || source.config != prev_source.config;
        if changed {
            builder.apply(source, current);
        }
    }

    /// Eligible sources in snapshot order; repeated ids after the first are skipped.
    fn eligible_sources<'a>(&'a self, snapshot: &'a Snapshot) -> impl Iterator<Item = &'a Source> {
        snapshot
            .sources_in_category(&self.config.syncable_category)
            .unique_by(|s| s.id.clone())
    }

    fn eligible_index<'a>(&'a self, snapshot: &'a Snapshot) -> HashMap<&'a str, &'a Source> {
        self.eligible_sources(snapshot)
            .map(|s| (s.id.as_str(), s))
            .collect()
    }
}

fn unique_destinations(source: &Source) -> impl Iterator<Item = &Destination> {
    source.destinations.iter().unique_by(|d| d.id.clone())
}

#[derive(Default)]
struct PlanBuilder {
    plan: Plan,
}

impl PlanBuilder {
    /// A pair with no history: remove when either side is deleted, otherwise apply.
    fn new_pair(&mut self, source: &Source, destination: &Destination) {
        if source.deleted || destination.deleted {
            self.remove(source, destination);
        } else {
            self.apply(source, destination);
        }
    }

    fn apply(&mut self, source: &Source, destination: &Destination) {
        let pipeline_id = source.pipeline_id(destination);
        let mapped = map_config(source, destination);
        self.plan
            .warnings
            .extend(mapped.warnings.into_iter().map(|warning| PipelineWarning {
                pipeline_id: pipeline_id.clone(),
                warning,
            }));
        self.plan
            .actions
            .push(ReconcileAction::apply(pipeline_id, mapped.config));
    }

    fn remove(&mut self, source: &Source, destination: &Destination) {
        self.plan
            .actions
            .push(ReconcileAction::remove(source.pipeline_id(destination)));
    }

    fn finish(self) -> Plan {
        self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsync_core::{PipelineId, config_map_from_json};
    use serde_json::json;

    fn engine() -> DiffEngine {
        DiffEngine::default()
    }

    fn reapply_engine() -> DiffEngine {
        DiffEngine::new(ReconcilerConfig {
            undelete: UndeletePolicy::Reapply,
            ..Default::default()
        })
    }

    fn cloud(id: &str) -> Source {
        Source::new(id, "hubspot", "cloud")
    }

    fn dest(id: &str) -> Destination {
        Destination::new(id, "POSTGRES")
    }

    fn snapshot(sources: Vec<Source>) -> Snapshot {
        Snapshot::new(sources)
    }

    fn summary(plan: &Plan) -> Vec<(String, &'static str)> {
        plan.actions
            .iter()
            .map(|a| {
                let kind = if a.is_apply() { "apply" } else { "remove" };
                (a.pipeline_id().to_string(), kind)
            })
            .collect()
    }

    fn pair(id: &str, kind: &'static str) -> (String, &'static str) {
        (id.to_string(), kind)
    }

    #[test]
    fn test_first_snapshot_applies_live_pairs_and_removes_deleted() {
        let current = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2").with_deleted(true)),
            cloud("S2").with_deleted(true).with_destination(dest("D3")),
        ]);

        let plan = engine().plan(None, &current);

        assert_eq!(
            summary(&plan),
            vec![
                pair("S1_D1", "apply"),
                pair("S1_D2", "remove"),
                pair("S2_D3", "remove"),
            ]
        );
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        let s = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2").with_connection_enabled(false)),
        ]);
        assert!(engine().plan(Some(&s), &s).is_empty());
    }

    #[test]
    fn test_ineligible_sources_are_ignored() {
        let previous = snapshot(vec![
            Source::new("W1", "warehouse", "warehouse").with_destination(dest("D1")),
        ]);
        let current = snapshot(vec![
            Source::new("W1", "warehouse", "warehouse")
                .with_deleted(true)
                .with_destination(dest("D1").with_processor_enabled(false))
                .with_destination(dest("D2")),
        ]);

        assert!(engine().plan(None, &current).is_empty());
        assert!(engine().plan(Some(&previous), &current).is_empty());
        assert!(engine().plan(Some(&current), &snapshot(Vec::new())).is_empty());
    }

    #[test]
    fn test_vanished_source_removes_all_its_pipelines() {
        let previous = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2")),
            cloud("S2").with_destination(dest("D3")),
        ]);
        let current = snapshot(vec![cloud("S2").with_destination(dest("D3"))]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(
            summary(&plan),
            vec![pair("S1_D1", "remove"), pair("S1_D2", "remove")]
        );
    }

    #[test]
    fn test_vanished_destination_is_removed() {
        let previous = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2")),
        ]);
        let current = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(summary(&plan), vec![pair("S1_D2", "remove")]);
    }

    #[test]
    fn test_source_leaving_category_is_removed() {
        let previous = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);
        let current = snapshot(vec![
            Source::new("S1", "hubspot", "warehouse").with_destination(dest("D1")),
        ]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(summary(&plan), vec![pair("S1_D1", "remove")]);
    }

    #[test]
    fn test_new_source_in_later_snapshot() {
        let previous = snapshot(Vec::new());
        let current = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2").with_deleted(true)),
        ]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(
            summary(&plan),
            vec![pair("S1_D1", "apply"), pair("S1_D2", "remove")]
        );
    }

    #[test]
    fn test_new_destination_on_existing_source() {
        let previous = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);
        let current = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2")),
        ]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(summary(&plan), vec![pair("S1_D2", "apply")]);
    }

    #[test]
    fn test_source_becoming_deleted_removes_all_destinations() {
        let previous = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2")),
        ]);
        let current = snapshot(vec![
            cloud("S1")
                .with_deleted(true)
                .with_destination(dest("D1"))
                .with_destination(dest("D2").with_processor_enabled(false)),
        ]);

        for engine in [engine(), reapply_engine()] {
            let plan = engine.plan(Some(&previous), &current);
            assert_eq!(
                summary(&plan),
                vec![pair("S1_D1", "remove"), pair("S1_D2", "remove")]
            );
        }
    }

    #[test]
    fn test_source_undelete_under_remove_policy_removes() {
        let previous = snapshot(vec![
            cloud("S1").with_deleted(true).with_destination(dest("D1")),
        ]);
        let current = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(summary(&plan), vec![pair("S1_D1", "remove")]);
    }

    #[test]
    fn test_source_undelete_under_reapply_policy_applies() {
        let previous = snapshot(vec![
            cloud("S1").with_deleted(true).with_destination(dest("D1")),
        ]);
        let current = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D2").with_deleted(true)),
        ]);

        let plan = reapply_engine().plan(Some(&previous), &current);

        assert_eq!(
            summary(&plan),
            vec![pair("S1_D1", "apply"), pair("S1_D2", "remove")]
        );
    }

    #[test]
    fn test_destination_becoming_deleted_removes() {
        let previous = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);
        let current = snapshot(vec![
            cloud("S1").with_destination(dest("D1").with_deleted(true)),
        ]);

        for engine in [engine(), reapply_engine()] {
            let plan = engine.plan(Some(&previous), &current);
            assert_eq!(summary(&plan), vec![pair("S1_D1", "remove")]);
        }
    }

    #[test]
    fn test_destination_undelete_depends_on_policy() {
        let previous = snapshot(vec![
            cloud("S1").with_destination(dest("D1").with_deleted(true)),
        ]);
        let current = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);

        let plan = engine().plan(Some(&previous), &current);
        assert_eq!(summary(&plan), vec![pair("S1_D1", "remove")]);

        let plan = reapply_engine().plan(Some(&previous), &current);
        assert_eq!(summary(&plan), vec![pair("S1_D1", "apply")]);
    }

    #[test]
    fn test_connection_disable_removes_and_enable_applies() {
        let enabled = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);
        let disabled = snapshot(vec![
            cloud("S1").with_destination(dest("D1").with_connection_enabled(false)),
        ]);

        let plan = engine().plan(Some(&enabled), &disabled);
        assert_eq!(summary(&plan), vec![pair("S1_D1", "remove")]);

        let plan = engine().plan(Some(&disabled), &enabled);
        assert_eq!(summary(&plan), vec![pair("S1_D1", "apply")]);
    }

    #[test]
    fn test_processor_toggle_applies_with_paused_flag() {
        let previous = snapshot(vec![cloud("S1").with_destination(dest("D1"))]);
        let current = snapshot(vec![
            cloud("S1").with_destination(dest("D1").with_processor_enabled(false)),
        ]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(summary(&plan), vec![pair("S1_D1", "apply")]);
        assert_eq!(plan.actions.first().and_then(|a| a.config()).map(|c| c.paused), Some(true));

        let plan = engine().plan(Some(&current), &previous);
        assert_eq!(plan.actions.first().and_then(|a| a.config()).map(|c| c.paused), Some(false));
    }

    #[test]
    fn test_destination_config_change_touches_only_that_pipeline() {
        let previous = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1").with_config(config_map_from_json(json!({"host": "a"}))))
                .with_destination(dest("D2")),
        ]);
        let current = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1").with_config(config_map_from_json(json!({"host": "b"}))))
                .with_destination(dest("D2")),
        ]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(summary(&plan), vec![pair("S1_D1", "apply")]);
    }

    #[test]
    fn test_source_config_change_applies_every_destination() {
        let previous = snapshot(vec![
            cloud("S1")
                .with_config(config_map_from_json(json!({"resources": ["a"]})))
                .with_destination(dest("D1"))
                .with_destination(dest("D2")),
        ]);
        let current = snapshot(vec![
            cloud("S1")
                .with_config(config_map_from_json(json!({"resources": ["a", "b"]})))
                .with_destination(dest("D1"))
                .with_destination(dest("D2")),
        ]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(
            summary(&plan),
            vec![pair("S1_D1", "apply"), pair("S1_D2", "apply")]
        );
    }

    #[test]
    fn test_reordered_payload_keys_are_not_a_change() -> Result<(), serde_json::Error> {
        let previous = Snapshot::new(vec![cloud("S1").with_destination(
            dest("D1").with_config(serde_json::from_str(r#"{"a":1,"b":{"x":"y","z":[1]}}"#)?),
        )]);
        let current = Snapshot::new(vec![cloud("S1").with_destination(
            dest("D1").with_config(serde_json::from_str(r#"{"b":{"z":[1],"x":"y"},"a":1}"#)?),
        )]);

        assert!(engine().plan(Some(&previous), &current).is_empty());
        Ok(())
    }

    #[test]
    fn test_orphans_precede_transitions() {
        let previous = snapshot(vec![
            cloud("S1").with_destination(dest("D1")),
            cloud("S2").with_destination(dest("D2")),
        ]);
        let current = snapshot(vec![
            cloud("S2").with_destination(dest("D2").with_processor_enabled(false)),
        ]);

        let plan = engine().plan(Some(&previous), &current);

        assert_eq!(
            summary(&plan),
            vec![pair("S1_D1", "remove"), pair("S2_D2", "apply")]
        );
    }

    #[test]
    fn test_duplicate_ids_use_first_occurrence() {
        let current = snapshot(vec![
            cloud("S1")
                .with_destination(dest("D1"))
                .with_destination(dest("D1").with_deleted(true)),
            cloud("S1").with_deleted(true).with_destination(dest("D9")),
        ]);

        let plan = engine().plan(None, &current);

        assert_eq!(summary(&plan), vec![pair("S1_D1", "apply")]);
    }

    #[test]
    fn test_mapping_warnings_are_attached_to_pipeline() {
        let current = snapshot(vec![cloud("S1").with_destination(
            Destination::new("D1", "POSTGRES")
                .with_config(config_map_from_json(json!({"port": "abc"}))),
        )]);

        let plan = engine().plan(None, &current);

        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(
            plan.warnings.first().map(|w| &w.pipeline_id),
            Some(&PipelineId::new("S1", "D1"))
        );
    }

    #[test]
    fn test_custom_category() {
        let engine = DiffEngine::new(ReconcilerConfig {
            syncable_category: "warehouse".to_string(),
            ..Default::default()
        });
        let current = snapshot(vec![
            Source::new("W1", "bq", "warehouse").with_destination(dest("D1")),
            cloud("S1").with_destination(dest("D2")),
        ]);

        let plan = engine.plan(None, &current);

        assert_eq!(summary(&plan), vec![pair("W1_D1", "apply")]);
    }
}
