//! Property tests for the diff engine.

use proptest::prelude::*;
use regsync_core::{Destination, PipelineId, Snapshot, Source};
use regsync_reconciler::{DiffEngine, ReconcileAction, ReconcilerConfig, UndeletePolicy};

fn destination_strategy() -> impl Strategy<Value = Destination> {
    (0..4_u8, any::<bool>(), any::<bool>(), any::<bool>(), 0..3_u8).prop_map(
        |(id, deleted, connected, processing, host)| {
            Destination::new(format!("D{id}"), "POSTGRES")
                .with_deleted(deleted)
                .with_connection_enabled(connected)
                .with_processor_enabled(processing)
                .with_config(
                    [("host".to_string(), format!("h{host}").into())]
                        .into_iter()
                        .collect(),
                )
        },
    )
}

fn source_strategy() -> impl Strategy<Value = Source> {
    (
        0..4_u8,
        prop_oneof![Just("cloud"), Just("warehouse")],
        any::<bool>(),
        prop::collection::vec(destination_strategy(), 0..4),
    )
        .prop_map(|(id, category, deleted, destinations)| {
            destinations.into_iter().fold(
                Source::new(format!("S{id}"), "hubspot", category).with_deleted(deleted),
                Source::with_destination,
            )
        })
}

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec(source_strategy(), 0..5).prop_map(Snapshot::new)
}

fn policy_strategy() -> impl Strategy<Value = UndeletePolicy> {
    prop_oneof![Just(UndeletePolicy::Remove), Just(UndeletePolicy::Reapply)]
}

fn engine(undelete: UndeletePolicy) -> DiffEngine {
    DiffEngine::new(ReconcilerConfig {
        undelete,
        ..ReconcilerConfig::default()
    })
}

/// Eligible pipelines, first occurrence of every id, in snapshot order.
fn eligible_pairs(snapshot: &Snapshot) -> Vec<(PipelineId, bool)> {
    let mut seen_sources = Vec::new();
    let mut pairs = Vec::new();
    for source in snapshot.sources.iter().filter(|s| s.category() == "cloud") {
        if seen_sources.contains(&source.id) {
            continue;
        }
        seen_sources.push(source.id.clone());

        let mut seen_destinations = Vec::new();
        for destination in &source.destinations {
            if seen_destinations.contains(&destination.id) {
                continue;
            }
            seen_destinations.push(destination.id.clone());
            let live = !source.deleted && !destination.deleted;
            pairs.push((source.pipeline_id(destination), live));
        }
    }
    pairs
}

proptest! {
    #[test]
    fn unchanged_snapshot_plans_nothing(snapshot in snapshot_strategy(), policy in policy_strategy()) {
        let plan = engine(policy).plan(Some(&snapshot), &snapshot);
        prop_assert!(plan.is_empty(), "unexpected actions: {:?}", plan.actions);
    }

    #[test]
    fn first_snapshot_touches_every_eligible_pair_once(snapshot in snapshot_strategy()) {
        let plan = engine(UndeletePolicy::default()).plan(None, &snapshot);
        let expected: Vec<(PipelineId, bool)> = eligible_pairs(&snapshot);
        let actual: Vec<(PipelineId, bool)> = plan
            .actions
            .iter()
            .map(|a| (a.pipeline_id().clone(), a.is_apply()))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn emptied_snapshot_only_removes(previous in snapshot_strategy(), policy in policy_strategy()) {
        let plan = engine(policy).plan(Some(&previous), &Snapshot::default());
        prop_assert!(plan.actions.iter().all(ReconcileAction::is_remove));

        let removed: Vec<PipelineId> = plan.actions.iter().map(|a| a.pipeline_id().clone()).collect();
        let expected: Vec<PipelineId> = eligible_pairs(&previous).into_iter().map(|(id, _)| id).collect();
        prop_assert_eq!(removed, expected);
    }

    #[test]
    fn ineligible_sources_never_produce_actions(
        previous in snapshot_strategy(),
        current in snapshot_strategy(),
        policy in policy_strategy(),
    ) {
        let only_ineligible = |snapshot: &Snapshot| {
            Snapshot::new(
                snapshot
                    .sources
                    .iter()
                    .filter(|s| s.category() != "cloud")
                    .cloned()
                    .collect(),
            )
        };
        let plan = engine(policy).plan(Some(&only_ineligible(&previous)), &only_ineligible(&current));
        prop_assert!(plan.is_empty());
    }

    #[test]
    fn actions_name_unique_pipelines(
        previous in snapshot_strategy(),
        current in snapshot_strategy(),
        policy in policy_strategy(),
    ) {
        let plan = engine(policy).plan(Some(&previous), &current);
        let mut ids: Vec<&PipelineId> = plan.actions.iter().map(ReconcileAction::pipeline_id).collect();
        let total = ids.len();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        prop_assert_eq!(ids.len(), total);
    }
}
