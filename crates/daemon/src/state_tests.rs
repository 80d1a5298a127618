// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::{InstanceState, Tags};
use std::collections::BTreeSet;

fn instance(caps: &[&str], state: InstanceState) -> Instance {
    Instance {
        id: InstanceId::new(),
        workspace_id: None,
        capabilities: caps.iter().map(|s| s.to_string()).collect(),
        tags: Tags::default(),
        state,
        last_heartbeat_ms: 0,
        current_load: 0,
        declared_capacity: 4,
        consecutive_probe_failures: 0,
        last_assigned_at_ms: 0,
        created_at_ms: 0,
        source_ref: "main".to_string(),
        lost_since_ms: None,
    }
}

#[test]
fn eligible_instances_filters_by_capability_and_schedulability() {
    let mut state = FleetState::new();
    let healthy = instance(&["build", "linux"], InstanceState::Healthy);
    let degraded = instance(&["build", "linux"], InstanceState::Degraded);
    let narrow = instance(&["linux"], InstanceState::Healthy);
    state.instances.insert(healthy.id, healthy.clone());
    state.instances.insert(degraded.id, degraded);
    state.instances.insert(narrow.id, narrow);

    let required: BTreeSet<String> = ["build", "linux"].iter().map(|s| s.to_string()).collect();
    let eligible = state.eligible_instances(&required);

    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id, healthy.id);
}

fn task_with_attempts(kind: &str, attempts: &[(InstanceId, fleet_core::TaskOutcome)]) -> fleet_core::Task {
    let mut task = fleet_core::Task::new(
        TaskId::new(),
        fleet_core::TaskSpec {
            kind: kind.to_string(),
            payload: String::new(),
            required_capabilities: BTreeSet::new(),
            max_attempts: Some(attempts.len() as u32 + 1),
            deadline_ms: None,
        },
        3,
        0,
    );
    for (i, (instance_id, outcome)) in attempts.iter().enumerate() {
        task.record_dispatch(*instance_id, i as u64);
        task.finalize_current_attempt(outcome.clone(), i as u64 + 1);
    }
    task
}

#[test]
fn failure_rate_for_kind_counts_only_that_instance_and_kind() {
    let mut state = FleetState::new();
    let flaky = InstanceId::new();
    let steady = InstanceId::new();

    let build_task = task_with_attempts(
        "build",
        &[
            (flaky, fleet_core::TaskOutcome::Failed("x".to_string())),
            (flaky, fleet_core::TaskOutcome::Completed),
            (steady, fleet_core::TaskOutcome::Completed),
        ],
    );
    let deploy_task =
        task_with_attempts("deploy", &[(flaky, fleet_core::TaskOutcome::Failed("y".to_string()))]);
    state.tasks.insert(build_task.id, build_task);
    state.tasks.insert(deploy_task.id, deploy_task);

    assert_eq!(state.failure_rate_for_kind(flaky, "build", 10), (1, 2));
    assert_eq!(state.failure_rate_for_kind(steady, "build", 10), (0, 1));
    assert_eq!(state.failure_rate_for_kind(flaky, "deploy", 10), (1, 1));
}

#[test]
fn failure_rate_for_kind_respects_the_window() {
    let mut state = FleetState::new();
    let instance_id = InstanceId::new();
    let attempts: Vec<_> = (0..5)
        .map(|i| {
            let outcome = if i == 0 {
                fleet_core::TaskOutcome::Failed("old".to_string())
            } else {
                fleet_core::TaskOutcome::Completed
            };
            (instance_id, outcome)
        })
        .collect();
    let task = task_with_attempts("build", &attempts);
    state.tasks.insert(task.id, task);

    // The one failure is the oldest attempt; a window of 2 only sees the
    // two most recent (successful) ones.
    assert_eq!(state.failure_rate_for_kind(instance_id, "build", 2), (0, 2));
    assert_eq!(state.failure_rate_for_kind(instance_id, "build", 10), (1, 5));
}

#[test]
fn tasks_owned_by_filters_by_owner() {
    let mut state = FleetState::new();
    let instance_id = InstanceId::new();
    let mut task = fleet_core::Task::new(
        TaskId::new(),
        fleet_core::TaskSpec {
            kind: "build".to_string(),
            payload: String::new(),
            required_capabilities: BTreeSet::new(),
            max_attempts: None,
            deadline_ms: None,
        },
        3,
        0,
    );
    task.record_dispatch(instance_id, 0);
    state.tasks.insert(task.id, task.clone());

    let owned = state.tasks_owned_by(instance_id);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, task.id);
    assert_eq!(state.tasks_owned_by(InstanceId::new()).len(), 0);
}
