// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::{IsolationMode, Tags, TagsUniqueness, TaskSpec, TransportKind};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn opts() -> Options {
    let mut o = Options::defaults();
    o.workspace_root = PathBuf::from("/tmp/fleet-test-ws");
    o.journal_path = PathBuf::from("/tmp/fleet-test.wal");
    o.fleet_max_instances = 4;
    o.task_per_instance_cap = 2;
    o
}

fn ctx(now_ms: u64, opts: &Options) -> ApplyContext<'_> {
    ApplyContext { now_ms, opts }
}

fn launch_action(caps: &[&str]) -> Action {
    Action::new(
        "tester",
        Verb::Launch {
            capabilities: caps.iter().map(|s| s.to_string()).collect(),
            tags: Tags::default(),
            source_ref: "main".to_string(),
        },
    )
}

fn launch_instance(state: &mut FleetState, o: &Options, now_ms: u64, caps: &[&str]) -> fleet_core::InstanceId {
    let action = launch_action(caps);
    let (result, _) = apply_action(state, &action, &ctx(now_ms, o));
    let id_str = result
        .fields
        .iter()
        .find(|(k, _)| k == "instance_id")
        .map(|(_, v)| v.clone())
        .expect("launch always reports instance_id");
    let id = fleet_core::InstanceId::from_string(id_str);
    state.instances.get_mut(&id).unwrap().state = InstanceState::Healthy;
    id
}

fn submit_task(required: &[&str]) -> Action {
    Action::new(
        "tester",
        Verb::Submit {
            spec: TaskSpec {
                kind: "build".to_string(),
                payload: "payload".to_string(),
                required_capabilities: required.iter().map(|s| s.to_string()).collect(),
                max_attempts: None,
                deadline_ms: None,
            },
        },
    )
}

#[test]
fn launch_creates_a_starting_instance_and_a_linked_workspace() {
    let o = opts();
    let mut state = FleetState::new();
    let action = launch_action(&["rust"]);

    let (result, events) = apply_action(&mut state, &action, &ctx(1_000, &o));

    assert!(!result.is_error());
    assert_eq!(state.instances.len(), 1);
    assert_eq!(state.workspaces.len(), 1);
    let instance = state.instances.values().next().unwrap();
    assert_eq!(instance.state, InstanceState::Starting);
    assert_eq!(instance.capabilities, BTreeSet::from(["rust".to_string()]));
    let workspace = state.workspaces.values().next().unwrap();
    assert_eq!(workspace.isolation, IsolationMode::Linked);
    assert_eq!(workspace.owner, Some(instance.id));
    assert_eq!(events.len(), 1);
}

#[test]
fn launch_past_fleet_max_instances_is_exhausted() {
    let mut o = opts();
    o.fleet_max_instances = 1;
    let mut state = FleetState::new();
    launch_instance(&mut state, &o, 1_000, &["rust"]);

    let (result, _) = apply_action(&mut state, &launch_action(&["rust"]), &ctx(2_000, &o));

    assert!(result.is_error());
    assert_eq!(state.instances.len(), 1);
}

#[test]
fn launch_with_conflicting_color_tag_is_rejected() {
    let mut o = opts();
    o.tags_uniqueness = TagsUniqueness::Color;
    let mut state = FleetState::new();
    let red = Action::new(
        "tester",
        Verb::Launch {
            capabilities: vec![],
            tags: Tags { color: Some("red".to_string()), branch: None },
            source_ref: "main".to_string(),
        },
    );
    apply_action(&mut state, &red, &ctx(1_000, &o));

    let (result, _) = apply_action(&mut state, &red, &ctx(2_000, &o));

    assert!(result.is_error());
    assert_eq!(state.instances.len(), 1);
}

#[test]
fn submit_dispatches_to_the_only_capable_healthy_instance() {
    let o = opts();
    let mut state = FleetState::new();
    let instance_id = launch_instance(&mut state, &o, 1_000, &["rust"]);

    let (result, events) = apply_action(&mut state, &submit_task(&["rust"]), &ctx(2_000, &o));

    assert!(!result.is_error());
    let task = state.tasks.values().next().unwrap();
    assert_eq!(task.state, TaskState::Assigned);
    assert_eq!(task.owner, Some(instance_id));
    assert_eq!(state.instances[&instance_id].current_load, 1);
    assert!(events.iter().any(|e| e.kind == EventKind::TaskAssigned));
}

#[test]
fn submit_with_no_capable_instance_stays_pending_with_no_eligible_instance_event() {
    let o = opts();
    let mut state = FleetState::new();
    launch_instance(&mut state, &o, 1_000, &["rust"]);

    let (_, events) = apply_action(&mut state, &submit_task(&["gpu"]), &ctx(2_000, &o));

    let task = state.tasks.values().next().unwrap();
    assert_eq!(task.state, TaskState::Pending);
    let event = events.iter().find(|e| e.kind == EventKind::TaskNoEligibleInstance).unwrap();
    assert_eq!(event.fields.iter().find(|(k, _)| k == "unmet").map(|(_, v)| v.as_str()), Some("gpu"));
}

#[test]
fn submit_with_no_capable_instance_becomes_unsatisfiable_after_the_bounded_wait() {
    let mut o = opts();
    o.task_unsatisfiable_wait = std::time::Duration::from_secs(60);
    let mut state = FleetState::new();
    launch_instance(&mut state, &o, 1_000, &["rust"]);
    apply_action(&mut state, &submit_task(&["gpu"]), &ctx(2_000, &o));
    let task_id = *state.tasks.keys().next().unwrap();

    let events = redispatch_pending(&mut state, &ctx(2_000 + 60_000, &o));

    assert_eq!(state.tasks[&task_id].state, TaskState::Failed);
    assert!(events.iter().any(|e| e.kind == EventKind::TaskUnsatisfiable));
}

#[test]
fn complete_with_failure_retries_until_attempts_are_exhausted() {
    let o = opts();
    let mut state = FleetState::new();
    launch_instance(&mut state, &o, 1_000, &["rust"]);
    apply_action(&mut state, &submit_task(&["rust"]), &ctx(2_000, &o));
    let task_id = *state.tasks.keys().next().unwrap();
    state.tasks.get_mut(&task_id).unwrap().max_attempts = 2;

    let complete = Action::new(
        "tester",
        Verb::Complete { task_id, outcome: TaskOutcome::Failed("boom".to_string()) },
    );
    let (_, events) = apply_action(&mut state, &complete, &ctx(3_000, &o));
    assert_eq!(state.tasks[&task_id].state, TaskState::Assigned);
    assert!(events.iter().any(|e| e.kind == EventKind::TaskAssigned));

    let complete_again = Action::new(
        "tester",
        Verb::Complete { task_id, outcome: TaskOutcome::Failed("boom again".to_string()) },
    );
    let (_, events) = apply_action(&mut state, &complete_again, &ctx(4_000, &o));
    assert_eq!(state.tasks[&task_id].state, TaskState::Failed);
    assert!(events.iter().any(|e| e.kind == EventKind::TaskFailed));
}

#[test]
fn cancel_releases_the_owning_instances_load() {
    let o = opts();
    let mut state = FleetState::new();
    let instance_id = launch_instance(&mut state, &o, 1_000, &["rust"]);
    apply_action(&mut state, &submit_task(&["rust"]), &ctx(2_000, &o));
    let task_id = *state.tasks.keys().next().unwrap();

    let (result, _) = apply_action(&mut state, &Action::new("tester", Verb::Cancel { task_id }), &ctx(3_000, &o));

    assert!(!result.is_error());
    assert_eq!(state.tasks[&task_id].state, TaskState::Cancelled);
    assert_eq!(state.instances[&instance_id].current_load, 0);
}

#[test]
fn force_terminate_returns_owned_tasks_to_pending() {
    let o = opts();
    let mut state = FleetState::new();
    let instance_id = launch_instance(&mut state, &o, 1_000, &["rust"]);
    apply_action(&mut state, &submit_task(&["rust"]), &ctx(2_000, &o));
    let task_id = *state.tasks.keys().next().unwrap();

    let terminate = Action::new(
        "tester",
        Verb::Terminate { instance_id, mode: TerminationMode::Force },
    );
    let (_, events) = apply_action(&mut state, &terminate, &ctx(3_000, &o));

    assert_eq!(state.instances[&instance_id].state, InstanceState::Terminated);
    assert_eq!(state.tasks[&task_id].state, TaskState::Pending);
    assert!(state.tasks[&task_id].owner.is_none());
    assert!(events.iter().any(|e| e.kind == EventKind::WorkspaceReleased));
}

#[test]
fn graceful_terminate_finalizes_once_its_last_task_completes() {
    let o = opts();
    let mut state = FleetState::new();
    let instance_id = launch_instance(&mut state, &o, 1_000, &["rust"]);
    apply_action(&mut state, &submit_task(&["rust"]), &ctx(2_000, &o));
    let task_id = *state.tasks.keys().next().unwrap();

    let terminate = Action::new(
        "tester",
        Verb::Terminate { instance_id, mode: TerminationMode::Graceful },
    );
    apply_action(&mut state, &terminate, &ctx(3_000, &o));
    assert_eq!(state.instances[&instance_id].state, InstanceState::Draining);

    let complete = Action::new(
        "tester",
        Verb::Complete { task_id, outcome: TaskOutcome::Completed },
    );
    let (_, events) = apply_action(&mut state, &complete, &ctx(4_000, &o));

    assert_eq!(state.instances[&instance_id].state, InstanceState::Terminated);
    assert!(events.iter().any(|e| e.kind == EventKind::WorkspaceReleased));
}

#[test]
fn heartbeat_recovers_a_degraded_instance_to_healthy() {
    let o = opts();
    let mut state = FleetState::new();
    let instance_id = launch_instance(&mut state, &o, 1_000, &["rust"]);
    state.instances.get_mut(&instance_id).unwrap().state = InstanceState::Degraded;

    let heartbeat = Action::new(
        "tester",
        Verb::Heartbeat { instance_id, observed_load: 0, progress: None },
    );
    let (_, events) = apply_action(&mut state, &heartbeat, &ctx(5_000, &o));

    assert_eq!(state.instances[&instance_id].state, InstanceState::Healthy);
    assert!(events.iter().any(|e| e.kind == EventKind::InstanceStateChanged));
}

#[test]
fn health_tick_escalates_a_lost_instance_to_terminating_then_terminated() {
    let mut o = opts();
    o.health_fresh_window = std::time::Duration::from_millis(100);
    o.health_stale_window = std::time::Duration::from_millis(200);
    o.health_recovery_grace = std::time::Duration::from_millis(5_000);

    let mut state = FleetState::new();
    let stale_instance = launch_instance(&mut state, &o, 0, &["rust"]);
    let fresh_instance = launch_instance(&mut state, &o, 0, &["rust"]);
    state.instances.get_mut(&fresh_instance).unwrap().last_heartbeat_ms = 10_000;

    apply_action(&mut state, &submit_task(&["rust"]), &ctx(0, &o));
    let task_id = *state.tasks.keys().next().unwrap();
    // Force the task onto the soon-to-be-lost instance for a deterministic assertion.
    state.tasks.get_mut(&task_id).unwrap().owner = Some(stale_instance);
    state.instances.get_mut(&stale_instance).unwrap().current_load = 1;
    state.instances.get_mut(&fresh_instance).unwrap().current_load = 0;

    // First tick: the instance is lost but still inside its recovery grace,
    // so it holds state rather than escalating. The fresh instance keeps
    // heartbeating on every tick so it never competes for the escalation.
    let events = apply_health_tick(&mut state, &ctx(10_000, &o));
    assert_eq!(state.instances[&stale_instance].state, InstanceState::Healthy);
    assert!(!events.iter().any(|e| e.kind == EventKind::HealthTransition));

    // Second tick, past the recovery grace: escalates to terminating and
    // reassigns the owned task.
    state.instances.get_mut(&fresh_instance).unwrap().last_heartbeat_ms = 10_000 + 5_000;
    let events = apply_health_tick(&mut state, &ctx(10_000 + 5_000, &o));
    assert_eq!(state.instances[&stale_instance].state, InstanceState::Terminating);
    assert_eq!(state.instances[&fresh_instance].state, InstanceState::Healthy);
    assert_eq!(state.tasks[&task_id].owner, Some(fresh_instance));
    assert!(!events.iter().any(|e| e.kind == EventKind::WorkspaceReleased));

    // Third tick: a terminating instance always advances to terminated and
    // releases its workspace.
    state.instances.get_mut(&fresh_instance).unwrap().last_heartbeat_ms = 10_000 + 5_000 + 1;
    let events = apply_health_tick(&mut state, &ctx(10_000 + 5_000 + 1, &o));
    assert_eq!(state.instances[&stale_instance].state, InstanceState::Terminated);
    assert!(events.iter().any(|e| e.kind == EventKind::WorkspaceReleased));
}

#[test]
fn status_all_reports_instance_and_task_counts() {
    let o = opts();
    let mut state = FleetState::new();
    launch_instance(&mut state, &o, 1_000, &["rust"]);
    apply_action(&mut state, &submit_task(&["rust"]), &ctx(2_000, &o));

    let (result, _) = apply_action(
        &mut state,
        &Action::new("tester", Verb::Status { selector: Selector::All }),
        &ctx(3_000, &o),
    );

    let fields: std::collections::HashMap<_, _> = result.fields.into_iter().collect();
    assert_eq!(fields.get("instances").map(String::as_str), Some("1"));
    assert_eq!(fields.get("tasks").map(String::as_str), Some("1"));
}

#[test]
fn status_for_an_unknown_instance_is_not_found() {
    let o = opts();
    let mut state = FleetState::new();

    let (result, _) = apply_action(
        &mut state,
        &Action::new("tester", Verb::Status { selector: Selector::Instance("ins-doesnotexist".to_string()) }),
        &ctx(1_000, &o),
    );

    assert!(result.is_error());
}

#[test]
fn help_without_a_verb_lists_every_verb() {
    let o = opts();
    let mut state = FleetState::new();

    let (result, _) =
        apply_action(&mut state, &Action::new("tester", Verb::Help { verb: None }), &ctx(1_000, &o));

    assert!(result.message.contains("launch"));
    assert!(result.message.contains("subscribe"));
}

// Keep transport.kind in play so the field isn't flagged unused as the
// fleet_core::config surface grows.
#[test]
fn defaults_use_the_file_transport() {
    assert_eq!(Options::defaults().transport_kind, TransportKind::File);
}
