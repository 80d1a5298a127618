// SPDX-License-Identifier: MIT

use super::*;

fn spec() -> TaskSpec {
    TaskSpec {
        kind: "build".into(),
        payload: "hello".into(),
        required_capabilities: BTreeSet::new(),
        max_attempts: None,
        deadline_ms: None,
    }
}

#[test]
fn new_task_defaults_max_attempts() {
    let task = Task::new(TaskId::new(), spec(), 3, 0);
    assert_eq!(task.max_attempts, 3);
    assert_eq!(task.state, TaskState::Pending);
    assert!(task.owner.is_none());
}

#[test]
fn record_dispatch_increments_attempts_and_sets_owner() {
    let mut task = Task::new(TaskId::new(), spec(), 3, 0);
    let instance = InstanceId::new();
    task.record_dispatch(instance, 10);
    assert_eq!(task.attempts_made, 1);
    assert_eq!(task.owner, Some(instance));
    assert_eq!(task.state, TaskState::Assigned);
    assert_eq!(task.attempt_history.len(), 1);
}

#[test]
fn attempts_exhausted_at_max() {
    let mut task = Task::new(TaskId::new(), spec(), 1, 0);
    assert!(!task.attempts_exhausted());
    task.record_dispatch(InstanceId::new(), 0);
    assert!(task.attempts_exhausted());
}

#[test]
fn deadline_passed_checks_inclusive() {
    let mut task = Task::new(TaskId::new(), spec(), 3, 0);
    task.deadline_ms = Some(100);
    assert!(!task.deadline_passed(50));
    assert!(task.deadline_passed(100));
    assert!(task.deadline_passed(200));
}

#[test]
fn finalize_current_attempt_is_idempotent() {
    let mut task = Task::new(TaskId::new(), spec(), 3, 0);
    task.record_dispatch(InstanceId::new(), 0);
    task.finalize_current_attempt(TaskOutcome::Completed, 5);
    task.finalize_current_attempt(TaskOutcome::Failed("late".into()), 9);
    let record = task.attempt_history.last().unwrap();
    assert_eq!(record.finished_at_ms, Some(5));
    assert_eq!(record.outcome, Some(TaskOutcome::Completed));
}
