// SPDX-License-Identifier: MIT

//! Task identifier, state machine, and dispatch history.

use crate::instance::InstanceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId("tsk-");
}

/// Task lifecycle state (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Assigned,
    Running,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    TaskState {
        Pending => "pending",
        Assigned => "assigned",
        Running => "running",
        Cancelling => "cancelling",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl TaskState {
    /// I2: tasks in these states must have a non-null owner.
    pub fn requires_owner(self) -> bool {
        matches!(self, TaskState::Assigned | TaskState::Running | TaskState::Cancelling)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

/// Outcome reported by an instance for a completed task (§4.1 `complete`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
}

/// One dispatch attempt, used for `status` output and the distributor's
/// windowed failure-rate scoring (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub instance_id: InstanceId,
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    pub outcome: Option<TaskOutcome>,
}

/// Caller-supplied task definition, decoded from a `submit` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: String,
    pub payload: String,
    pub required_capabilities: BTreeSet<String>,
    pub max_attempts: Option<u32>,
    pub deadline_ms: Option<u64>,
}

/// A unit of work routed to one instance at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: String,
    pub payload: String,
    pub required_capabilities: BTreeSet<String>,
    pub max_attempts: u32,
    pub attempts_made: u32,
    pub deadline_ms: Option<u64>,
    pub state: TaskState,
    pub owner: Option<InstanceId>,
    pub created_at_ms: u64,
    pub last_assigned_at_ms: Option<u64>,
    #[serde(default)]
    pub attempt_history: Vec<AttemptRecord>,
}

impl Task {
    pub fn new(id: TaskId, spec: TaskSpec, default_max_attempts: u32, created_at_ms: u64) -> Self {
        Self {
            id,
            kind: spec.kind,
            payload: spec.payload,
            required_capabilities: spec.required_capabilities,
            max_attempts: spec.max_attempts.unwrap_or(default_max_attempts),
            attempts_made: 0,
            deadline_ms: spec.deadline_ms,
            state: TaskState::Pending,
            owner: None,
            created_at_ms,
            last_assigned_at_ms: None,
            attempt_history: Vec::new(),
        }
    }

    /// I3: `attempts_made` must never exceed `max_attempts`.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    pub fn deadline_passed(&self, now_ms: u64) -> bool {
        self.deadline_ms.map(|d| d <= now_ms).unwrap_or(false)
    }

    /// Record a re-dispatch: increments `attempts_made` and opens a new
    /// attempt history entry. Only call on an *actual* re-dispatch, never
    /// on a bare state reset (reassignment-on-loss semantics, §4.2).
    pub fn record_dispatch(&mut self, instance_id: InstanceId, now_ms: u64) {
        self.attempts_made += 1;
        self.owner = Some(instance_id);
        self.state = TaskState::Assigned;
        self.last_assigned_at_ms = Some(now_ms);
        self.attempt_history.push(AttemptRecord {
            instance_id,
            started_at_ms: now_ms,
            finished_at_ms: None,
            outcome: None,
        });
    }

    /// Close out the most recent attempt record with a terminal outcome.
    pub fn finalize_current_attempt(&mut self, outcome: TaskOutcome, now_ms: u64) {
        if let Some(record) = self.attempt_history.last_mut() {
            if record.finished_at_ms.is_none() {
                record.finished_at_ms = Some(now_ms);
                record.outcome = Some(outcome);
            }
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
