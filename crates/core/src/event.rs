// SPDX-License-Identifier: MIT

//! `Event` — the append-only notification stream observable by transport subscribers.

use crate::action::CorrelationId;
use serde::{Deserialize, Serialize};

/// Event kind, not a type name — mirrors the taxonomy of observable
/// transitions called out across §4.1–§4.4 and the end-to-end scenarios in §8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    InstanceStateChanged,
    TaskAssigned,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
    TaskNoEligibleInstance,
    TaskUnsatisfiable,
    TaskDeadlineExpired,
    WorkspaceReleased,
    HealthTransition,
    Internal,
}

crate::simple_display! {
    EventKind {
        InstanceStateChanged => "instance.state_changed",
        TaskAssigned => "task.assigned",
        TaskCompleted => "task.completed",
        TaskFailed => "task.failed",
        TaskCancelled => "task.cancelled",
        TaskNoEligibleInstance => "task.no-eligible-instance",
        TaskUnsatisfiable => "task.unsatisfiable",
        TaskDeadlineExpired => "task.deadline-expired",
        WorkspaceReleased => "workspace.released",
        HealthTransition => "health.transition",
        Internal => "internal",
    }
}

/// An asynchronous notification, independent of any single `Action`/`Result` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub subject: String,
    pub fields: Vec<(String, String)>,
    pub timestamp_ms: u64,
    /// Present when this event was emitted while handling a specific action
    /// (e.g. `task.assigned` from a `submit`); absent for monitor-originated
    /// events (e.g. a health transition detected on a timer tick).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl Event {
    pub fn new(kind: EventKind, subject: impl Into<String>, timestamp_ms: u64) -> Self {
        Self { kind, subject: subject.into(), fields: Vec::new(), timestamp_ms, correlation_id: None }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn with_correlation(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
