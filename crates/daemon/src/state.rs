// SPDX-License-Identifier: MIT

//! In-memory materialized state: every instance, task, and workspace the
//! controller currently knows about. This is what gets snapshotted and
//! rebuilt from journal replay on restart.

use fleet_core::{Instance, InstanceId, Task, TaskId, Workspace, WorkspaceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetState {
    pub instances: HashMap<InstanceId, Instance>,
    pub tasks: HashMap<TaskId, Task>,
    pub workspaces: HashMap<WorkspaceId, Workspace>,
}

impl FleetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances eligible for new assignments: schedulable and holding
    /// every capability the task requires (§4.2 eligibility filter).
    pub fn eligible_instances(&self, required: &BTreeSet<String>) -> Vec<&Instance> {
        self.instances
            .values()
            .filter(|i| i.state.is_schedulable() && i.has_capabilities(required))
            .collect()
    }

    /// Tags already in use by a live (non-terminated) instance, for the
    /// tag-uniqueness policy at `launch` time.
    pub fn live_tags(&self) -> impl Iterator<Item = &fleet_core::Tags> {
        self.instances.values().filter(|i| !i.state.is_terminal()).map(|i| &i.tags)
    }

    pub fn instances_by_workspace(&self, workspace_id: WorkspaceId) -> Option<&Instance> {
        self.instances.values().find(|i| i.workspace_id == Some(workspace_id))
    }

    pub fn pending_and_assigned_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| !t.state.is_terminal())
    }

    pub fn tasks_owned_by(&self, instance_id: InstanceId) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.owner == Some(instance_id)).collect()
    }

    /// Windowed failure rate for `instance_id` on tasks of `kind`, used by
    /// the distributor's failure-rate tiebreak (§4.2). Looks across every
    /// task's attempt history fleet-wide, not just one task's, then keeps
    /// the most recent `window` finished attempts by start time.
    pub fn failure_rate_for_kind(
        &self,
        instance_id: InstanceId,
        kind: &str,
        window: usize,
    ) -> (u32, u32) {
        let mut attempts: Vec<&fleet_core::AttemptRecord> = self
            .tasks
            .values()
            .filter(|t| t.kind == kind)
            .flat_map(|t| t.attempt_history.iter())
            .filter(|a| a.instance_id == instance_id && a.outcome.is_some())
            .collect();
        attempts.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));

        let mut failed = 0u32;
        let mut total = 0u32;
        for record in attempts.into_iter().take(window) {
            total += 1;
            if matches!(record.outcome, Some(fleet_core::TaskOutcome::Failed(_))) {
                failed += 1;
            }
        }
        (failed, total)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
