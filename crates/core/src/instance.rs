// SPDX-License-Identifier: MIT

//! Instance identifier, tags, and lifecycle state.

use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

crate::define_id! {
    /// Unique identifier for a worker instance.
    pub struct InstanceId("ins-");
}

/// Operator-supplied labels used by tag-uniqueness policies (§6 `tags.uniqueness`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Tags {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.branch.is_none()
    }
}

/// Lifecycle state of an [`Instance`] (§4.1 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Starting,
    Healthy,
    Degraded,
    Draining,
    Terminating,
    Terminated,
}

crate::simple_display! {
    InstanceState {
        Starting => "starting",
        Healthy => "healthy",
        Degraded => "degraded",
        Draining => "draining",
        Terminating => "terminating",
        Terminated => "terminated",
    }
}

impl InstanceState {
    /// Instances in these states may receive new task assignments (§4.2 eligibility).
    pub fn is_schedulable(self) -> bool {
        matches!(self, InstanceState::Healthy)
    }

    /// I4: instances in `healthy`/`degraded` own a workspace, `terminated` does not.
    pub fn holds_workspace(self) -> bool {
        matches!(
            self,
            InstanceState::Starting
                | InstanceState::Healthy
                | InstanceState::Degraded
                | InstanceState::Draining
                | InstanceState::Terminating
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceState::Terminated)
    }
}

/// A long-lived worker instance supervised by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub workspace_id: Option<WorkspaceId>,
    pub capabilities: BTreeSet<String>,
    pub tags: Tags,
    pub state: InstanceState,
    pub last_heartbeat_ms: u64,
    /// Number of tasks currently assigned+running on this instance.
    pub current_load: u32,
    pub declared_capacity: u32,
    pub consecutive_probe_failures: u32,
    /// Epoch ms of the most recent task assignment, for round-robin tiebreaks.
    pub last_assigned_at_ms: u64,
    pub created_at_ms: u64,
    /// Source reference the instance's workspace was materialized from, kept
    /// here too so a deleted-out-of-band source can be detected without a
    /// workspace lookup.
    pub source_ref: String,
    /// Epoch ms a `lost` verdict was first observed for this instance, reset
    /// once it recovers. Drives the `health.recovery-grace` escalation to
    /// `terminating` (§4.4).
    pub lost_since_ms: Option<u64>,
}

impl Instance {
    pub fn has_capabilities(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }

    /// Count of exact-match capability tags, used as the distributor's
    /// first tiebreak (prefer specificity — generalists stay free).
    pub fn capability_specificity(&self) -> usize {
        self.capabilities.len()
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
