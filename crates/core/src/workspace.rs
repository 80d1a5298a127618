// SPDX-License-Identifier: MIT

//! Workspace identifier and lifecycle.
//!
//! A workspace is an isolated filesystem working tree assigned to at
//! most one instance at a time (I1). `WorkspaceId` is distinct from the
//! workspace's root path.

use crate::instance::InstanceId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a workspace instance.
    pub struct WorkspaceId("wks-");
}

/// How a workspace's working tree relates to its source (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// Separate working directory sharing an underlying object store (git worktree).
    Linked,
    /// Full duplication, used when linked mode is unavailable.
    Copy,
}

crate::simple_display! {
    IsolationMode {
        Linked => "linked",
        Copy => "copy",
    }
}

impl std::str::FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linked" => Ok(IsolationMode::Linked),
            "copy" => Ok(IsolationMode::Copy),
            other => Err(format!("unknown isolation mode: {other}")),
        }
    }
}

/// A managed, isolated filesystem working tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub root: PathBuf,
    pub source_ref: String,
    pub isolation: IsolationMode,
    pub owner: Option<InstanceId>,
    pub created_at_ms: u64,
}

/// Sidecar metadata written into every workspace root (§6 persisted state layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSidecar {
    pub source_ref: String,
    pub isolation_mode: IsolationMode,
    pub created_at_ms: u64,
    pub owner_instance_id: Option<InstanceId>,
}

impl From<&Workspace> for WorkspaceSidecar {
    fn from(w: &Workspace) -> Self {
        Self {
            source_ref: w.source_ref.clone(),
            isolation_mode: w.isolation,
            created_at_ms: w.created_at_ms,
            owner_instance_id: w.owner,
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
