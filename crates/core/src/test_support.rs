// SPDX-License-Identifier: MIT

//! Test builders and fixtures, available to other crates via the `test-support` feature.

use crate::instance::{Instance, InstanceId, InstanceState, Tags};
use crate::task::{Task, TaskId, TaskState};
use crate::workspace::{IsolationMode, Workspace, WorkspaceId};
use std::collections::BTreeSet;
use std::path::PathBuf;

crate::builder! {
    pub struct InstanceBuilder => Instance {
        into {
            source_ref: String = "main",
        }
        set {
            capabilities: BTreeSet<String> = BTreeSet::new(),
            tags: Tags = Tags::default(),
            state: InstanceState = InstanceState::Healthy,
            last_heartbeat_ms: u64 = 0,
            current_load: u32 = 0,
            declared_capacity: u32 = 4,
            consecutive_probe_failures: u32 = 0,
            last_assigned_at_ms: u64 = 0,
            created_at_ms: u64 = 0,
        }
        option {
            workspace_id: WorkspaceId = None,
            lost_since_ms: u64 = None,
        }
        computed {
            id: InstanceId = InstanceId::new(),
        }
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            kind: String = "build",
            payload: String = "payload",
        }
        set {
            required_capabilities: BTreeSet<String> = BTreeSet::new(),
            max_attempts: u32 = 3,
            attempts_made: u32 = 0,
            state: TaskState = TaskState::Pending,
            created_at_ms: u64 = 0,
            attempt_history: Vec<crate::task::AttemptRecord> = Vec::new(),
        }
        option {
            deadline_ms: u64 = None,
            owner: InstanceId = None,
            last_assigned_at_ms: u64 = None,
        }
        computed {
            id: TaskId = TaskId::new(),
        }
    }
}

crate::builder! {
    pub struct WorkspaceBuilder => Workspace {
        into {
            source_ref: String = "main",
        }
        set {
            isolation: IsolationMode = IsolationMode::Linked,
            created_at_ms: u64 = 0,
            root: PathBuf = PathBuf::new(),
        }
        option {
            owner: InstanceId = None,
        }
        computed {
            id: WorkspaceId = WorkspaceId::new(),
        }
    }
}
