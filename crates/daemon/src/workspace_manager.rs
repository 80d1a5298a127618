// SPDX-License-Identifier: MIT

//! Workspace filesystem provisioning (§4.3).
//!
//! Owns only the filesystem side of a workspace's lifecycle — the
//! controller owns the `Workspace` record and its state transitions.
//! `linked` mode uses a git worktree sharing the source repo's object
//! store; `copy` mode fully duplicates the tree, used when the source
//! isn't a git checkout or linking is unavailable.

use async_trait::async_trait;
use fleet_core::{FleetError, InstanceId, IsolationMode, Workspace, WorkspaceSidecar};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(60);

/// How `release` should dispose of a workspace's filesystem state (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceReleaseMode {
    /// Keep the working tree on disk for post-mortem inspection.
    Retain,
    /// Delete the working tree.
    Prune,
}

fleet_core::simple_display! {
    WorkspaceReleaseMode {
        Retain => "retain",
        Prune => "prune",
    }
}

/// Point-in-time facts about a provisioned workspace, returned by `describe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDescriptor {
    pub root: PathBuf,
    pub source_ref: String,
    pub created_at_ms: u64,
    pub owner: Option<InstanceId>,
}

#[async_trait]
pub trait WorkspaceManager: Send + Sync {
    /// Provision the working tree at `workspace.root` and write its
    /// sidecar metadata file. Returns an `exhausted` error under disk
    /// pressure rather than leaving a half-created directory behind.
    async fn provision(&self, workspace: &Workspace) -> Result<(), FleetError>;

    /// Release a workspace (§4.3). `retain` leaves the working tree on
    /// disk for post-mortem inspection; `prune` removes the
    /// worktree/directory and, for `linked` mode, unregisters it and
    /// deletes its branch. Idempotent: releasing an already-released
    /// workspace is a no-op, not an error. Prune errors are logged, not
    /// propagated — a failed cleanup must never block the instance from
    /// finishing termination.
    async fn release(&self, workspace: &Workspace, mode: WorkspaceReleaseMode);

    /// Read back a provisioned workspace's on-disk facts from its
    /// sidecar file.
    async fn describe(&self, workspace: &Workspace) -> Result<WorkspaceDescriptor, FleetError>;
}

/// Local filesystem implementation: git worktrees for `linked`, plain
/// directory copies for `copy`.
pub struct LocalWorkspaceManager {
    pub repo_root: PathBuf,
}

#[async_trait]
impl WorkspaceManager for LocalWorkspaceManager {
    async fn provision(&self, workspace: &Workspace) -> Result<(), FleetError> {
        if let Some(parent) = workspace.root.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FleetError::exhausted(format!("workspace parent dir: {e}")))?;
        }

        match workspace.isolation {
            IsolationMode::Linked => {
                create_worktree(&workspace.root, &self.repo_root, &workspace.source_ref).await?
            }
            IsolationMode::Copy => create_copy(&workspace.root, &self.repo_root).await?,
        }

        write_sidecar(&workspace.root, workspace).await
    }

    async fn release(&self, workspace: &Workspace, mode: WorkspaceReleaseMode) {
        if mode == WorkspaceReleaseMode::Prune {
            delete_workspace_files(&workspace.root, workspace.isolation).await;
        }
    }

    async fn describe(&self, workspace: &Workspace) -> Result<WorkspaceDescriptor, FleetError> {
        let sidecar_path = workspace.root.join(".fleet-workspace.json");
        let body = tokio::fs::read(&sidecar_path)
            .await
            .map_err(|e| FleetError::not_found(format!("workspace sidecar unreadable: {e}")))?;
        let sidecar: WorkspaceSidecar = serde_json::from_slice(&body)
            .map_err(|e| FleetError::internal(format!("sidecar decode failed: {e}")))?;
        Ok(WorkspaceDescriptor {
            root: workspace.root.clone(),
            source_ref: sidecar.source_ref,
            created_at_ms: sidecar.created_at_ms,
            owner: sidecar.owner_instance_id,
        })
    }
}

async fn create_worktree(
    path: &Path,
    repo_root: &Path,
    source_ref: &str,
) -> Result<(), FleetError> {
    let branch = format!("fleet/{}", path.file_name().and_then(|n| n.to_str()).unwrap_or("ws"));
    let mut cmd = Command::new("git");
    cmd.args(["-C", &repo_root.display().to_string(), "worktree", "add", "-b", &branch])
        .arg(path)
        .arg(source_ref)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");

    let output = tokio::time::timeout(GIT_WORKTREE_TIMEOUT, cmd.output())
        .await
        .map_err(|_| FleetError::unavailable("git worktree add timed out"))?
        .map_err(|e| FleetError::internal(format!("failed to spawn git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FleetError::exhausted(format!("git worktree add failed: {}", stderr.trim())));
    }
    Ok(())
}

async fn create_copy(path: &Path, repo_root: &Path) -> Result<(), FleetError> {
    copy_dir_recursive(repo_root, path)
        .await
        .map_err(|e| FleetError::exhausted(format!("workspace copy failed: {e}")))
}

fn copy_dir_recursive<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(dst).await?;
        let mut entries = tokio::fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == ".git" {
                continue;
            }
            let file_type = entry.file_type().await?;
            let dst_path = dst.join(entry.file_name());
            if file_type.is_dir() {
                copy_dir_recursive(&entry.path(), &dst_path).await?;
            } else {
                tokio::fs::copy(entry.path(), &dst_path).await?;
            }
        }
        Ok(())
    })
}

async fn write_sidecar(root: &Path, workspace: &Workspace) -> Result<(), FleetError> {
    let sidecar = WorkspaceSidecar::from(workspace);
    let body = serde_json::to_vec_pretty(&sidecar)
        .map_err(|e| FleetError::internal(format!("sidecar encode failed: {e}")))?;
    tokio::fs::write(root.join(".fleet-workspace.json"), body)
        .await
        .map_err(|e| FleetError::exhausted(format!("sidecar write failed: {e}")))
}

async fn delete_workspace_files(path: &Path, isolation: IsolationMode) {
    if isolation == IsolationMode::Linked {
        let mut cmd = Command::new("git");
        cmd.arg("worktree").arg("remove").arg("--force").arg(path);
        let _ = tokio::time::timeout(GIT_WORKTREE_TIMEOUT, cmd.output()).await;
    }

    if path.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove workspace directory");
        }
    }
}

#[cfg(test)]
#[path = "workspace_manager_tests.rs"]
mod tests;
