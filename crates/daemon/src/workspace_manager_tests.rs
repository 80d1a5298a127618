// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::WorkspaceId;
use tempfile::tempdir;

fn workspace(root: PathBuf, isolation: IsolationMode) -> Workspace {
    Workspace {
        id: WorkspaceId::new(),
        root,
        source_ref: "main".to_string(),
        isolation,
        owner: None,
        created_at_ms: 0,
    }
}

#[tokio::test]
async fn copy_mode_duplicates_source_tree_and_writes_sidecar() {
    let src = tempdir().unwrap();
    tokio::fs::write(src.path().join("README.md"), b"hello").await.unwrap();
    tokio::fs::create_dir(src.path().join("src")).await.unwrap();
    tokio::fs::write(src.path().join("src/lib.rs"), b"// lib").await.unwrap();

    let dst_parent = tempdir().unwrap();
    let dst = dst_parent.path().join("workspace-1");
    let manager = LocalWorkspaceManager { repo_root: src.path().to_path_buf() };
    let ws = workspace(dst.clone(), IsolationMode::Copy);

    manager.provision(&ws).await.unwrap();

    assert!(dst.join("README.md").exists());
    assert!(dst.join("src/lib.rs").exists());
    assert!(dst.join(".fleet-workspace.json").exists());
}

#[tokio::test]
async fn prune_removes_a_plain_directory() {
    let dst_parent = tempdir().unwrap();
    let dst = dst_parent.path().join("workspace-2");
    tokio::fs::create_dir_all(&dst).await.unwrap();
    tokio::fs::write(dst.join("marker"), b"x").await.unwrap();

    let manager = LocalWorkspaceManager { repo_root: dst_parent.path().to_path_buf() };
    let ws = workspace(dst.clone(), IsolationMode::Copy);

    manager.release(&ws, WorkspaceReleaseMode::Prune).await;

    assert!(!dst.exists());
}

#[tokio::test]
async fn retain_leaves_the_directory_in_place() {
    let dst_parent = tempdir().unwrap();
    let dst = dst_parent.path().join("workspace-3");
    tokio::fs::create_dir_all(&dst).await.unwrap();
    tokio::fs::write(dst.join("marker"), b"x").await.unwrap();

    let manager = LocalWorkspaceManager { repo_root: dst_parent.path().to_path_buf() };
    let ws = workspace(dst.clone(), IsolationMode::Copy);

    manager.release(&ws, WorkspaceReleaseMode::Retain).await;

    assert!(dst.join("marker").exists());
}

#[tokio::test]
async fn describe_reads_back_the_sidecar() {
    let src = tempdir().unwrap();
    let dst_parent = tempdir().unwrap();
    let dst = dst_parent.path().join("workspace-4");
    let manager = LocalWorkspaceManager { repo_root: src.path().to_path_buf() };
    let ws = workspace(dst.clone(), IsolationMode::Copy);

    manager.provision(&ws).await.unwrap();
    let descriptor = manager.describe(&ws).await.unwrap();

    assert_eq!(descriptor.root, dst);
    assert_eq!(descriptor.source_ref, "main");
}

#[tokio::test]
async fn describe_unprovisioned_workspace_is_not_found() {
    let dst_parent = tempdir().unwrap();
    let dst = dst_parent.path().join("never-provisioned");
    let manager = LocalWorkspaceManager { repo_root: dst_parent.path().to_path_buf() };
    let ws = workspace(dst, IsolationMode::Copy);

    let err = manager.describe(&ws).await.unwrap_err();
    assert_eq!(err.kind, fleet_core::ErrorKind::NotFound);
}
