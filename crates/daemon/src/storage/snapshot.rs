// SPDX-License-Identifier: MIT

//! Snapshot persistence for crash recovery.
//!
//! A snapshot stores the complete materialized state at a point in
//! time, identified by the journal sequence number it was taken after.
//! Recovery loads the latest snapshot and replays journal entries after
//! that sequence (see `storage::recover`).

use crate::state::FleetState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A snapshot of the materialized state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "v")]
    pub version: u32,
    /// Journal sequence number at the time of snapshot.
    pub seq: u64,
    pub state: FleetState,
    pub created_at_ms: u64,
}

impl Snapshot {
    pub fn new(seq: u64, state: FleetState, created_at_ms: u64) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, seq, state, created_at_ms }
    }

    /// Write atomically: serialize to a sibling temp file, then rename
    /// over the destination so a crash mid-write never leaves a
    /// half-written snapshot.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let tmp = path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`. The
/// oldest backup is removed when the limit is reached. Shared with the
/// journal's own corruption-repair path.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
