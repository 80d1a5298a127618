// SPDX-License-Identifier: MIT

//! Durable state for the controller: a write-ahead journal of incoming
//! actions plus periodic snapshots of the materialized state, so a
//! restart can recover without replaying from the beginning of time.

mod snapshot;
mod wal;

pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use wal::{Wal, WalEntry, WalError};

use crate::state::FleetState;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Everything needed to resume: the materialized state as of the last
/// snapshot, the open journal positioned just past it, and the journal
/// entries still unapplied (for the caller to replay).
pub struct Recovered {
    pub state: FleetState,
    pub wal: Wal,
    pub unapplied: Vec<WalEntry>,
}

/// Load the latest snapshot (if any) and open the journal positioned
/// past it, returning the entries that still need replaying.
pub fn recover(journal_path: &Path, snapshot_path: &Path) -> Result<Recovered, RecoveryError> {
    let snapshot = Snapshot::load(snapshot_path)?;
    let (state, processed_seq) = match snapshot {
        Some(s) => (s.state, s.seq),
        None => (FleetState::new(), 0),
    };
    let wal = Wal::open(journal_path, processed_seq)?;
    let unapplied = wal.entries_after(processed_seq)?;
    Ok(Recovered { state, wal, unapplied })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
