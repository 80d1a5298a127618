// SPDX-License-Identifier: MIT

//! Append-only journal of incoming actions, replayed on restart.
//!
//! One line of newline-delimited JSON per entry. Corrupt or non-UTF-8
//! tail data is tolerated: `open` rotates it out to a `.bak` file and
//! keeps whatever valid entries precede it, and read paths stop at the
//! first bad line rather than erroring.

use super::snapshot::rotate_bak_path;
use fleet_core::Action;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One journaled action, tagged with its position in the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub action: Action,
    pub recorded_at_ms: u64,
}

/// Read the longest valid *prefix* of lines, stopping at the first line
/// that doesn't parse (corrupt tail or binary data). Used by `open`'s
/// repair pass and by `entries_after`, both of which want a contiguous
/// run rather than entries scattered past a hole.
fn read_valid_entries(path: &Path) -> Result<(Vec<WalEntry>, bool), WalError> {
    if !path.exists() {
        return Ok((Vec::new(), false));
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut truncated = false;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => {
                truncated = true;
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(_) => {
                truncated = true;
                break;
            }
        }
    }
    Ok((entries, truncated))
}

/// Read every parseable line in the file, silently skipping ones that
/// don't parse instead of stopping. Used by `next_unprocessed`, which
/// must be able to step past an isolated corrupt line and keep reading
/// entries written after it.
fn read_entries_skipping_corrupt(path: &Path) -> Vec<WalEntry> {
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(entry) = serde_json::from_str::<WalEntry>(&line) {
            entries.push(entry);
        }
    }
    entries
}

/// Rewrite the file at `path` to contain exactly `entries`, one JSON line each.
fn rewrite_clean(path: &Path, entries: &[WalEntry]) -> Result<(), WalError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in entries {
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Append-only action journal backed by a single file.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    processed_seq: u64,
    read_pos: u64,
    unflushed_since_sync: usize,
}

impl Wal {
    /// Open (creating if absent) the journal at `path`, repairing any
    /// trailing corruption. `processed_seq` is the sequence number up to
    /// and including which entries are already reflected in a snapshot;
    /// `next_unprocessed` starts reading just past it.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        let (entries, was_corrupt) = match read_valid_entries(path) {
            Ok(v) => v,
            Err(_) => (Vec::new(), true),
        };

        if was_corrupt {
            let bak = rotate_bak_path(path);
            if path.exists() {
                let _ = fs::rename(path, &bak);
            }
            rewrite_clean(path, &entries)?;
        } else if !path.exists() {
            rewrite_clean(path, &entries)?;
        }

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            write_seq,
            processed_seq,
            read_pos: processed_seq,
            unflushed_since_sync: 0,
        })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Append one action, returning its assigned sequence number. Buffered;
    /// call [`Wal::flush`] (or rely on [`Wal::needs_flush`]) to persist.
    pub fn append(&mut self, action: &Action, recorded_at_ms: u64) -> Result<u64, WalError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, action: action.clone(), recorded_at_ms };
        serde_json::to_writer(&mut self.writer, &entry)?;
        self.writer.write_all(b"\n")?;
        self.unflushed_since_sync += 1;
        Ok(entry.seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.unflushed_since_sync = 0;
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.unflushed_since_sync >= FLUSH_THRESHOLD
    }

    /// Read and return the next entry past the read cursor, advancing it.
    /// Returns `Ok(None)` both at end-of-log and on encountering a corrupt
    /// trailing line — callers must not treat the latter as fatal.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        let entries = read_entries_skipping_corrupt(&self.path);
        let next = entries.into_iter().find(|e| e.seq > self.read_pos);
        if let Some(entry) = &next {
            self.read_pos = entry.seq;
        }
        Ok(next)
    }

    /// Record that everything up to and including `seq` has been applied
    /// to the materialized state (advances the snapshot watermark).
    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// All valid entries with `seq > after`, in order. Stops at the first
    /// corrupt or binary line rather than erroring.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let (entries, _) = read_valid_entries(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.seq > after).collect())
    }

    /// Drop entries with `seq < keep_from`, typically called right after a
    /// snapshot so the journal doesn't grow without bound.
    pub fn truncate_before(&mut self, keep_from: u64) -> Result<(), WalError> {
        let (entries, _) = read_valid_entries(&self.path)?;
        let kept: Vec<WalEntry> = entries.into_iter().filter(|e| e.seq >= keep_from).collect();
        rewrite_clean(&self.path, &kept)?;
        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
