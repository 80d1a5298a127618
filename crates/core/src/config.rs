// SPDX-License-Identifier: MIT

//! Controller configuration schema (§6).
//!
//! This module defines the enumerated option set and its defaults. Actual
//! loading (env > file > default, unknown-key rejection) lives in
//! `fleet-daemon::config` since it performs I/O; this module is the single
//! source of truth for which keys exist and what they mean.

use crate::workspace::IsolationMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// `transport.kind` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    File,
    PubSub,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(TransportKind::File),
            "pubsub" => Ok(TransportKind::PubSub),
            other => Err(format!("unknown transport.kind: {other}")),
        }
    }
}

/// `tags.uniqueness`: whether `launch` rejects a tag set already held by
/// another live instance, or allows duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagsUniqueness {
    None,
    Color,
    Branch,
    /// Composite key: the whole tag set must match, not a subset.
    All,
}

impl std::str::FromStr for TagsUniqueness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TagsUniqueness::None),
            "color" => Ok(TagsUniqueness::Color),
            "branch" => Ok(TagsUniqueness::Branch),
            "all" => Ok(TagsUniqueness::All),
            other => Err(format!("unknown tags.uniqueness: {other}")),
        }
    }
}

/// The complete, enumerated options record (§6). Every field here has a
/// corresponding `fleet.*`/`task.*`/`health.*`/... key and, when not
/// `required`, a documented default.
#[derive(Debug, Clone)]
pub struct Options {
    pub fleet_max_instances: u32,
    pub task_default_max_attempts: u32,
    pub task_per_instance_cap: u32,
    /// How long a task may sit `pending` for lack of a capable instance
    /// before it is surfaced as `unsatisfiable` (§4.2).
    pub task_unsatisfiable_wait: Duration,
    pub health_fresh_window: Duration,
    pub health_stale_window: Duration,
    pub health_probe_interval: Duration,
    pub health_probe_deadline: Duration,
    pub health_recovery_grace: Duration,
    pub workspace_root: PathBuf,
    pub workspace_isolation: IsolationMode,
    pub workspace_retain_on_failure: bool,
    pub transport_kind: TransportKind,
    pub transport_file_inbox: Option<PathBuf>,
    pub transport_file_outbox: Option<PathBuf>,
    pub transport_file_events: Option<PathBuf>,
    pub journal_path: PathBuf,
    pub tags_uniqueness: TagsUniqueness,
}

/// Every recognized configuration key, for the "unknown options fail fast" rule.
pub const OPTION_KEYS: &[&str] = &[
    "fleet.max-instances",
    "task.default-max-attempts",
    "task.per-instance-cap",
    "task.unsatisfiable-wait",
    "health.fresh-window",
    "health.stale-window",
    "health.probe-interval",
    "health.probe-deadline",
    "health.recovery-grace",
    "workspace.root",
    "workspace.isolation",
    "workspace.retain-on-failure",
    "transport.kind",
    "transport.file.inbox",
    "transport.file.outbox",
    "transport.file.events",
    "journal.path",
    "tags.uniqueness",
];

impl Options {
    /// Defaults for every option that has one; `workspace.root`,
    /// `journal.path`, and the `transport.file.*` paths are required and
    /// left unset here.
    pub fn defaults() -> Self {
        Self {
            fleet_max_instances: 16,
            task_default_max_attempts: 3,
            task_per_instance_cap: 4,
            task_unsatisfiable_wait: Duration::from_secs(300),
            health_fresh_window: Duration::from_secs(10),
            health_stale_window: Duration::from_secs(30),
            health_probe_interval: Duration::from_secs(5),
            health_probe_deadline: Duration::from_secs(2),
            health_recovery_grace: Duration::from_secs(60),
            workspace_root: PathBuf::new(),
            workspace_isolation: IsolationMode::Linked,
            workspace_retain_on_failure: true,
            transport_kind: TransportKind::File,
            transport_file_inbox: None,
            transport_file_outbox: None,
            transport_file_events: None,
            journal_path: PathBuf::new(),
            tags_uniqueness: TagsUniqueness::None,
        }
    }
}

/// Parse a duration string like `30s`, `5m`, `1h`, `2d`, or a bare integer
/// (seconds). Shared by config loading and protocol flag parsing.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));
    let num: u64 =
        num_str.parse().map_err(|_| format!("invalid number in duration: {s}"))?;
    let multiplier = match suffix.trim() {
        "ms" | "millis" => return Ok(Duration::from_millis(num)),
        "" | "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hr" | "hrs" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {other}")),
    };
    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
