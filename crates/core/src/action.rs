// SPDX-License-Identifier: MIT

//! `Action` — the single request type crossing the transport boundary.

use crate::instance::{InstanceId, Tags};
use crate::task::{TaskId, TaskOutcome, TaskSpec};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier linking an `Action` to its `Result`(s). Unique within a process lifetime (I6).
    pub struct CorrelationId("cor-");
}

/// Termination mode for the `terminate` verb (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationMode {
    Graceful,
    Force,
}

crate::simple_display! {
    TerminationMode {
        Graceful => "graceful",
        Force => "force",
    }
}

impl std::str::FromStr for TerminationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graceful" => Ok(TerminationMode::Graceful),
            "force" => Ok(TerminationMode::Force),
            other => Err(format!("unknown termination mode: {other}")),
        }
    }
}

/// What a `status` action should match (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    All,
    Instance(String),
    Task(String),
}

/// The verb-specific payload of an [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verb {
    Launch { capabilities: Vec<String>, tags: Tags, source_ref: String },
    Terminate { instance_id: InstanceId, mode: TerminationMode },
    Submit { spec: TaskSpec },
    Cancel { task_id: TaskId },
    Status { selector: Selector },
    Heartbeat { instance_id: InstanceId, observed_load: u32, progress: Option<String> },
    Complete { task_id: TaskId, outcome: TaskOutcome },
    Subscribe,
    Help { verb: Option<String> },
}

impl Verb {
    /// The canonical verb name as it appears on the wire (§4.5).
    pub fn name(&self) -> &'static str {
        match self {
            Verb::Launch { .. } => "launch",
            Verb::Terminate { .. } => "terminate",
            Verb::Submit { .. } => "submit",
            Verb::Cancel { .. } => "cancel",
            Verb::Status { .. } => "status",
            Verb::Heartbeat { .. } => "heartbeat",
            Verb::Complete { .. } => "complete",
            Verb::Subscribe => "subscribe",
            Verb::Help { .. } => "help",
        }
    }
}

/// An incoming request, decoded from the wire (§3, §4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub correlation_id: CorrelationId,
    pub issuer: String,
    pub verb: Verb,
}

impl Action {
    pub fn new(issuer: impl Into<String>, verb: Verb) -> Self {
        Self { correlation_id: CorrelationId::new(), issuer: issuer.into(), verb }
    }
}

pub const CANONICAL_VERBS: &[&str] = &[
    "launch", "terminate", "submit", "cancel", "status", "heartbeat", "complete", "subscribe",
    "help",
];

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
