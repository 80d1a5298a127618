// SPDX-License-Identifier: MIT

//! `ResultMsg` — the correlated reply to an [`crate::action::Action`].

use crate::action::CorrelationId;
use crate::error::FleetError;
use serde::{Deserialize, Serialize};

/// Outcome of processing an `Action` (§3, §4.5 encoding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Error(FleetError),
    /// A non-terminal chunk of a streamed reply (`status`, `subscribe`); always
    /// followed by exactly one terminal `Ok`/`Error` for the same correlation id.
    Partial,
}

/// A single correlated reply. One `Action` produces one or more `ResultMsg`s
/// (multiple only when earlier ones are `Status::Partial`), per P5/L-series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMsg {
    pub correlation_id: CorrelationId,
    pub status: Status,
    pub message: String,
    pub fields: Vec<(String, String)>,
    pub timestamp_ms: u64,
}

impl ResultMsg {
    pub fn ok(
        correlation_id: CorrelationId,
        message: impl Into<String>,
        fields: Vec<(String, String)>,
        timestamp_ms: u64,
    ) -> Self {
        Self { correlation_id, status: Status::Ok, message: message.into(), fields, timestamp_ms }
    }

    pub fn error(correlation_id: CorrelationId, error: FleetError, timestamp_ms: u64) -> Self {
        let fields = error.fields.clone();
        let message = error.message.clone();
        Self { correlation_id, status: Status::Error(error), message, fields, timestamp_ms }
    }

    pub fn partial(
        correlation_id: CorrelationId,
        message: impl Into<String>,
        fields: Vec<(String, String)>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            correlation_id,
            status: Status::Partial,
            message: message.into(),
            fields,
            timestamp_ms,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, Status::Partial)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, Status::Error(_))
    }
}

#[cfg(test)]
#[path = "result_msg_tests.rs"]
mod tests;
