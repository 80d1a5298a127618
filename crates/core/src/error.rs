// SPDX-License-Identifier: MIT

//! Error taxonomy shared by the controller, protocol codec, and CLI.
//!
//! A single enum backs every `ERR` reply so the wire code and the
//! CLI exit-code mapping read off one source of truth instead of
//! duplicating the kind list in each component.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kind, not a type name — see spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidSyntax,
    InvalidArgument,
    NotFound,
    Conflict,
    Unavailable,
    Exhausted,
    Unsatisfiable,
    DeadlineExpired,
    Cancelled,
    Internal,
}

crate::simple_display! {
    ErrorKind {
        InvalidSyntax => "invalid-syntax",
        InvalidArgument => "invalid-argument",
        NotFound => "not-found",
        Conflict => "conflict",
        Unavailable => "unavailable",
        Exhausted => "exhausted",
        Unsatisfiable => "unsatisfiable",
        DeadlineExpired => "deadline-expired",
        Cancelled => "cancelled",
        Internal => "internal",
    }
}

impl ErrorKind {
    /// Severity ordering used by the re-classification policy (§7):
    /// a component may only move an error to a *higher or equal*
    /// severity, never downgrade it.
    pub fn severity(self) -> u8 {
        match self {
            ErrorKind::InvalidSyntax => 0,
            ErrorKind::InvalidArgument => 0,
            ErrorKind::NotFound => 1,
            ErrorKind::Cancelled => 1,
            ErrorKind::DeadlineExpired => 2,
            ErrorKind::Conflict => 2,
            ErrorKind::Unavailable => 3,
            ErrorKind::Unsatisfiable => 4,
            ErrorKind::Exhausted => 5,
            ErrorKind::Internal => 6,
        }
    }

    /// Whether this kind is safe to retry locally with backoff.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

/// A classified, user-facing failure.
///
/// Carries the machine-readable [`ErrorKind`] plus a human message and
/// optional structured key/value context rendered into the `ERR` line.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct FleetError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub fields: Vec<(String, String)>,
}

impl FleetError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), fields: Vec::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSyntax, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exhausted, message)
    }

    pub fn unsatisfiable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsatisfiable, message)
    }

    pub fn deadline_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeadlineExpired, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Re-classify this error to `new_kind`, refusing to downgrade severity
    /// (§7 propagation policy). Returns the higher-severity error unchanged.
    pub fn reclassify(self, new_kind: ErrorKind) -> Self {
        if new_kind.severity() >= self.kind.severity() {
            Self { kind: new_kind, ..self }
        } else {
            self
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
