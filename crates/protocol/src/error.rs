// SPDX-License-Identifier: MIT

//! Protocol-level error wrapping (§4.5, §7).
//!
//! Decode failures need a character offset for operator-facing diagnostics
//! that a bare [`fleet_core::FleetError`] doesn't carry, so this wraps one
//! with the offset of the token that caused it.

use fleet_core::FleetError;

#[derive(Debug, Clone, thiserror::Error)]
#[error("at {offset}: {source}")]
pub struct DecodeError {
    pub offset: usize,
    #[source]
    pub source: FleetError,
}

impl DecodeError {
    pub fn new(offset: usize, source: FleetError) -> Self {
        Self { offset, source }
    }

    pub fn into_fleet_error(self) -> FleetError {
        self.source.with_field("offset", self.offset.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
