// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-cli: `fleetctl`, a thin stdin-in/stdout-out client over the
//! file-drop transport (§6). `main.rs` owns argument parsing and process
//! exit; this library owns the client and the run loop so both can be
//! exercised without a real filesystem-backed daemon in tests.

pub mod client;
pub mod exit_error;
pub mod run;

pub use client::{ClientError, DaemonClient};
pub use exit_error::ExitError;
pub use run::{run, ExitCode};
