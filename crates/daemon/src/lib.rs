// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-daemon: the controller process (`fleetd`).
//!
//! Owns the materialized fleet state, the write-ahead journal, task
//! distribution, health monitoring, workspace provisioning, and the
//! transport adapters that carry the text protocol to and from
//! `fleetctl`. `main.rs` is a thin binary wrapper around this library.

pub mod config;
pub mod controller;
pub mod distributor;
pub mod health;
pub mod state;
pub mod storage;
pub mod transport;
pub mod workspace_manager;

pub use controller::{apply_action, apply_health_tick, ApplyContext, Controller};
pub use state::FleetState;
