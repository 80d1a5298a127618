// SPDX-License-Identifier: MIT

//! Health classification (§4.4).
//!
//! Heartbeats update `last_heartbeat_ms`; the probe tick below turns
//! that single timestamp into a `healthy` / `degraded` / `lost`
//! classification. Classification is a pure function of "how long
//! since we last heard from this instance" so replaying the same
//! heartbeat history always yields the same verdict, regardless of
//! which process evaluated it.

use fleet_core::{InstanceState, Options};
use std::time::Duration;

/// A health verdict for one instance at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Heartbeat seen within the fresh window — stays/returns to `healthy`.
    Fresh,
    /// Heartbeat stale but inside the stale window — becomes `degraded`.
    Stale,
    /// No heartbeat since before the stale window — considered lost.
    Lost,
}

/// Classify an instance from the age of its last heartbeat.
///
/// `age_ms` is `now_ms - last_heartbeat_ms`, saturating at zero so a
/// heartbeat that raced ahead of the probe tick never reads as negative.
pub fn classify(age_ms: u64, opts: &Options) -> HealthVerdict {
    if age_ms <= opts.health_fresh_window.as_millis() as u64 {
        HealthVerdict::Fresh
    } else if age_ms <= opts.health_stale_window.as_millis() as u64 {
        HealthVerdict::Stale
    } else {
        HealthVerdict::Lost
    }
}

/// Map a verdict onto the next lifecycle state, given the instance's
/// current state.
///
/// `starting`/`healthy`/`degraded` instances are reclassified by the
/// verdict directly, except `lost`, which only escalates to
/// `terminating` once `lost_elapsed_ms` (how long the instance has
/// continuously read as `lost`) reaches `recovery_grace` — until then
/// the instance holds its current state, giving a flapping connection
/// a chance to recover (§4.4). `terminating` always advances to
/// `terminated` on the next tick regardless of verdict: by the time an
/// instance is escalated there is nothing left to wait for. `draining`
/// is untouched here — it is only resolved once its in-flight task
/// completes, a transition the caller drives, not a health tick.
/// `terminated` is a fixed point.
///
/// Task reassignment off a newly-`terminating` instance is the
/// caller's responsibility, fired at the moment of escalation.
pub fn next_state(
    current: InstanceState,
    verdict: HealthVerdict,
    lost_elapsed_ms: Option<u64>,
    recovery_grace: Duration,
) -> InstanceState {
    match current {
        InstanceState::Terminating => InstanceState::Terminated,
        InstanceState::Draining | InstanceState::Terminated => current,
        InstanceState::Starting | InstanceState::Healthy | InstanceState::Degraded => {
            match verdict {
                HealthVerdict::Fresh => InstanceState::Healthy,
                HealthVerdict::Stale => InstanceState::Degraded,
                HealthVerdict::Lost => {
                    let elapsed = lost_elapsed_ms.unwrap_or(0);
                    if elapsed >= recovery_grace.as_millis() as u64 {
                        InstanceState::Terminating
                    } else {
                        current
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
