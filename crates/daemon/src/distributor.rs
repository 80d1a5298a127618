// SPDX-License-Identifier: MIT

//! Task-to-instance assignment (§4.2).
//!
//! Pure decision logic: given a task's requirements and the current
//! fleet, pick one instance or explain why none qualifies. Kept free of
//! I/O and of `FleetState` mutation so the scoring rules can be tested
//! in isolation from the controller loop that applies the decision.

use fleet_core::{ErrorKind, FleetError, Instance, InstanceId};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// How many of an instance's most recent attempts of a task's kind feed the
/// failure-rate tiebreak (§4.2).
pub const FAILURE_RATE_WINDOW: usize = 20;

fn failure_ratio(failed: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(failed) / f64::from(total)
    }
}

/// Assign one instance to a task requiring `required` capabilities.
///
/// Eligibility is a two-stage filter: an instance must be schedulable,
/// declare every required capability, and sit below `per_instance_cap`
/// concurrent tasks. Ties among eligible instances are broken, in
/// order: lowest current load, lower recent failure rate for the
/// task's kind (windowed, an instance with no history scores as zero),
/// fewest total capabilities (a generalist stays free for other work),
/// fewest consecutive probe failures, longest since last assignment,
/// then lexicographic instance id, so the same fleet snapshot always
/// yields the same pick.
pub fn assign<'a>(
    kind: &str,
    required: &BTreeSet<String>,
    instances: impl Iterator<Item = &'a Instance> + Clone,
    per_instance_cap: u32,
    failure_rate: impl Fn(&str, InstanceId) -> (u32, u32),
) -> Result<InstanceId, FleetError> {
    let any_capable = instances.clone().any(|i| i.has_capabilities(required));
    if !any_capable {
        let declared: BTreeSet<String> =
            instances.clone().flat_map(|i| i.capabilities.iter().cloned()).collect();
        let unmet: Vec<&String> = required.difference(&declared).collect();
        let unmet_str = unmet.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",");
        return Err(FleetError::new(
            ErrorKind::Unsatisfiable,
            "no instance in the fleet declares the required capabilities",
        )
        .with_field("unmet", unmet_str));
    }

    let mut eligible: Vec<&Instance> = instances
        .filter(|i| {
            i.state.is_schedulable()
                && i.has_capabilities(required)
                && i.current_load < per_instance_cap
        })
        .collect();

    if eligible.is_empty() {
        return Err(FleetError::new(
            ErrorKind::Unavailable,
            "no eligible instance currently has spare capacity",
        ));
    }

    eligible.sort_by(|a, b| {
        let (a_failed, a_total) = failure_rate(kind, a.id);
        let (b_failed, b_total) = failure_rate(kind, b.id);
        let a_rate = failure_ratio(a_failed, a_total);
        let b_rate = failure_ratio(b_failed, b_total);

        a.current_load
            .cmp(&b.current_load)
            .then(a_rate.partial_cmp(&b_rate).unwrap_or(Ordering::Equal))
            .then(a.capability_specificity().cmp(&b.capability_specificity()))
            .then(a.consecutive_probe_failures.cmp(&b.consecutive_probe_failures))
            .then(a.last_assigned_at_ms.cmp(&b.last_assigned_at_ms))
            .then(a.id.as_str().cmp(b.id.as_str()))
    });

    Ok(eligible[0].id)
}

#[cfg(test)]
#[path = "distributor_tests.rs"]
mod tests;
