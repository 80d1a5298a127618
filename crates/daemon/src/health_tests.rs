// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::Options;
use std::time::Duration;

fn opts() -> Options {
    Options::defaults()
}

#[test]
fn within_fresh_window_is_fresh() {
    let opts = opts();
    let age = opts.health_fresh_window.as_millis() as u64;
    assert_eq!(classify(age, &opts), HealthVerdict::Fresh);
}

#[test]
fn between_fresh_and_stale_window_is_stale() {
    let opts = opts();
    let age = opts.health_stale_window.as_millis() as u64;
    assert_eq!(classify(age, &opts), HealthVerdict::Stale);
}

#[test]
fn past_stale_window_is_lost() {
    let opts = opts();
    let age = opts.health_stale_window.as_millis() as u64 + 1;
    assert_eq!(classify(age, &opts), HealthVerdict::Lost);
}

#[test]
fn fresh_verdict_moves_starting_to_healthy() {
    assert_eq!(
        next_state(InstanceState::Starting, HealthVerdict::Fresh, None, Duration::from_secs(60)),
        InstanceState::Healthy
    );
}

#[test]
fn stale_verdict_degrades_a_healthy_instance() {
    assert_eq!(
        next_state(InstanceState::Healthy, HealthVerdict::Stale, None, Duration::from_secs(60)),
        InstanceState::Degraded
    );
}

#[test]
fn lost_verdict_holds_state_until_recovery_grace_elapses() {
    assert_eq!(
        next_state(
            InstanceState::Degraded,
            HealthVerdict::Lost,
            Some(30_000),
            Duration::from_secs(60)
        ),
        InstanceState::Degraded
    );
}

#[test]
fn lost_verdict_escalates_a_degraded_instance_to_terminating_after_grace() {
    assert_eq!(
        next_state(InstanceState::Degraded, HealthVerdict::Lost, Some(0), Duration::from_millis(0)),
        InstanceState::Terminating
    );
    assert_eq!(
        next_state(
            InstanceState::Degraded,
            HealthVerdict::Lost,
            Some(60_000),
            Duration::from_secs(60)
        ),
        InstanceState::Terminating
    );
}

#[test]
fn terminating_instance_always_advances_to_terminated() {
    assert_eq!(
        next_state(
            InstanceState::Terminating,
            HealthVerdict::Fresh,
            None,
            Duration::from_secs(60)
        ),
        InstanceState::Terminated
    );
    assert_eq!(
        next_state(InstanceState::Terminating, HealthVerdict::Lost, None, Duration::from_secs(60)),
        InstanceState::Terminated
    );
}

#[test]
fn draining_instance_is_never_reclassified() {
    assert_eq!(
        next_state(InstanceState::Draining, HealthVerdict::Lost, None, Duration::from_secs(60)),
        InstanceState::Draining
    );
    assert_eq!(
        next_state(InstanceState::Draining, HealthVerdict::Fresh, None, Duration::from_secs(60)),
        InstanceState::Draining
    );
}

#[test]
fn terminated_instance_is_never_reclassified() {
    assert_eq!(
        next_state(
            InstanceState::Terminated,
            HealthVerdict::Fresh,
            None,
            Duration::from_secs(60)
        ),
        InstanceState::Terminated
    );
}
