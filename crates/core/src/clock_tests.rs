// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn fake_clock_advances_both_instant_and_epoch() {
    let clock = FakeClock::new();
    let before = clock.now();
    let epoch_before = clock.epoch_ms();
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now(), before + Duration::from_secs(5));
    assert_eq!(clock.epoch_ms(), epoch_before + 5000);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn system_clock_epoch_is_plausible() {
    let clock = SystemClock;
    // Any time after 2020-01-01.
    assert!(clock.epoch_ms() > 1_577_836_800_000);
}
