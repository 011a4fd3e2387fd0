// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advance() {
    let clock = FakeClock::new();
    let start = clock.now();
    let epoch = clock.epoch_secs();

    clock.advance(Duration::from_secs(30));

    assert_eq!(clock.now() - start, Duration::from_secs(30));
    assert_eq!(clock.epoch_secs(), epoch + 30);
}

#[test]
fn fake_clock_wall_settings() {
    let clock = FakeClock::new();
    clock.set_local_hour(2);
    clock.set_until_midnight(Duration::from_secs(90));

    assert_eq!(clock.local_hour(), 2);
    assert_eq!(clock.until_midnight(), Duration::from_secs(90));
}

#[test]
fn fake_clock_clones_share_state() {
    let clock = FakeClock::new();
    let other = clock.clone();

    clock.advance(Duration::from_secs(5));

    assert_eq!(other.now(), clock.now());
}

#[test]
fn system_clock_until_midnight_is_within_a_day() {
    let clock = SystemClock;
    let remaining = clock.until_midnight();

    assert!(remaining > Duration::ZERO);
    assert!(remaining <= Duration::from_secs(24 * 60 * 60));
}

#[test]
fn system_clock_hour_in_range() {
    assert!(SystemClock.local_hour() < 24);
}
