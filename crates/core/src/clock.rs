// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.
//!
//! Beyond the monotonic instant used for timer deadlines, drover needs two
//! wall-clock facts: the local hour of day (the connection refresh only runs
//! in the 2:xx a.m. window) and the time remaining until local midnight (the
//! daily metrics reset).

use chrono::{Local, TimeZone, Timelike};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn epoch_secs(&self) -> u64;
    /// Local hour of day, 0–23.
    fn local_hour(&self) -> u32;
    /// Duration until the next local midnight.
    fn until_midnight(&self) -> Duration;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_secs(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
    }

    fn local_hour(&self) -> u32 {
        Local::now().hour()
    }

    fn until_midnight(&self) -> Duration {
        let now = Local::now();
        let next_midnight = now
            .date_naive()
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|naive| Local.from_local_datetime(&naive).earliest());
        match next_midnight {
            Some(midnight) => (midnight - now).to_std().unwrap_or(Duration::from_secs(1)),
            // Unrepresentable local midnight (DST edge); retry in a day.
            None => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

struct FakeClockState {
    now: Instant,
    epoch_secs: u64,
    local_hour: u32,
    until_midnight: Duration,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                now: Instant::now(),
                epoch_secs: 1_000_000,
                local_hour: 12,
                until_midnight: Duration::from_secs(12 * 60 * 60),
            })),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.now += duration;
        state.epoch_secs += duration.as_secs();
    }

    /// Set the local hour of day
    pub fn set_local_hour(&self, hour: u32) {
        self.inner.lock().local_hour = hour;
    }

    /// Set the duration until the next local midnight
    pub fn set_until_midnight(&self, duration: Duration) {
        self.inner.lock().until_midnight = duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().now
    }

    fn epoch_secs(&self) -> u64 {
        self.inner.lock().epoch_secs
    }

    fn local_hour(&self) -> u32 {
        self.inner.lock().local_hour
    }

    fn until_midnight(&self) -> Duration {
        self.inner.lock().until_midnight
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
