// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadline bookkeeping for the runtime loop.
//!
//! A plain map from timer id to deadline instant. The loop sleeps until
//! [`Scheduler::next_deadline`] and collects what came due with
//! [`Scheduler::fired_timers`]; recurring timers re-arm themselves in their
//! handlers. Setting a timer that already exists replaces its deadline.

use drover_core::TimerId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Pending timers keyed by id.
#[derive(Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a timer to fire `duration` after `now`.
    pub fn set_timer(&mut self, id: impl Into<TimerId>, duration: Duration, now: Instant) {
        self.timers.insert(id.into(), now + duration);
    }

    /// Cancel a pending timer; unknown ids are a no-op.
    pub fn cancel_timer(&mut self, id: &str) {
        self.timers.remove(id);
    }

    /// Remove and return all timers due at `now`, earliest deadline first.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired: Vec<(TimerId, Instant)> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (id.clone(), *deadline))
            .collect();
        fired.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        for (id, _) in &fired {
            self.timers.remove(id.as_str());
        }
        fired.into_iter().map(|(id, _)| id).collect()
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    // NOTE: exercised in tests
    #[allow(dead_code)]
    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
