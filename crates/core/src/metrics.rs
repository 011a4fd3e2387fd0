// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide operational counters.
//!
//! A single registry is shared by the dispatcher and the subprocess
//! supervisor. Keys are created on first increment; the daily reset drops
//! keys that never moved and zeroes the rest, so the snapshot only carries
//! counters that were live at some point during the day.

use crate::id::Target;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

pub const VOTING_WINS: &str = "voting_wins";
pub const VOTING_FOLDS: &str = "voting_folds";
pub const LAST_WRITE_DURATION: &str = "last_write_duration";

pub fn commands_started_key(target: &Target) -> String {
    format!("commands_started.{target}")
}

pub fn commands_failed_key(target: &Target) -> String {
    format!("commands_failed.{target}")
}

pub fn commands_finished_key(target: &Target) -> String {
    format!("commands_finished.{target}")
}

/// Shared counter map. Cheap to clone; all clones see the same counters.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    inner: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one, creating it at zero first if absent.
    pub fn count(&self, key: &str) {
        let mut counters = self.inner.lock();
        *counters.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Overwrite a counter with an absolute value.
    pub fn set(&self, key: &str, value: u64) {
        self.inner.lock().insert(key.to_string(), value);
    }

    /// Current value of a counter; absent counters read as zero.
    pub fn get(&self, key: &str) -> u64 {
        self.inner.lock().get(key).copied().unwrap_or(0)
    }

    /// Render the snapshot as `name=value` lines, sorted by name.
    pub fn render(&self) -> String {
        let counters = self.inner.lock();
        let mut out = String::new();
        for (name, value) in counters.iter() {
            out.push_str(name);
            out.push('=');
            out.push_str(&value.to_string());
            out.push('\n');
        }
        out
    }

    /// Daily reset: delete keys that are still zero, zero the rest.
    pub fn reset(&self) {
        let mut counters = self.inner.lock();
        counters.retain(|_, value| *value != 0);
        for value in counters.values_mut() {
            *value = 0;
        }
    }

    /// Write the snapshot to `path`, atomically replacing the previous file
    /// via a sibling temp file and rename.
    pub fn write_snapshot(&self, path: &Path) -> io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, self.render())?;
        std::fs::rename(&tmp, path)
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
