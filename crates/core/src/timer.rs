// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifier type for tracking scheduled timers.
//!
//! TimerId uniquely identifies a timer instance: the per-election showdown
//! deadline and the three recurring maintenance timers. Showdown timers
//! embed the election key so a fold can cancel exactly its own deadline.

use crate::id::TrackingId;

crate::define_id! {
    /// Unique identifier for a timer instance.
    pub struct TimerId;
}

const SHOWDOWN_PREFIX: &str = "showdown:";
const METRICS_FLUSH: &str = "metrics-flush";
const METRICS_RESET: &str = "metrics-reset";
const CONNECTION_REFRESH: &str = "connection-refresh";

impl TimerId {
    /// Showdown deadline for the election keyed by `tracking_id`.
    ///
    /// Elections without a tracking id share the bare `showdown:` timer,
    /// mirroring their shared `None` election key.
    pub fn showdown(tracking_id: Option<&TrackingId>) -> Self {
        match tracking_id {
            Some(id) => Self::new(format!("{SHOWDOWN_PREFIX}{id}")),
            None => Self::new(SHOWDOWN_PREFIX),
        }
    }

    pub fn metrics_flush() -> Self {
        Self::new(METRICS_FLUSH)
    }

    pub fn metrics_reset() -> Self {
        Self::new(METRICS_RESET)
    }

    pub fn connection_refresh() -> Self {
        Self::new(CONNECTION_REFRESH)
    }

    /// Parse this timer ID into a typed `TimerKind`.
    pub fn kind(&self) -> Option<TimerKind<'_>> {
        TimerKind::parse(self.as_str())
    }
}

/// Parsed representation of a timer ID for type-safe routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind<'a> {
    Showdown { tracking_id: Option<&'a str> },
    MetricsFlush,
    MetricsReset,
    ConnectionRefresh,
}

impl<'a> TimerKind<'a> {
    /// Parse a timer ID string into a typed `TimerKind`.
    ///
    /// Returns `None` for unrecognized timer ID formats.
    pub fn parse(id: &'a str) -> Option<TimerKind<'a>> {
        if let Some(rest) = id.strip_prefix(SHOWDOWN_PREFIX) {
            let tracking_id = if rest.is_empty() { None } else { Some(rest) };
            return Some(TimerKind::Showdown { tracking_id });
        }
        match id {
            METRICS_FLUSH => Some(TimerKind::MetricsFlush),
            METRICS_RESET => Some(TimerKind::MetricsReset),
            CONNECTION_REFRESH => Some(TimerKind::ConnectionRefresh),
            _ => None,
        }
    }

    /// Format this `TimerKind` back into a canonical `TimerId`.
    pub fn to_timer_id(&self) -> TimerId {
        match self {
            TimerKind::Showdown { tracking_id } => {
                TimerId::showdown(tracking_id.map(TrackingId::new).as_ref())
            }
            TimerKind::MetricsFlush => TimerId::metrics_flush(),
            TimerKind::MetricsReset => TimerId::metrics_reset(),
            TimerKind::ConnectionRefresh => TimerId::connection_refresh(),
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
