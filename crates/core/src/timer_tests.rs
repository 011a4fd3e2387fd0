// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn factory_methods_format() {
    assert_eq!(
        TimerId::showdown(Some(&TrackingId::new("T1"))).as_str(),
        "showdown:T1"
    );
    assert_eq!(TimerId::showdown(None).as_str(), "showdown:");
    assert_eq!(TimerId::metrics_flush().as_str(), "metrics-flush");
    assert_eq!(TimerId::metrics_reset().as_str(), "metrics-reset");
    assert_eq!(TimerId::connection_refresh().as_str(), "connection-refresh");
}

#[parameterized(
    showdown_with_id = { "showdown:T1" },
    showdown_without_id = { "showdown:" },
    metrics_flush = { "metrics-flush" },
    metrics_reset = { "metrics-reset" },
    connection_refresh = { "connection-refresh" },
)]
fn kind_round_trips(id: &str) {
    let kind = TimerKind::parse(id).unwrap();
    assert_eq!(kind.to_timer_id().as_str(), id);
}

#[test]
fn showdown_kind_carries_tracking_id() {
    assert_eq!(
        TimerId::showdown(Some(&TrackingId::new("T1"))).kind(),
        Some(TimerKind::Showdown { tracking_id: Some("T1") })
    );
    assert_eq!(
        TimerId::showdown(None).kind(),
        Some(TimerKind::Showdown { tracking_id: None })
    );
}

#[test]
fn unknown_formats_do_not_parse() {
    assert_eq!(TimerKind::parse("liveness:job-1"), None);
    assert_eq!(TimerKind::parse(""), None);
}
