// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring maintenance timers: flush, reset, connection refresh.

use crate::adapters::BusCall;
use crate::engine::test_helpers::setup;
use crate::engine::{CONNECTION_REFRESH_INTERVAL, METRICS_FLUSH_INTERVAL, REFRESH_HOUR};
use std::time::Duration;

#[tokio::test]
async fn start_arms_timers_without_firing_anything() {
    let ctx = setup(&["dev01"]);
    ctx.runtime.metrics().count("voting_wins");

    ctx.runtime.start();
    ctx.advance_and_fire(Duration::ZERO).await;

    // Nothing flushed, reset, or refreshed at startup.
    assert!(!ctx.metrics_file().exists());
    assert_eq!(ctx.runtime.metrics().get("voting_wins"), 1);
    assert!(ctx.bus.calls().is_empty());
}

#[tokio::test]
async fn metrics_flush_writes_the_snapshot_and_rearms() {
    let ctx = setup(&["dev01"]);
    ctx.runtime.start();
    ctx.runtime.metrics().count("voting_wins");

    ctx.advance_and_fire(METRICS_FLUSH_INTERVAL).await;

    let snapshot = std::fs::read_to_string(ctx.metrics_file()).unwrap();
    assert!(snapshot.contains("voting_wins=1\n"), "snapshot: {snapshot}");

    // The timer re-armed itself; the flush duration recorded by the first
    // write shows up in the second snapshot.
    ctx.runtime.metrics().count("voting_wins");
    ctx.advance_and_fire(METRICS_FLUSH_INTERVAL).await;
    let snapshot = std::fs::read_to_string(ctx.metrics_file()).unwrap();
    assert!(snapshot.contains("voting_wins=2\n"), "snapshot: {snapshot}");
    assert!(snapshot.contains("last_write_duration="), "snapshot: {snapshot}");
}

#[tokio::test]
async fn metrics_flush_is_skipped_when_unconfigured() {
    let ctx = crate::engine::test_helpers::setup_without_metrics(&["dev01"]);
    ctx.runtime.start();
    ctx.runtime.metrics().count("voting_wins");

    ctx.advance_and_fire(METRICS_FLUSH_INTERVAL).await;

    assert!(!ctx.metrics_file().exists());
}

#[tokio::test]
async fn metrics_reset_fires_at_midnight_and_rearms_for_the_next_day() {
    let ctx = setup(&["dev01"]);
    ctx.clock.set_until_midnight(Duration::from_secs(60));
    ctx.runtime.start();
    ctx.runtime.metrics().count("voting_wins");

    ctx.advance_and_fire(Duration::from_secs(60)).await;
    assert_eq!(ctx.runtime.metrics().render(), "voting_wins=0\n");

    // Re-armed for the following midnight.
    ctx.clock.set_until_midnight(Duration::from_secs(24 * 60 * 60));
    ctx.runtime.metrics().count("commands_started.dev01");
    ctx.advance_and_fire(Duration::from_secs(24 * 60 * 60)).await;
    assert_eq!(ctx.runtime.metrics().get("commands_started.dev01"), 0);
}

#[tokio::test]
async fn connection_refresh_closes_the_session_at_the_refresh_hour() {
    let ctx = setup(&["dev01"]);
    ctx.clock.set_local_hour(REFRESH_HOUR);
    ctx.runtime.start();

    ctx.advance_and_fire(CONNECTION_REFRESH_INTERVAL).await;

    assert_eq!(ctx.bus.calls(), vec![BusCall::Close]);
}

#[tokio::test]
async fn connection_refresh_outside_the_window_is_a_noop() {
    let ctx = setup(&["dev01"]);
    ctx.clock.set_local_hour(12);
    ctx.runtime.start();

    ctx.advance_and_fire(CONNECTION_REFRESH_INTERVAL).await;

    assert!(ctx.bus.calls().is_empty());

    // It re-armed: an hour later, inside the window, it closes.
    ctx.clock.set_local_hour(REFRESH_HOUR);
    ctx.advance_and_fire(CONNECTION_REFRESH_INTERVAL).await;
    assert_eq!(ctx.bus.calls(), vec![BusCall::Close]);
}

#[tokio::test]
async fn connection_refresh_skips_when_disconnected() {
    let ctx = setup(&["dev01"]);
    ctx.clock.set_local_hour(REFRESH_HOUR);
    ctx.bus.set_connected(false);
    ctx.runtime.start();

    ctx.advance_and_fire(CONNECTION_REFRESH_INTERVAL).await;

    assert!(ctx.bus.calls().is_empty());
}
