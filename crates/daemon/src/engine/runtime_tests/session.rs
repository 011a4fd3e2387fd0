// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session open/lost handling.

use crate::adapters::{BusCall, SessionEvent};
use crate::engine::test_helpers::setup;
use crate::engine::RuntimeError;
use drover_core::Target;
use serde_json::json;

#[tokio::test]
async fn session_open_subscribes_to_allowed_targets_in_sorted_order() {
    let ctx = setup(&["dev02", "ber01", "dev01"]);

    ctx.open_session().await.unwrap();

    assert_eq!(
        ctx.bus.calls(),
        vec![
            BusCall::Subscribe(Target::new("ber01")),
            BusCall::Subscribe(Target::new("dev01")),
            BusCall::Subscribe(Target::new("dev02")),
        ]
    );
}

#[tokio::test]
async fn session_open_without_allowed_targets_is_fatal() {
    let ctx = setup(&[]);

    let result = ctx.open_session().await;

    assert!(matches!(result, Err(RuntimeError::NoAllowedTargets)));
    // No subscribe call happened before the error.
    assert!(ctx.bus.calls().is_empty());
}

#[tokio::test]
async fn session_open_reloads_targets_from_disk() {
    let ctx = setup(&["dev01"]);
    ctx.rewrite_allowed_targets(&["dev01", "ber01"]);

    ctx.open_session().await.unwrap();

    assert_eq!(
        ctx.bus.calls(),
        vec![
            BusCall::Subscribe(Target::new("ber01")),
            BusCall::Subscribe(Target::new("dev01")),
        ]
    );
}

#[tokio::test]
async fn session_open_drops_in_flight_elections() {
    let ctx = setup(&["dev01"]);
    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    assert_eq!(ctx.runtime.election_count(), 1);

    ctx.open_session().await.unwrap();

    assert_eq!(ctx.runtime.election_count(), 0);
}

#[tokio::test]
async fn orphaned_showdown_after_reconnect_does_not_execute() {
    let ctx = setup(&["dev01"]);
    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    ctx.open_session().await.unwrap();

    ctx.advance_and_fire(crate::engine::SHOWDOWN_TIMEOUT).await;

    assert!(ctx.bus.cmd_calls().is_empty());
    assert_eq!(ctx.runtime.metrics().get("voting_wins"), 0);
}

#[tokio::test]
async fn connection_lost_is_not_fatal() {
    let ctx = setup(&["dev01"]);

    let result = ctx
        .runtime
        .handle_session(SessionEvent::Lost { reason: "peer went away".into() })
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn subscribe_target_refuses_unlisted_targets() {
    let ctx = setup(&["dev01"]);

    ctx.runtime.subscribe_target(&Target::new("intruder")).await.unwrap();
    assert!(ctx.bus.calls().is_empty());

    ctx.runtime.subscribe_target(&Target::new("dev01")).await.unwrap();
    assert_eq!(ctx.bus.calls(), vec![BusCall::Subscribe(Target::new("dev01"))]);
}

#[tokio::test]
async fn subscribe_target_sees_targets_added_on_disk() {
    let ctx = setup(&["dev01"]);
    ctx.rewrite_allowed_targets(&["dev01", "fresh01"]);

    ctx.runtime.subscribe_target(&Target::new("fresh01")).await.unwrap();

    assert_eq!(ctx.bus.calls(), vec![BusCall::Subscribe(Target::new("fresh01"))]);
}

#[tokio::test]
async fn unsubscribe_target_forwards_to_the_bus() {
    let ctx = setup(&["dev01"]);

    ctx.runtime.unsubscribe_target(&Target::new("dev01")).await.unwrap();

    assert_eq!(ctx.bus.calls(), vec![BusCall::Unsubscribe(Target::new("dev01"))]);
}

#[tokio::test]
async fn undecodable_events_are_dropped_not_fatal() {
    let ctx = setup(&["dev01"]);

    ctx.send_message("dev01", json!({"no": "discriminator"})).await;
    ctx.send_message("dev01", json!({"id": "request", "cmd": "deploy"})).await;

    assert!(ctx.bus.calls().is_empty());
    assert_eq!(ctx.runtime.election_count(), 0);
}

#[tokio::test]
async fn informational_events_are_only_logged() {
    let ctx = setup(&["dev01"]);

    ctx.send_message("dev01", json!({"id": "heartbeat"})).await;
    ctx.send_message("dev01", json!({"id": "full-update"})).await;
    ctx.send_message(
        "dev01",
        json!({"id": "service-change", "payload": [{"uri": "service://a", "state": "up"}]}),
    )
    .await;
    ctx.send_message("dev01", json!({"id": "cmd", "cmd": "deploy", "state": "started"})).await;
    ctx.send_message("dev01", json!({"id": "something-new"})).await;

    assert!(ctx.bus.calls().is_empty());
}
