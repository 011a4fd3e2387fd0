// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn decode(data: serde_json::Value) -> Result<BusEvent, DecodeError> {
    BusEvent::decode(None, &data)
}

#[test]
fn decodes_request() {
    let event = BusEvent::decode(
        Some(Target::new("dev01")),
        &json!({"id": "request", "cmd": "deploy", "args": ["--tracking-id=T1", "update"]}),
    )
    .unwrap();

    assert_eq!(event.target, Some(Target::new("dev01")));
    assert_eq!(
        event.kind,
        EventKind::Request {
            command: "deploy".into(),
            arguments: vec!["--tracking-id=T1".into(), "update".into()],
        }
    );
}

#[test]
fn request_target_falls_back_to_attribute() {
    let event = decode(json!({"id": "request", "cmd": "deploy", "args": [], "target": "ber02"}))
        .unwrap();
    assert_eq!(event.target, Some(Target::new("ber02")));
}

#[test]
fn subscription_topic_wins_over_target_attribute() {
    let event = BusEvent::decode(
        Some(Target::new("dev01")),
        &json!({"id": "heartbeat", "target": "ber02"}),
    )
    .unwrap();
    assert_eq!(event.target, Some(Target::new("dev01")));
}

#[parameterized(
    request_without_cmd = { json!({"id": "request", "args": []}), "cmd" },
    request_without_args = { json!({"id": "request", "cmd": "deploy"}), "args" },
    request_with_non_string_args = { json!({"id": "request", "cmd": "deploy", "args": [1]}), "args" },
    vote_without_payload = { json!({"id": "vote", "tracking_id": "T1"}), "payload" },
    cmd_without_state = { json!({"id": "cmd", "cmd": "deploy"}), "state" },
    cmd_without_cmd = { json!({"id": "cmd", "state": "started"}), "cmd" },
    service_change_without_payload = { json!({"id": "service-change"}), "payload" },
)]
fn incomplete_events_are_rejected(data: serde_json::Value, attribute: &str) {
    match decode(data) {
        Err(DecodeError::IncompleteEvent { attribute: found, .. }) => {
            assert_eq!(found, attribute);
        }
        other => panic!("expected IncompleteEvent for {attribute}, got {other:?}"),
    }
}

#[parameterized(
    no_id = { json!({"cmd": "deploy"}) },
    non_string_id = { json!({"id": 7}) },
    not_an_object = { json!(["request"]) },
)]
fn events_without_discriminator_are_invalid(data: serde_json::Value) {
    assert!(matches!(decode(data), Err(DecodeError::InvalidEventType { .. })));
}

#[test]
fn decodes_vote() {
    let event = decode(json!({
        "id": "vote",
        "payload": "5f2c9f0a-0a5b-4c3f-9a44-3a0d2f9b7e11",
        "tracking_id": "T1",
        "target": "dev01",
    }))
    .unwrap();

    assert_eq!(
        event.kind,
        EventKind::Vote {
            vote: Vote::from_string("5f2c9f0a-0a5b-4c3f-9a44-3a0d2f9b7e11"),
            tracking_id: Some(TrackingId::new("T1")),
        }
    );
}

#[test]
fn vote_tracking_id_is_optional() {
    let event = decode(json!({"id": "vote", "payload": "abc"})).unwrap();
    assert_eq!(
        event.kind,
        EventKind::Vote { vote: Vote::from_string("abc"), tracking_id: None }
    );
}

#[test]
fn decodes_service_change() {
    let event = decode(json!({
        "id": "service-change",
        "payload": [
            {"uri": "service://dev01/frontend", "state": "up"},
            {"uri": "service://dev01/backend", "state": "down"},
        ],
    }))
    .unwrap();

    match event.kind {
        EventKind::ServiceChange { ref services } => {
            assert_eq!(services.len(), 2);
            assert_eq!(services[0].uri, "service://dev01/frontend");
            assert_eq!(services[1].state, "down");
        }
        other => panic!("expected service change, got {other:?}"),
    }
}

#[test]
fn service_change_payload_entries_are_validated() {
    let missing_state = decode(json!({
        "id": "service-change",
        "payload": [{"uri": "service://dev01/frontend"}],
    }));
    match missing_state {
        Err(DecodeError::PayloadIntegrity { attribute, .. }) => assert_eq!(attribute, "state"),
        other => panic!("expected PayloadIntegrity, got {other:?}"),
    }
}

#[parameterized(
    full_update = { "full-update", EventKind::FullUpdate },
    heartbeat = { "heartbeat", EventKind::Heartbeat },
    call_info = { "call-info", EventKind::CallInfo },
)]
fn decodes_informational_events(id: &str, expected: EventKind) {
    let event = decode(json!({"id": id})).unwrap();
    assert_eq!(event.kind, expected);
}

#[test]
fn unknown_discriminator_is_not_an_error() {
    let event = decode(json!({"id": "spurious-event", "whatever": 1})).unwrap();
    assert_eq!(event.kind, EventKind::Other("spurious-event".into()));
}

#[test]
fn tracking_id_extraction_takes_last_match() {
    let request = Request::builder()
        .arguments(vec![
            "--tracking-id=first".into(),
            "update".into(),
            "--tracking-id=second".into(),
        ])
        .build();
    assert_eq!(request.tracking_id(), Some(TrackingId::new("second")));
}

#[test]
fn tracking_id_extraction_stops_at_second_equals_sign() {
    let request =
        Request::builder().arguments(vec!["--tracking-id=a=b".into()]).build();
    assert_eq!(request.tracking_id(), Some(TrackingId::new("a")));
}

#[test]
fn tracking_id_absent_without_marker_argument() {
    let request = Request::builder().arguments(vec!["update".into()]).build();
    assert_eq!(request.tracking_id(), None);
}

#[test]
fn display_renders_request() {
    let event = BusEvent::decode(
        Some(Target::new("dev01")),
        &json!({"id": "request", "cmd": "deploy", "args": ["update"]}),
    )
    .unwrap();
    assert_eq!(
        event.to_string(),
        "target[dev01] requested command \"deploy\" using arguments [\"update\"]"
    );
}

#[test]
fn display_renders_command_with_and_without_message() {
    let with_message = decode(json!({
        "id": "cmd", "cmd": "deploy", "state": "failed", "message": "boom", "target": "dev01",
    }))
    .unwrap();
    assert_eq!(
        with_message.to_string(),
        "(broadcaster) target[dev01] command \"deploy\" failed: boom"
    );

    let without_message =
        decode(json!({"id": "cmd", "cmd": "deploy", "state": "started", "target": "dev01"}))
            .unwrap();
    assert_eq!(
        without_message.to_string(),
        "(broadcaster) target[dev01] command \"deploy\" started."
    );
}

#[test]
fn display_renders_service_change() {
    let event = decode(json!({
        "id": "service-change",
        "target": "dev01",
        "payload": [{"uri": "service://a", "state": "up"}, {"uri": "service://b", "state": "down"}],
    }))
    .unwrap();
    assert_eq!(
        event.to_string(),
        "target[dev01] services changed: service://a is up, service://b is down"
    );
}

#[test]
fn cmd_state_display() {
    assert_eq!(CmdState::Started.to_string(), "started");
    assert_eq!(CmdState::Failed.to_string(), "failed");
    assert_eq!(CmdState::Finished.to_string(), "finished");
}
