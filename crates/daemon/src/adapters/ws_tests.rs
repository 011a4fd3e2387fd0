// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn control_frames_carry_type_and_target() {
    assert_eq!(
        control_frame("subscribe", &Target::new("dev01")),
        json!({"type": "subscribe", "target": "dev01"})
    );
    assert_eq!(
        control_frame("unsubscribe", &Target::new("ber02")),
        json!({"type": "unsubscribe", "target": "ber02"})
    );
}

#[test]
fn publish_frame_wraps_the_event() {
    let frame = publish_frame(&Target::new("dev01"), json!({"id": "heartbeat"}));
    assert_eq!(
        frame,
        json!({"type": "publish", "target": "dev01", "event": {"id": "heartbeat"}})
    );
}

#[test]
fn cmd_event_omits_absent_fields() {
    assert_eq!(
        cmd_event("deploy", CmdState::Started, None, None),
        json!({"id": "cmd", "cmd": "deploy", "state": "started"})
    );
    assert_eq!(
        cmd_event(
            "deploy",
            CmdState::Failed,
            Some("boom"),
            Some(&TrackingId::new("T1")),
        ),
        json!({
            "id": "cmd",
            "cmd": "deploy",
            "state": "failed",
            "message": "boom",
            "tracking_id": "T1",
        })
    );
}

#[test]
fn vote_and_output_events() {
    assert_eq!(
        vote_event(&Vote::from_string("abc"), Some(&TrackingId::new("T1"))),
        json!({"id": "vote", "payload": "abc", "tracking_id": "T1"})
    );
    assert_eq!(
        output_event("a line", None),
        json!({"id": "output", "payload": "a line"})
    );
}

#[test]
fn parse_frame_extracts_topic_and_event() {
    let (topic, event) =
        parse_frame(r#"{"target": "dev01", "event": {"id": "heartbeat"}}"#).unwrap();
    assert_eq!(topic, Some(Target::new("dev01")));
    assert_eq!(event, json!({"id": "heartbeat"}));
}

#[test]
fn parse_frame_tolerates_missing_topic() {
    let (topic, event) = parse_frame(r#"{"event": {"id": "full-update"}}"#).unwrap();
    assert_eq!(topic, None);
    assert_eq!(event, json!({"id": "full-update"}));
}

#[test]
fn parse_frame_rejects_garbage() {
    assert!(parse_frame("not json").is_none());
    assert!(parse_frame(r#"{"target": "dev01"}"#).is_none());
    assert!(parse_frame("[1, 2]").is_none());
}

#[test]
fn outbound_events_decode_with_the_core_decoder() {
    // What we publish must be decodable by the receiving replicas.
    let event = vote_event(&Vote::from_string("abc"), Some(&TrackingId::new("T1")));
    let decoded = drover_core::BusEvent::decode(Some(Target::new("dev01")), &event).unwrap();
    assert_eq!(
        decoded.kind,
        drover_core::EventKind::Vote {
            vote: Vote::from_string("abc"),
            tracking_id: Some(TrackingId::new("T1")),
        }
    );

    let event = cmd_event("deploy", CmdState::Finished, None, None);
    let decoded = drover_core::BusEvent::decode(Some(Target::new("dev01")), &event).unwrap();
    assert!(matches!(decoded.kind, drover_core::EventKind::Command { .. }));

    // Output events are informational for peers; unknown discriminator is fine.
    let event = output_event("line", None);
    let decoded = drover_core::BusEvent::decode(Some(Target::new("dev01")), &event).unwrap();
    assert_eq!(decoded.kind, drover_core::EventKind::Other("output".into()));
}
