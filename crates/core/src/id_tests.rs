// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn target_display() {
    let target = Target::new("dev01");
    assert_eq!(target.to_string(), "dev01");
}

#[test]
fn target_equality() {
    let a = Target::new("dev01");
    let b = Target::from("dev01");
    let c: Target = "dev02".into();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, "dev01");
}

#[test]
fn target_ordering_is_lexicographic() {
    let mut targets = vec![Target::new("dev02"), Target::new("ber01"), Target::new("dev01")];
    targets.sort();
    let names: Vec<&str> = targets.iter().map(Target::as_str).collect();
    assert_eq!(names, vec!["ber01", "dev01", "dev02"]);
}

#[test]
fn tracking_id_serde_is_transparent() {
    let id = TrackingId::new("T1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"T1\"");

    let parsed: TrackingId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn empty_tracking_id() {
    let id = TrackingId::new("");
    assert!(id.is_empty());
    assert!(!TrackingId::new("T1").is_empty());
}
