// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Election dispatch: requests, votes, showdowns, cleanup.

use crate::adapters::BusCall;
use crate::engine::test_helpers::setup;
use crate::engine::SHOWDOWN_TIMEOUT;
use drover_core::{CmdState, Target, TrackingId};

// Lexicographically above any canonical vote (hex digits and hyphens).
const HIGHER_VOTE: &str = "zzzzzzzz-vote";
// Strict prefix of any canonical vote, therefore always lower.
const LOWER_VOTE: &str = "0";

#[tokio::test]
async fn request_opens_election_and_broadcasts_vote() {
    let ctx = setup(&["dev01"]);

    ctx.send_request("dev01", &["--tracking-id=T1", "update"]).await;

    assert_eq!(ctx.runtime.election_count(), 1);
    let own_vote = ctx.runtime.election_vote(&Some(TrackingId::new("T1"))).unwrap();
    assert_eq!(
        ctx.bus.calls(),
        vec![BusCall::Vote {
            target: Target::new("dev01"),
            vote: own_vote,
            tracking_id: Some(TrackingId::new("T1")),
        }]
    );
    assert!(ctx.runtime.next_deadline().is_some());
}

#[tokio::test]
async fn request_without_tracking_id_uses_the_nil_key() {
    let ctx = setup(&["dev01"]);

    ctx.send_request("dev01", &["update"]).await;

    assert_eq!(ctx.runtime.election_count(), 1);
    assert!(ctx.runtime.election_vote(&None).is_some());
}

#[tokio::test]
async fn second_request_with_same_tracking_id_overwrites_the_election() {
    let ctx = setup(&["dev01"]);

    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    ctx.send_request("dev01", &["--tracking-id=T1"]).await;

    assert_eq!(ctx.runtime.election_count(), 1);
    let votes = ctx
        .bus
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BusCall::Vote { .. }))
        .count();
    assert_eq!(votes, 2);
}

#[tokio::test]
async fn higher_peer_vote_folds_and_cancels_the_showdown() {
    let mut ctx = setup(&["dev01"]);
    ctx.create_target_dir("dev01");

    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    ctx.send_vote("dev01", HIGHER_VOTE, "T1").await;

    assert_eq!(ctx.runtime.metrics().get("voting_folds"), 1);
    assert_eq!(ctx.runtime.election_count(), 0);

    // The showdown never fires, so nothing starts.
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;
    assert!(ctx.bus.cmd_calls().is_empty());
    assert_eq!(ctx.runtime.metrics().get("voting_wins"), 0);
    assert!(ctx.exit_rx.try_recv().is_err());
}

#[tokio::test]
async fn lower_peer_vote_is_called_and_we_still_execute() {
    let mut ctx = setup(&["dev01"]);
    ctx.create_target_dir("dev01");

    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    ctx.send_vote("dev01", LOWER_VOTE, "T1").await;

    assert_eq!(ctx.runtime.election_count(), 1);
    assert_eq!(ctx.runtime.metrics().get("voting_folds"), 0);

    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;

    assert_eq!(ctx.runtime.metrics().get("voting_wins"), 1);
    match ctx.bus.cmd_calls().first() {
        Some(BusCall::Cmd { state: CmdState::Started, tracking_id, .. }) => {
            assert_eq!(tracking_id, &Some(TrackingId::new("T1")));
        }
        other => panic!("expected a started event, got {other:?}"),
    }
    ctx.reap_child().await;
    assert_eq!(ctx.runtime.election_count(), 0);
}

#[tokio::test]
async fn vote_for_unknown_election_is_dropped() {
    let ctx = setup(&["dev01"]);

    ctx.send_vote("dev01", HIGHER_VOTE, "T-unknown").await;

    assert_eq!(ctx.runtime.metrics().get("voting_folds"), 0);
    assert!(ctx.bus.calls().is_empty());
}

#[tokio::test]
async fn winning_run_publishes_started_output_and_finished() {
    let mut ctx = setup(&["dev01"]);
    ctx.create_target_dir("dev01");

    ctx.send_request("dev01", &["--tracking-id=T1", "full-deploy"]).await;
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;
    ctx.reap_child().await;

    let cmds = ctx.bus.cmd_calls();
    assert_eq!(cmds.len(), 2);
    assert!(matches!(&cmds[0], BusCall::Cmd { state: CmdState::Started, .. }));
    assert!(matches!(&cmds[1], BusCall::Cmd { state: CmdState::Finished, .. }));

    // The deploy script echoed its arguments back over the bus.
    assert!(ctx.bus.calls().iter().any(|call| matches!(
        call,
        BusCall::Output { line, tracking_id, .. }
            if line == "deploying --tracking-id=T1 full-deploy"
                && tracking_id == &Some(TrackingId::new("T1"))
    )));

    let metrics = ctx.runtime.metrics();
    assert_eq!(metrics.get("voting_wins"), 1);
    assert_eq!(metrics.get("commands_started.dev01"), 1);
    assert_eq!(metrics.get("commands_finished.dev01"), 1);
    assert_eq!(ctx.runtime.election_count(), 0);
}

#[tokio::test]
async fn missing_target_directory_fails_without_spawning() {
    let ctx = setup(&["dev01"]);
    // No target directory created.

    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;

    let cmds = ctx.bus.cmd_calls();
    assert_eq!(cmds.len(), 2);
    match &cmds[1] {
        BusCall::Cmd { state: CmdState::Failed, message: Some(message), .. } => {
            assert!(message.contains("target directory"), "message: {message}");
            assert!(message.contains("does not exist"), "message: {message}");
            assert!(message.contains("(agent01)"), "message: {message}");
        }
        other => panic!("expected a failed event, got {other:?}"),
    }
    assert_eq!(ctx.runtime.metrics().get("commands_failed.dev01"), 1);
    // The election is cleaned up immediately; no child ever runs.
    assert_eq!(ctx.runtime.election_count(), 0);
}

#[tokio::test]
async fn update_requests_notify_graphite_once() {
    let mut ctx = setup(&["dev01"]);
    ctx.create_target_dir("dev01");

    ctx.send_request("dev01", &["update", "--tracking-id=T1"]).await;
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;
    ctx.reap_child().await;

    assert_eq!(ctx.graphite.notified(), vec![Target::new("dev01")]);
}

#[tokio::test]
async fn non_update_requests_do_not_notify_graphite() {
    let mut ctx = setup(&["dev01"]);
    ctx.create_target_dir("dev01");

    // "update" is not the first argument here.
    ctx.send_request("dev01", &["--tracking-id=T1", "update"]).await;
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;
    ctx.reap_child().await;

    assert!(ctx.graphite.notified().is_empty());
}

#[tokio::test]
async fn showdown_fires_only_once_per_election() {
    let mut ctx = setup(&["dev01"]);
    ctx.create_target_dir("dev01");

    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;
    // A second pass over the timers finds nothing; the one-shot is gone.
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;
    ctx.reap_child().await;

    assert_eq!(ctx.runtime.metrics().get("voting_wins"), 1);
}

#[tokio::test]
async fn late_votes_after_showdown_are_ignored() {
    let mut ctx = setup(&["dev01"]);
    ctx.create_target_dir("dev01");

    ctx.send_request("dev01", &["--tracking-id=T1"]).await;
    ctx.advance_and_fire(SHOWDOWN_TIMEOUT).await;
    ctx.send_vote("dev01", HIGHER_VOTE, "T1").await;

    assert_eq!(ctx.runtime.metrics().get("voting_folds"), 0);
    ctx.reap_child().await;
    assert_eq!(ctx.runtime.metrics().get("voting_wins"), 1);
}
