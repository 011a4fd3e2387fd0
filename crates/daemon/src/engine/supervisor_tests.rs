// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{BusCall, FakeBus};

fn shell_config(cwd: &std::path::Path, script: &str) -> ProcessConfig {
    ProcessConfig::new("/bin/sh", "-c", cwd.to_path_buf(), Target::new("dev01"))
        .command("deploy")
        .arguments(vec![script.to_string()])
        .tracking_id(TrackingId::new("T1"))
}

async fn run(config: ProcessConfig) -> (FakeBus, MetricRegistry) {
    let bus = FakeBus::new();
    let metrics = MetricRegistry::new();
    supervise(Arc::new(bus.clone()), metrics.clone(), config).await;
    (bus, metrics)
}

#[tokio::test]
async fn zero_exit_publishes_finished() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, metrics) = run(shell_config(dir.path(), "exit 0")).await;

    assert_eq!(
        bus.cmd_calls(),
        vec![BusCall::Cmd {
            target: Target::new("dev01"),
            command: "deploy".into(),
            state: CmdState::Finished,
            message: None,
            tracking_id: Some(TrackingId::new("T1")),
        }]
    );
    assert_eq!(metrics.get("commands_finished.dev01"), 1);
    assert_eq!(metrics.get("commands_failed.dev01"), 0);
}

#[tokio::test]
async fn nonzero_exit_publishes_failed_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, metrics) = run(shell_config(dir.path(), "exit 3")).await;

    match bus.cmd_calls().as_slice() {
        [BusCall::Cmd { state: CmdState::Failed, message: Some(message), .. }] => {
            assert!(message.contains("exited with code 3"), "message: {message}");
        }
        other => panic!("expected a single failed event, got {other:?}"),
    }
    assert_eq!(metrics.get("commands_failed.dev01"), 1);
    assert_eq!(metrics.get("commands_finished.dev01"), 0);
}

#[tokio::test]
async fn spawn_error_publishes_failed_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProcessConfig::new(
        "/nonexistent/interpreter",
        "deploy.py",
        dir.path().to_path_buf(),
        Target::new("dev01"),
    )
    .command("deploy");
    let (bus, metrics) = run(config).await;

    match bus.cmd_calls().as_slice() {
        [BusCall::Cmd { state: CmdState::Failed, message: Some(message), .. }] => {
            assert!(message.contains("failed to spawn"), "message: {message}");
            assert!(message.contains("/nonexistent/interpreter deploy.py"));
        }
        other => panic!("expected a single failed event, got {other:?}"),
    }
    assert_eq!(metrics.get("commands_failed.dev01"), 1);
}

#[tokio::test]
async fn output_lines_are_streamed_with_the_tracking_id() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, _) = run(shell_config(dir.path(), "echo one; echo two >&2")).await;

    let outputs: Vec<BusCall> = bus
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BusCall::Output { .. }))
        .collect();
    let mut lines: Vec<String> = outputs
        .iter()
        .map(|call| match call {
            BusCall::Output { line, tracking_id, .. } => {
                assert_eq!(tracking_id, &Some(TrackingId::new("T1")));
                line.clone()
            }
            _ => unreachable!(),
        })
        .collect();
    lines.sort();
    assert_eq!(lines, vec!["one", "two"]);
}

#[tokio::test]
async fn partial_trailing_line_is_flushed() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, _) = run(shell_config(dir.path(), "printf 'no newline'")).await;

    assert!(bus.calls().iter().any(|call| matches!(
        call,
        BusCall::Output { line, .. } if line == "no newline"
    )));
}

#[tokio::test]
async fn output_is_published_before_the_terminal_event() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, _) = run(shell_config(dir.path(), "echo done")).await;

    let calls = bus.calls();
    let last = calls.last().unwrap();
    assert!(matches!(last, BusCall::Cmd { state: CmdState::Finished, .. }), "last: {last:?}");
}

#[tokio::test]
async fn child_runs_in_the_target_directory_with_empty_environment() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = std::fs::canonicalize(dir.path()).unwrap();
    let (bus, _) = run(shell_config(dir.path(), "pwd; printf 'HOME=%s\\n' \"$HOME\"")).await;

    let lines: Vec<String> = bus
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BusCall::Output { line, .. } => Some(line),
            _ => None,
        })
        .collect();
    assert!(lines.contains(&canonical.display().to_string()), "lines: {lines:?}");
    // env_clear leaves $HOME unset for the child.
    assert!(lines.contains(&"HOME=".to_string()), "lines: {lines:?}");
}

#[tokio::test]
async fn exactly_one_terminal_event_per_child() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, _) = run(shell_config(dir.path(), "echo out; exit 7")).await;

    assert_eq!(bus.cmd_calls().len(), 1);
}

#[test]
fn command_line_joins_argv() {
    let config = ProcessConfig::new(
        "/usr/bin/python3",
        "/usr/bin/deploy",
        PathBuf::from("/srv/targets/dev01"),
        Target::new("dev01"),
    )
    .arguments(vec!["--tracking-id=T1".into(), "update".into()]);

    assert_eq!(config.command_line(), "/usr/bin/python3 /usr/bin/deploy --tracking-id=T1 update");
}
