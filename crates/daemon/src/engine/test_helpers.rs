// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine.

use crate::adapters::{FakeBus, FakeGraphite, SessionEvent};
use crate::engine::{ChildExit, Runtime, RuntimeDeps, RuntimeError};
use drover_core::{Config, FakeClock, Target};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Convenience alias for the fully-typed test runtime.
pub(crate) type TestRuntime = Runtime<FakeBus, FakeGraphite, FakeClock>;

/// Test context holding the runtime, adapters, and the on-disk config.
pub(crate) struct TestContext {
    pub runtime: TestRuntime,
    pub clock: FakeClock,
    pub bus: FakeBus,
    pub graphite: FakeGraphite,
    pub exit_rx: mpsc::Receiver<ChildExit>,
    pub config_path: PathBuf,
    pub dir: tempfile::TempDir,
}

/// Render a config file pointing all paths below `dir`.
pub(crate) fn config_toml(dir: &Path, allowed: &[&str]) -> String {
    let allowed = allowed
        .iter()
        .map(|target| format!("\"{target}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
broadcaster_host = "localhost"
broadcaster_port = 8081
hostname = "agent01"
python_command = "/bin/sh"
script_to_execute = "{dir}/deploy.sh"
targets_directory = "{dir}/targets"
allowed_targets = [{allowed}]
log_filename = "{dir}/droverd.log"
metrics_directory = "{dir}/metrics"
metrics_file = "{dir}/metrics/drover.metrics"
graphite_host = "localhost"
graphite_port = 2003
"#,
        dir = dir.display(),
    )
}

/// Create a test runtime with a config file and deploy script on disk.
pub(crate) fn setup(allowed: &[&str]) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let config_text = config_toml(dir.path(), allowed);
    build(dir, config_text)
}

/// Like [`setup`], but without the metrics keys in the config.
pub(crate) fn setup_without_metrics(allowed: &[&str]) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let config_text = config_toml(dir.path(), allowed)
        .lines()
        .filter(|line| !line.starts_with("metrics_"))
        .collect::<Vec<_>>()
        .join("\n");
    build(dir, config_text)
}

fn build(dir: tempfile::TempDir, config_text: String) -> TestContext {
    let config_path = dir.path().join("drover.toml");
    std::fs::write(&config_path, config_text).unwrap();
    std::fs::create_dir_all(dir.path().join("targets")).unwrap();
    std::fs::write(dir.path().join("deploy.sh"), "#!/bin/sh\necho deploying \"$@\"\nexit 0\n")
        .unwrap();

    let bus = FakeBus::new();
    let graphite = FakeGraphite::new();
    let clock = FakeClock::new();
    let (exit_tx, exit_rx) = mpsc::channel(16);
    let config = Config::load(&config_path).unwrap();
    let runtime = Runtime::new(
        RuntimeDeps { bus: Arc::new(bus.clone()), graphite: graphite.clone() },
        clock.clone(),
        config,
        config_path.clone(),
        exit_tx,
    );

    TestContext { runtime, clock, bus, graphite, exit_rx, config_path, dir }
}

impl TestContext {
    pub(crate) async fn open_session(&self) -> Result<(), RuntimeError> {
        self.runtime.handle_session(SessionEvent::Opened).await
    }

    pub(crate) async fn send_message(&self, topic: &str, data: serde_json::Value) {
        self.runtime
            .handle_session(SessionEvent::Message { topic: Some(Target::new(topic)), data })
            .await
            .unwrap();
    }

    pub(crate) async fn send_request(&self, target: &str, arguments: &[&str]) {
        self.send_message(
            target,
            serde_json::json!({ "id": "request", "cmd": "deploy", "args": arguments }),
        )
        .await;
    }

    pub(crate) async fn send_vote(&self, target: &str, payload: &str, tracking_id: &str) {
        self.send_message(
            target,
            serde_json::json!({ "id": "vote", "payload": payload, "tracking_id": tracking_id }),
        )
        .await;
    }

    /// Advance the clock and run every timer that came due.
    pub(crate) async fn advance_and_fire(&self, duration: Duration) {
        self.clock.advance(duration);
        for id in self.runtime.poll_timers() {
            self.runtime.handle_timer(id).await;
        }
    }

    pub(crate) fn create_target_dir(&self, target: &str) {
        std::fs::create_dir_all(self.dir.path().join("targets").join(target)).unwrap();
    }

    /// Rewrite the config file with a new allowed-targets list.
    pub(crate) fn rewrite_allowed_targets(&self, allowed: &[&str]) {
        std::fs::write(&self.config_path, config_toml(self.dir.path(), allowed)).unwrap();
    }

    /// Wait for the next supervised child to exit and retire its election.
    pub(crate) async fn reap_child(&mut self) -> ChildExit {
        let exit = tokio::time::timeout(Duration::from_secs(5), self.exit_rx.recv())
            .await
            .expect("timed out waiting for child exit")
            .expect("exit channel closed");
        self.runtime.handle_child_exit(exit.clone());
        exit
    }

    pub(crate) fn metrics_file(&self) -> PathBuf {
        self.dir.path().join("metrics/drover.metrics")
    }
}
