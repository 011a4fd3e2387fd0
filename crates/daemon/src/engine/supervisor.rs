// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess supervisor.
//!
//! Runs one deployment child per won election: argv is
//! `[interpreter, script, ...request arguments]`, the working directory is
//! the target's directory, and the environment is empty. stdout and stderr
//! are streamed line by line to the bus under the election's tracking id;
//! after both streams drain, exactly one terminal `finished`/`failed` event
//! is published. The supervisor never retries.

use crate::adapters::BusAdapter;
use drover_core::metrics::{commands_failed_key, commands_finished_key};
use drover_core::{CmdState, MetricRegistry, Target, TrackingId};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

/// Everything needed to run and report one deployment child.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub interpreter: String,
    pub script: String,
    pub arguments: Vec<String>,
    pub cwd: PathBuf,
    pub target: Target,
    /// Command name from the request, echoed in lifecycle events.
    pub command: String,
    pub tracking_id: Option<TrackingId>,
}

impl ProcessConfig {
    pub fn new(
        interpreter: impl Into<String>,
        script: impl Into<String>,
        cwd: PathBuf,
        target: Target,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            arguments: Vec::new(),
            cwd,
            target,
            command: String::new(),
            tracking_id: None,
        }
    }

    drover_core::setters! {
        into {
            command: String,
        }
        set {
            arguments: Vec<String>,
        }
        option {
            tracking_id: TrackingId,
        }
    }

    /// Full command line, for logs and failure messages.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.interpreter.clone(), self.script.clone()];
        parts.extend(self.arguments.iter().cloned());
        parts.join(" ")
    }
}

/// Run the child to completion, streaming output and publishing the terminal
/// lifecycle event.
pub(crate) async fn supervise<B: BusAdapter>(
    bus: Arc<B>,
    metrics: MetricRegistry,
    config: ProcessConfig,
) {
    let command_line = config.command_line();
    let mut command = Command::new(&config.interpreter);
    command
        .arg(&config.script)
        .args(&config.arguments)
        .env_clear()
        .current_dir(&config.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let message = format!("failed to spawn `{command_line}`: {e}");
            publish_failed(&bus, &metrics, &config, &message).await;
            return;
        }
    };
    info!("child process for target {} started: {command_line}", config.target);

    let stdout_task = child.stdout.take().map(|stream| {
        tokio::spawn(stream_lines(
            stream,
            Arc::clone(&bus),
            config.target.clone(),
            config.tracking_id.clone(),
        ))
    });
    let stderr_task = child.stderr.take().map(|stream| {
        tokio::spawn(stream_lines(
            stream,
            Arc::clone(&bus),
            config.target.clone(),
            config.tracking_id.clone(),
        ))
    });

    // Streams drain to EOF when the child exits; flush them before the
    // terminal event so no output is published after finished/failed.
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    match child.wait().await {
        Ok(status) if status.success() => {
            info!("child process for target {} finished", config.target);
            metrics.count(&commands_finished_key(&config.target));
            publish_cmd(&bus, &config, CmdState::Finished, None).await;
        }
        Ok(status) => {
            let message = match status.code() {
                Some(code) => format!("command `{command_line}` exited with code {code}"),
                None => format!("command `{command_line}` terminated by signal"),
            };
            publish_failed(&bus, &metrics, &config, &message).await;
        }
        Err(e) => {
            let message = format!("failed to wait for `{command_line}`: {e}");
            publish_failed(&bus, &metrics, &config, &message).await;
        }
    }
}

async fn stream_lines<B: BusAdapter, R: AsyncRead + Unpin>(
    stream: R,
    bus: Arc<B>,
    target: Target,
    tracking_id: Option<TrackingId>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Err(e) = bus.publish_output(&target, &line, tracking_id.as_ref()).await {
                    warn!(error = %e, "failed to publish output line");
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read child output");
                return;
            }
        }
    }
}

async fn publish_failed<B: BusAdapter>(
    bus: &Arc<B>,
    metrics: &MetricRegistry,
    config: &ProcessConfig,
    message: &str,
) {
    error!("{message}");
    metrics.count(&commands_failed_key(&config.target));
    publish_cmd(bus, config, CmdState::Failed, Some(message)).await;
}

async fn publish_cmd<B: BusAdapter>(
    bus: &Arc<B>,
    config: &ProcessConfig,
    state: CmdState,
    message: Option<&str>,
) {
    if let Err(e) = bus
        .publish_cmd(
            &config.target,
            &config.command,
            state,
            message,
            config.tracking_id.as_ref(),
        )
        .await
    {
        warn!(error = %e, state = %state, "failed to publish lifecycle event");
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
