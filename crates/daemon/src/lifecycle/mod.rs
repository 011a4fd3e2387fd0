// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, the event loop, shutdown.
//!
//! Every event source (bus session events, child exits, timer deadlines,
//! the shutdown signal) funnels into one `tokio::select!` loop owned by a
//! single task. Handlers therefore run strictly serialized, in receipt
//! order, which is what makes the election bookkeeping safe.

use crate::adapters::{BusAdapter, GraphiteAdapter, SessionEvent, UdpGraphite, WsBus};
use crate::engine::{ChildExit, Runtime, RuntimeDeps, RuntimeError};
use crate::env;
use drover_core::{Clock, Config, ConfigError, SystemClock};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Errors that end the daemon.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Session opened with an empty allowed-targets list; exit code 1.
    #[error("no targets configured or no targets in allowed targets")]
    NoAllowedTargets,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot initialize logging below {}: {source}", path.display())]
    Logging { path: std::path::PathBuf, source: std::io::Error },
}

/// Initialize file logging.
///
/// Returns the appender guard; dropping it flushes buffered log lines.
/// Rotation is left to the host's logrotate; the appender writes a single
/// file.
pub fn init_logging(
    log_filename: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    let directory = log_filename.parent().unwrap_or_else(|| Path::new("."));
    let file_name = log_filename.file_name().unwrap_or_else(|| "droverd.log".as_ref());
    std::fs::create_dir_all(directory).map_err(|source| LifecycleError::Logging {
        path: directory.to_path_buf(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// Assemble the daemon and run it until shutdown.
pub async fn run_daemon() -> Result<(), LifecycleError> {
    let config_path = env::config_path();
    let config = Config::load(&config_path)?;
    let _guard = init_logging(&config.log_filename)?;
    info!("droverd version {}", env!("CARGO_PKG_VERSION"));
    info!(
        "connecting to broadcaster on {}:{}",
        config.broadcaster_host, config.broadcaster_port
    );

    let (session_tx, session_rx) = mpsc::channel(256);
    let (exit_tx, exit_rx) = mpsc::channel(64);
    let shutdown = CancellationToken::new();

    let bus = WsBus::new(&config.broadcaster_host, config.broadcaster_port, session_tx);
    Arc::clone(&bus).spawn_connector(shutdown.clone());
    let graphite = UdpGraphite::new(&config.graphite_host, config.graphite_port);

    let runtime = Arc::new(Runtime::new(
        RuntimeDeps { bus, graphite },
        SystemClock,
        config,
        config_path,
        exit_tx,
    ));
    runtime.start();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_shutdown.cancel();
    });

    let result = run(runtime, session_rx, exit_rx, shutdown.clone()).await;
    shutdown.cancel();
    result
}

/// The daemon loop: one consumer for every event source.
pub async fn run<B, G, C>(
    runtime: Arc<Runtime<B, G, C>>,
    mut session_rx: mpsc::Receiver<SessionEvent>,
    mut exit_rx: mpsc::Receiver<ChildExit>,
    shutdown: CancellationToken,
) -> Result<(), LifecycleError>
where
    B: BusAdapter,
    G: GraphiteAdapter,
    C: Clock,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutting down service");
                return Ok(());
            }
            event = session_rx.recv() => match event {
                Some(event) => match runtime.handle_session(event).await {
                    Ok(()) => {}
                    Err(RuntimeError::NoAllowedTargets) => {
                        return Err(LifecycleError::NoAllowedTargets);
                    }
                    Err(e) => error!(error = %e, "session event handling failed"),
                },
                None => {
                    info!("session channel closed, shutting down service");
                    return Ok(());
                }
            },
            Some(exit) = exit_rx.recv() => runtime.handle_child_exit(exit),
            _ = sleep_until_deadline(runtime.next_deadline()) => {
                for id in runtime.poll_timers() {
                    runtime.handle_timer(id).await;
                }
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
