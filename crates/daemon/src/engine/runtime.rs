// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the drover agent.
//!
//! Owns the table of in-flight elections and routes everything that reaches
//! the daemon loop: decoded bus events, timer expiries, and child exits.
//! The runtime is the sole mutator of the election table; all handlers run
//! on the single daemon loop task, so the mutexes here only bridge to the
//! supervisor tasks touching the metric registry.

use crate::adapters::{BusAdapter, GraphiteAdapter, SessionEvent};
use crate::engine::error::RuntimeError;
use crate::engine::scheduler::Scheduler;
use crate::engine::supervisor::{supervise, ProcessConfig};
use drover_core::metrics::{commands_failed_key, commands_started_key};
use drover_core::{
    BusEvent, Clock, CmdState, Config, Election, EventKind, MetricRegistry, Request, Target,
    TimerId, TimerKind, TrackingId, Vote, LAST_WRITE_DURATION, VOTING_FOLDS, VOTING_WINS,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Voting window before a request's showdown.
pub const SHOWDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the metrics snapshot is written.
pub const METRICS_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// How often the connection refresh guard runs.
pub const CONNECTION_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Local hour during which the refresh guard actually closes the session.
pub const REFRESH_HOUR: u32 = 2;

/// Election table key: the request's tracking id. Requests without one
/// share the `None` slot and may collide.
pub type ElectionKey = Option<TrackingId>;

/// Exit notification from a supervised child back to the runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildExit {
    pub key: ElectionKey,
}

/// Runtime adapter dependencies
pub struct RuntimeDeps<B, G> {
    pub bus: Arc<B>,
    pub graphite: G,
}

/// Runtime that coordinates the agent
pub struct Runtime<B, G, C: Clock> {
    bus: Arc<B>,
    graphite: G,
    clock: C,
    config: Mutex<Config>,
    config_path: PathBuf,
    metrics: MetricRegistry,
    elections: Mutex<HashMap<ElectionKey, Election>>,
    scheduler: Mutex<Scheduler>,
    exit_tx: mpsc::Sender<ChildExit>,
}

impl<B, G, C> Runtime<B, G, C>
where
    B: BusAdapter,
    G: GraphiteAdapter,
    C: Clock,
{
    /// Create a new runtime
    pub fn new(
        deps: RuntimeDeps<B, G>,
        clock: C,
        config: Config,
        config_path: PathBuf,
        exit_tx: mpsc::Sender<ChildExit>,
    ) -> Self {
        Self {
            bus: deps.bus,
            graphite: deps.graphite,
            clock,
            config: Mutex::new(config),
            config_path,
            metrics: MetricRegistry::new(),
            elections: Mutex::new(HashMap::new()),
            scheduler: Mutex::new(Scheduler::new()),
            exit_tx,
        }
    }

    /// Arm the recurring maintenance timers.
    ///
    /// Nothing runs at startup; each handler performs its action when the
    /// timer fires and re-arms itself.
    pub fn start(&self) {
        let now = self.clock.now();
        let mut scheduler = self.scheduler.lock();
        scheduler.set_timer(TimerId::metrics_flush(), METRICS_FLUSH_INTERVAL, now);
        scheduler.set_timer(TimerId::metrics_reset(), self.clock.until_midnight(), now);
        scheduler.set_timer(
            TimerId::connection_refresh(),
            CONNECTION_REFRESH_INTERVAL,
            now,
        );
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    pub fn election_count(&self) -> usize {
        self.elections.lock().len()
    }

    /// Our own vote in the election under `key`, while it is in flight.
    #[cfg(any(test, feature = "test-support"))]
    pub fn election_vote(&self, key: &ElectionKey) -> Option<Vote> {
        self.elections.lock().get(key).map(|election| election.vote().clone())
    }

    /// Earliest pending timer deadline; the daemon loop sleeps until it.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.lock().next_deadline()
    }

    /// Collect the timers that came due.
    pub fn poll_timers(&self) -> Vec<TimerId> {
        self.scheduler.lock().fired_timers(self.clock.now())
    }

    // ---- session events ----

    /// Handle one session event from the bus client.
    ///
    /// Only [`RuntimeError::NoAllowedTargets`] is fatal to the daemon; the
    /// loop logs everything else and keeps going.
    pub async fn handle_session(&self, event: SessionEvent) -> Result<(), RuntimeError> {
        match event {
            SessionEvent::Opened => self.handle_session_open().await,
            SessionEvent::Lost { reason } => {
                self.handle_connection_lost(&reason);
                Ok(())
            }
            SessionEvent::Message { topic, data } => {
                self.handle_message(topic, &data).await;
                Ok(())
            }
        }
    }

    /// Session open: reload allowed targets and subscribe to all of them.
    ///
    /// In-flight elections from the previous session are dropped; their
    /// showdown timers fire into nothing.
    async fn handle_session_open(&self) -> Result<(), RuntimeError> {
        self.elections.lock().clear();

        let (host, port) = {
            let config = self.config.lock();
            (config.broadcaster_host.clone(), config.broadcaster_port)
        };
        info!("successfully connected to broadcaster on {host}:{port}");

        let targets = {
            let mut config = self.config.lock();
            config.reload_targets(&self.config_path)?;
            let mut targets = config.allowed_targets.clone();
            targets.sort();
            targets
        };

        if targets.is_empty() {
            error!("no targets configured or no targets in allowed targets");
            return Err(RuntimeError::NoAllowedTargets);
        }

        for target in targets {
            info!("subscribing to target \"{target}\"");
            self.bus.subscribe(&target).await?;
        }
        Ok(())
    }

    fn handle_connection_lost(&self, reason: &str) {
        error!("connection lost: {reason}");
    }

    /// Subscribe to a single target if the configuration allows it.
    pub async fn subscribe_target(&self, target: &Target) -> Result<(), RuntimeError> {
        {
            let mut config = self.config.lock();
            config.reload_targets(&self.config_path)?;
            if !config.allowed_targets.contains(target) {
                warn!("can't subscribe to target {target}, target not in allowed targets");
                return Ok(());
            }
        }
        info!("subscribing to target \"{target}\"");
        self.bus.subscribe(target).await?;
        Ok(())
    }

    pub async fn unsubscribe_target(&self, target: &Target) -> Result<(), RuntimeError> {
        info!("unsubscribing from target \"{target}\"");
        self.bus.unsubscribe(target).await?;
        Ok(())
    }

    // ---- bus messages ----

    async fn handle_message(&self, topic: Option<Target>, data: &serde_json::Value) {
        let event = match BusEvent::decode(topic, data) {
            Ok(event) => event,
            Err(e) => {
                // Bad events are dropped; the loop keeps serving the rest.
                error!(error = %e, "failed to decode bus event");
                return;
            }
        };

        match event.kind {
            EventKind::Vote { ref vote, ref tracking_id } => {
                self.handle_vote(vote, tracking_id.clone());
            }
            EventKind::Request { ref command, ref arguments } => {
                let Some(target) = event.target.clone() else {
                    warn!("dropping request without a target: {event}");
                    return;
                };
                let request = Request {
                    target,
                    command: command.clone(),
                    arguments: arguments.clone(),
                };
                if let Err(e) = self.handle_request(&request).await {
                    error!(error = %e, "request handling failed");
                    self.publish_failed(&request, &e.to_string()).await;
                }
            }
            _ => info!("{event}"),
        }
    }

    /// Open an election for a request: arm the showdown and broadcast our
    /// vote. An existing election under the same key is overwritten.
    async fn handle_request(&self, request: &Request) -> Result<(), RuntimeError> {
        let key = request.tracking_id();
        let election = Election::open(request.clone());
        let vote = election.vote().clone();
        info!(
            "voting {vote} for request with tracking-id {}",
            key.as_ref().map(TrackingId::as_str).unwrap_or("none")
        );

        self.elections.lock().insert(key.clone(), election);
        self.scheduler.lock().set_timer(
            TimerId::showdown(key.as_ref()),
            SHOWDOWN_TIMEOUT,
            self.clock.now(),
        );
        self.bus.publish_vote(&request.target, &vote, key.as_ref()).await?;
        Ok(())
    }

    /// Route a peer's vote into its election.
    fn handle_vote(&self, peer_vote: &Vote, tracking_id: ElectionKey) {
        use drover_core::PeerVote;

        let outcome = {
            let mut elections = self.elections.lock();
            match elections.get_mut(&tracking_id) {
                None => {
                    info!("ignoring vote {peer_vote} because I have already lost");
                    return;
                }
                Some(election) => {
                    let own = election.vote().clone();
                    (election.peer_vote(peer_vote), own)
                }
            }
        };

        match outcome {
            (PeerVote::Fold, own_vote) => {
                info!("folding due to vote {peer_vote} being higher than own vote {own_vote}");
                self.scheduler
                    .lock()
                    .cancel_timer(TimerId::showdown(tracking_id.as_ref()).as_str());
                self.metrics.count(VOTING_FOLDS);
                self.cleanup(&tracking_id);
            }
            (PeerVote::Call, own_vote) => {
                info!("calling due to vote {peer_vote} being lower than own vote {own_vote}");
            }
            (PeerVote::Ignored, _) => {}
        }
    }

    // ---- timers ----

    pub async fn handle_timer(&self, id: TimerId) {
        match id.kind() {
            Some(TimerKind::Showdown { tracking_id }) => {
                self.handle_showdown(tracking_id.map(TrackingId::new)).await;
            }
            Some(TimerKind::MetricsFlush) => self.flush_metrics(),
            Some(TimerKind::MetricsReset) => self.reset_metrics(),
            Some(TimerKind::ConnectionRefresh) => self.refresh_connection().await,
            None => warn!("unknown timer fired: {id}"),
        }
    }

    /// Showdown deadline: whoever is still voting executes.
    async fn handle_showdown(&self, key: ElectionKey) {
        let request = {
            let mut elections = self.elections.lock();
            match elections.get_mut(&key) {
                // Election already folded or cleared; the one-shot dies here.
                None => {
                    debug!("showdown for a finished election, ignoring");
                    return;
                }
                Some(election) => {
                    if !election.showdown() {
                        return;
                    }
                    election.request().clone()
                }
            }
        };
        self.execute(key, request).await;
    }

    /// Won the election: publish `started` and hand off to the supervisor.
    async fn execute(&self, key: ElectionKey, request: Request) {
        info!("I have won the vote for {}, starting it now", request.target);
        self.metrics.count(VOTING_WINS);

        if let Err(e) = self.try_execute(&key, &request).await {
            error!(error = %e, "request execution failed");
            self.publish_failed(&request, &e.to_string()).await;
            self.cleanup(&key);
        }
    }

    async fn try_execute(&self, key: &ElectionKey, request: &Request) -> Result<(), RuntimeError> {
        let (hostname, interpreter, script) = {
            let config = self.config.lock();
            (
                config.hostname.clone(),
                config.python_command.clone(),
                config.script_to_execute.clone(),
            )
        };

        self.publish_start(request).await;

        {
            let elections = self.elections.lock();
            match elections.get(key) {
                Some(election) if election.spawned() => {}
                _ => warn!(
                    "tracking id {} not registered with an executing election, handling it anyway",
                    key.as_ref().map(TrackingId::as_str).unwrap_or("none")
                ),
            }
        }

        if request.arguments.first().map(String::as_str) == Some("update") {
            if let Err(e) = self.graphite.notify_update(&request.target).await {
                warn!(error = %e, "graphite notification failed");
            }
        }

        let target_directory = self.config.lock().target_directory(&request.target);
        if !target_directory.exists() {
            return Err(RuntimeError::TargetDirectoryMissing {
                hostname,
                target: request.target.clone(),
                path: target_directory,
            });
        }

        let mut process = ProcessConfig::new(
            interpreter,
            script,
            target_directory,
            request.target.clone(),
        )
        .command(request.command.clone())
        .arguments(request.arguments.clone());
        if let Some(tracking_id) = key.clone() {
            process = process.tracking_id(tracking_id);
        }

        let bus = Arc::clone(&self.bus);
        let metrics = self.metrics.clone();
        let exit_tx = self.exit_tx.clone();
        let key = key.clone();
        tokio::spawn(async move {
            supervise(bus, metrics, process).await;
            let _ = exit_tx.send(ChildExit { key }).await;
        });
        Ok(())
    }

    /// A supervised child is done; retire its election.
    pub fn handle_child_exit(&self, exit: ChildExit) {
        if let Some(election) = self.elections.lock().get_mut(&exit.key) {
            election.finish();
        }
        self.cleanup(&exit.key);
    }

    fn cleanup(&self, key: &ElectionKey) {
        let remaining = {
            let mut elections = self.elections.lock();
            elections.remove(key);
            elections.len()
        };
        info!(
            "cleaned up election for tracking-id {}, {remaining} left in memory",
            key.as_ref().map(TrackingId::as_str).unwrap_or("none")
        );
    }

    // ---- lifecycle publishes ----

    async fn publish_start(&self, request: &Request) {
        let hostname = self.config.lock().hostname.clone();
        let message = format!(
            "({hostname}) target[{}] request: command=\"{}\", arguments={:?}",
            request.target, request.command, request.arguments
        );
        info!("{message}");
        self.metrics.count(&commands_started_key(&request.target));
        if let Err(e) = self
            .bus
            .publish_cmd(
                &request.target,
                &request.command,
                CmdState::Started,
                Some(&message),
                request.tracking_id().as_ref(),
            )
            .await
        {
            warn!(error = %e, "failed to publish started event");
        }
    }

    async fn publish_failed(&self, request: &Request, message: &str) {
        error!("{message}");
        self.metrics.count(&commands_failed_key(&request.target));
        if let Err(e) = self
            .bus
            .publish_cmd(
                &request.target,
                &request.command,
                CmdState::Failed,
                Some(message),
                request.tracking_id().as_ref(),
            )
            .await
        {
            warn!(error = %e, "failed to publish failed event");
        }
    }

    // ---- recurring maintenance ----

    fn flush_metrics(&self) {
        self.scheduler.lock().set_timer(
            TimerId::metrics_flush(),
            METRICS_FLUSH_INTERVAL,
            self.clock.now(),
        );

        let (directory, file) = {
            let config = self.config.lock();
            (config.metrics_directory.clone(), config.metrics_file.clone())
        };
        let (Some(directory), Some(file)) = (directory, file) else {
            return;
        };

        if !directory.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&directory) {
                error!(error = %e, "cannot create metrics directory");
                return;
            }
        }

        let start = self.clock.now();
        match self.metrics.write_snapshot(&file) {
            Ok(()) => {
                let elapsed = self.clock.now().saturating_duration_since(start);
                self.metrics.set(LAST_WRITE_DURATION, elapsed.as_millis() as u64);
                info!("wrote metrics to file in {} ms", elapsed.as_millis());
            }
            Err(e) => error!(error = %e, "cannot write metrics file"),
        }
    }

    fn reset_metrics(&self) {
        self.scheduler.lock().set_timer(
            TimerId::metrics_reset(),
            self.clock.until_midnight(),
            self.clock.now(),
        );
        info!("resetting metrics");
        self.metrics.reset();
    }

    async fn refresh_connection(&self) {
        self.scheduler.lock().set_timer(
            TimerId::connection_refresh(),
            CONNECTION_REFRESH_INTERVAL,
            self.clock.now(),
        );
        debug!("might want to refresh connection now");
        if !self.should_refresh_connection() {
            return;
        }
        info!("closing connection to broadcaster, this should force a connection-refresh");
        if let Err(e) = self.bus.close().await {
            warn!(error = %e, "failed to close broadcaster session");
        }
    }

    fn should_refresh_connection(&self) -> bool {
        if !self.bus.is_connected() {
            info!("not connected, cannot refresh connection");
            return false;
        }
        let hour = self.clock.local_hour();
        if hour != REFRESH_HOUR {
            info!("it's {hour}:xx, not {REFRESH_HOUR}:xx a.m., no connection-refresh now");
            return false;
        }
        true
    }
}

#[cfg(test)]
#[path = "runtime_tests/mod.rs"]
mod tests;
