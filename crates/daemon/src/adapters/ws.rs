// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket broadcaster client.
//!
//! Speaks JSON text frames: `{"type": "subscribe"|"unsubscribe"|"publish",
//! "target": ..., "event": {...}}` outbound, `{"target": ..., "event": {...}}`
//! inbound. The connector task owns the session: it reconnects with backoff,
//! emits [`SessionEvent::Opened`]/[`SessionEvent::Lost`], and clears the
//! write handle whenever the session drops so publishes fail fast with
//! [`BusError::NotConnected`] instead of queueing into a dead socket.

use super::bus::{BusAdapter, BusError, SessionEvent};
use async_trait::async_trait;
use drover_core::{CmdState, Target, TrackingId, Vote};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Broadcaster client over a websocket.
pub struct WsBus {
    host: String,
    port: u16,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    connected: AtomicBool,
    session_tx: mpsc::Sender<SessionEvent>,
}

impl WsBus {
    pub fn new(host: &str, port: u16, session_tx: mpsc::Sender<SessionEvent>) -> Arc<Self> {
        Arc::new(Self {
            host: host.to_string(),
            port,
            writer: tokio::sync::Mutex::new(None),
            connected: AtomicBool::new(false),
            session_tx,
        })
    }

    /// Spawn the connector task: connect, pump messages, reconnect with
    /// backoff until `shutdown` fires.
    pub fn spawn_connector(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                if shutdown.is_cancelled() {
                    return;
                }
                let url = format!("ws://{}:{}/", self.host, self.port);
                info!(%url, "connecting to broadcaster");
                match connect_async(url.as_str()).await {
                    Ok((stream, _)) => {
                        backoff = INITIAL_BACKOFF;
                        let (sink, read) = stream.split();
                        *self.writer.lock().await = Some(sink);
                        self.connected.store(true, Ordering::SeqCst);
                        if self.session_tx.send(SessionEvent::Opened).await.is_err() {
                            return;
                        }

                        let reason = self.pump(read, &shutdown).await;

                        // Clear the handle so reconnect starts from a clean
                        // slate; publishes in flight see NotConnected.
                        self.connected.store(false, Ordering::SeqCst);
                        *self.writer.lock().await = None;
                        if self
                            .session_tx
                            .send(SessionEvent::Lost { reason })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "broadcaster connection failed");
                    }
                }
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        })
    }

    /// Forward inbound frames until the session ends; returns the reason.
    async fn pump(
        &self,
        mut read: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
        shutdown: &CancellationToken,
    ) -> String {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return "shutting down".to_string(),
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => match parse_frame(text.as_str()) {
                        Some((topic, data)) => {
                            if self
                                .session_tx
                                .send(SessionEvent::Message { topic, data })
                                .await
                                .is_err()
                            {
                                return "event channel closed".to_string();
                            }
                        }
                        None => error!(frame = %text.as_str(), "unparseable broadcaster frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return format!("close frame received: {frame:?}");
                    }
                    Some(Ok(_)) => {} // ping/pong/binary are transport noise
                    Some(Err(e)) => return e.to_string(),
                    None => return "stream ended".to_string(),
                }
            }
        }
    }

    async fn send(&self, frame: Value) -> Result<(), BusError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(BusError::NotConnected)?;
        sink.send(Message::text(frame.to_string()))
            .await
            .map_err(|e| BusError::Transport(e.to_string()))
    }
}

#[async_trait]
impl BusAdapter for WsBus {
    async fn subscribe(&self, target: &Target) -> Result<(), BusError> {
        self.send(control_frame("subscribe", target)).await
    }

    async fn unsubscribe(&self, target: &Target) -> Result<(), BusError> {
        self.send(control_frame("unsubscribe", target)).await
    }

    async fn publish_cmd(
        &self,
        target: &Target,
        command: &str,
        state: CmdState,
        message: Option<&str>,
        tracking_id: Option<&TrackingId>,
    ) -> Result<(), BusError> {
        self.send(publish_frame(target, cmd_event(command, state, message, tracking_id)))
            .await
    }

    async fn publish_vote(
        &self,
        target: &Target,
        vote: &Vote,
        tracking_id: Option<&TrackingId>,
    ) -> Result<(), BusError> {
        self.send(publish_frame(target, vote_event(vote, tracking_id))).await
    }

    async fn publish_output(
        &self,
        target: &Target,
        line: &str,
        tracking_id: Option<&TrackingId>,
    ) -> Result<(), BusError> {
        self.send(publish_frame(target, output_event(line, tracking_id))).await
    }

    async fn close(&self) -> Result<(), BusError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(BusError::NotConnected)?;
        sink.send(Message::Close(None))
            .await
            .map_err(|e| BusError::Transport(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

fn control_frame(kind: &str, target: &Target) -> Value {
    json!({ "type": kind, "target": target.as_str() })
}

fn publish_frame(target: &Target, event: Value) -> Value {
    json!({ "type": "publish", "target": target.as_str(), "event": event })
}

fn cmd_event(
    command: &str,
    state: CmdState,
    message: Option<&str>,
    tracking_id: Option<&TrackingId>,
) -> Value {
    let mut event = json!({ "id": "cmd", "cmd": command, "state": state.to_string() });
    if let (Some(message), Value::Object(fields)) = (message, &mut event) {
        fields.insert("message".into(), Value::String(message.to_string()));
    }
    with_tracking_id(event, tracking_id)
}

fn vote_event(vote: &Vote, tracking_id: Option<&TrackingId>) -> Value {
    with_tracking_id(json!({ "id": "vote", "payload": vote.as_str() }), tracking_id)
}

fn output_event(line: &str, tracking_id: Option<&TrackingId>) -> Value {
    with_tracking_id(json!({ "id": "output", "payload": line }), tracking_id)
}

fn with_tracking_id(mut event: Value, tracking_id: Option<&TrackingId>) -> Value {
    if let (Some(tracking_id), Value::Object(fields)) = (tracking_id, &mut event) {
        fields.insert("tracking_id".into(), Value::String(tracking_id.as_str().into()));
    }
    event
}

/// Parse an inbound frame into its topic and event payload.
fn parse_frame(text: &str) -> Option<(Option<Target>, Value)> {
    let frame: Value = serde_json::from_str(text).ok()?;
    let object = frame.as_object()?;
    let event = object.get("event")?.clone();
    let topic = object.get("target").and_then(Value::as_str).map(Target::new);
    Some((topic, event))
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
