// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcaster session abstraction.
//!
//! The runtime never talks to the wire directly: it consumes
//! [`SessionEvent`]s from a channel and publishes through the [`BusAdapter`]
//! trait. The production implementation is [`crate::adapters::WsBus`]; tests
//! use [`FakeBus`].

use async_trait::async_trait;
use drover_core::{CmdState, Target, TrackingId, Vote};
use thiserror::Error;

/// Errors from bus operations
#[derive(Debug, Error)]
pub enum BusError {
    #[error("not connected to broadcaster")]
    NotConnected,
    #[error("bus transport error: {0}")]
    Transport(String),
}

/// Session-level happenings, funneled into the runtime loop in receipt order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session to the broadcaster was established.
    Opened,
    /// The session went away; the client reconnects on its own.
    Lost { reason: String },
    /// A message arrived on a subscribed topic.
    Message { topic: Option<Target>, data: serde_json::Value },
}

/// Adapter for the broadcaster session.
#[async_trait]
pub trait BusAdapter: Send + Sync + 'static {
    async fn subscribe(&self, target: &Target) -> Result<(), BusError>;

    async fn unsubscribe(&self, target: &Target) -> Result<(), BusError>;

    /// Publish a command lifecycle event for a target.
    async fn publish_cmd(
        &self,
        target: &Target,
        command: &str,
        state: CmdState,
        message: Option<&str>,
        tracking_id: Option<&TrackingId>,
    ) -> Result<(), BusError>;

    /// Publish this replica's vote in an election.
    async fn publish_vote(
        &self,
        target: &Target,
        vote: &Vote,
        tracking_id: Option<&TrackingId>,
    ) -> Result<(), BusError>;

    /// Publish one line of child process output.
    async fn publish_output(
        &self,
        target: &Target,
        line: &str,
        tracking_id: Option<&TrackingId>,
    ) -> Result<(), BusError>;

    /// Close the current session to force a clean reconnect.
    async fn close(&self) -> Result<(), BusError>;

    fn is_connected(&self) -> bool;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{BusAdapter, BusError};
    use async_trait::async_trait;
    use drover_core::{CmdState, Target, TrackingId, Vote};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Recorded bus operation
    #[derive(Debug, Clone, PartialEq)]
    pub enum BusCall {
        Subscribe(Target),
        Unsubscribe(Target),
        Cmd {
            target: Target,
            command: String,
            state: CmdState,
            message: Option<String>,
            tracking_id: Option<TrackingId>,
        },
        Vote { target: Target, vote: Vote, tracking_id: Option<TrackingId> },
        Output { target: Target, line: String, tracking_id: Option<TrackingId> },
        Close,
    }

    /// Fake bus adapter recording every call for assertions.
    #[derive(Clone)]
    pub struct FakeBus {
        calls: Arc<Mutex<Vec<BusCall>>>,
        connected: Arc<AtomicBool>,
    }

    impl Default for FakeBus {
        fn default() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                connected: Arc::new(AtomicBool::new(true)),
            }
        }
    }

    impl FakeBus {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<BusCall> {
            self.calls.lock().clone()
        }

        /// Recorded `Cmd` calls only, in publish order.
        pub fn cmd_calls(&self) -> Vec<BusCall> {
            self.calls
                .lock()
                .iter()
                .filter(|call| matches!(call, BusCall::Cmd { .. }))
                .cloned()
                .collect()
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        fn record(&self, call: BusCall) {
            self.calls.lock().push(call);
        }
    }

    #[async_trait]
    impl BusAdapter for FakeBus {
        async fn subscribe(&self, target: &Target) -> Result<(), BusError> {
            self.record(BusCall::Subscribe(target.clone()));
            Ok(())
        }

        async fn unsubscribe(&self, target: &Target) -> Result<(), BusError> {
            self.record(BusCall::Unsubscribe(target.clone()));
            Ok(())
        }

        async fn publish_cmd(
            &self,
            target: &Target,
            command: &str,
            state: CmdState,
            message: Option<&str>,
            tracking_id: Option<&TrackingId>,
        ) -> Result<(), BusError> {
            self.record(BusCall::Cmd {
                target: target.clone(),
                command: command.to_string(),
                state,
                message: message.map(str::to_string),
                tracking_id: tracking_id.cloned(),
            });
            Ok(())
        }

        async fn publish_vote(
            &self,
            target: &Target,
            vote: &Vote,
            tracking_id: Option<&TrackingId>,
        ) -> Result<(), BusError> {
            self.record(BusCall::Vote {
                target: target.clone(),
                vote: vote.clone(),
                tracking_id: tracking_id.cloned(),
            });
            Ok(())
        }

        async fn publish_output(
            &self,
            target: &Target,
            line: &str,
            tracking_id: Option<&TrackingId>,
        ) -> Result<(), BusError> {
            self.record(BusCall::Output {
                target: target.clone(),
                line: line.to_string(),
                tracking_id: tracking_id.cloned(),
            });
            Ok(())
        }

        async fn close(&self) -> Result<(), BusError> {
            self.record(BusCall::Close);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{BusCall, FakeBus};
