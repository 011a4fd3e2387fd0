// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graphite side channel.
//!
//! Deployment updates are announced to graphite as a single plaintext datapoint
//! over UDP. The notification is best-effort: failures are reported to the
//! caller, which logs and moves on. There is no retry.

use async_trait::async_trait;
use drover_core::Target;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors from graphite notifications
#[derive(Debug, Error)]
pub enum GraphiteError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Adapter announcing target updates to graphite
#[async_trait]
pub trait GraphiteAdapter: Clone + Send + Sync + 'static {
    /// Announce that an update started on `target`.
    async fn notify_update(&self, target: &Target) -> Result<(), GraphiteError>;
}

/// UDP plaintext-protocol graphite notifier.
#[derive(Clone, Debug)]
pub struct UdpGraphite {
    addr: String,
}

impl UdpGraphite {
    pub fn new(host: &str, port: u16) -> Self {
        Self { addr: format!("{host}:{port}") }
    }

    fn datapoint(target: &Target) -> String {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        format!("drover.{target}.update 1 {epoch}\n")
    }
}

#[async_trait]
impl GraphiteAdapter for UdpGraphite {
    async fn notify_update(&self, target: &Target) -> Result<(), GraphiteError> {
        let socket = tokio::net::UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| GraphiteError::SendFailed(e.to_string()))?;
        socket
            .send_to(Self::datapoint(target).as_bytes(), &self.addr)
            .await
            .map_err(|e| GraphiteError::SendFailed(e.to_string()))?;
        tracing::debug!(addr = %self.addr, "graphite update notification sent for {target}");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{GraphiteAdapter, GraphiteError};
    use drover_core::Target;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake graphite adapter recording notified targets.
    #[derive(Clone, Default)]
    pub struct FakeGraphite {
        notified: Arc<Mutex<Vec<Target>>>,
    }

    impl FakeGraphite {
        pub fn new() -> Self {
            Self::default()
        }

        /// Targets that were announced, in order.
        pub fn notified(&self) -> Vec<Target> {
            self.notified.lock().clone()
        }
    }

    #[async_trait]
    impl GraphiteAdapter for FakeGraphite {
        async fn notify_update(&self, target: &Target) -> Result<(), GraphiteError> {
            self.notified.lock().push(target.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeGraphite;

#[cfg(test)]
#[path = "graphite_tests.rs"]
mod tests;
