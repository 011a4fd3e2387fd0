// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters for external I/O

pub mod bus;
pub mod graphite;
pub mod ws;

pub use bus::{BusAdapter, BusError, SessionEvent};
pub use graphite::{GraphiteAdapter, GraphiteError, UdpGraphite};
pub use ws::WsBus;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use bus::{BusCall, FakeBus};
#[cfg(any(test, feature = "test-support"))]
pub use graphite::FakeGraphite;
