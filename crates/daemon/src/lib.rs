// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-daemon: the `droverd` agent.
//!
//! Connects to the broadcaster, subscribes to the targets allowed on this
//! host, elects one executor per request among the agent replicas, and
//! supervises the resulting deployment child process.

pub mod adapters;
pub mod engine;
pub mod env;
pub mod lifecycle;

pub use adapters::{BusAdapter, BusError, GraphiteAdapter, SessionEvent};
pub use engine::{ChildExit, Runtime, RuntimeDeps, RuntimeError, SHOWDOWN_TIMEOUT};
pub use lifecycle::LifecycleError;

#[cfg(any(test, feature = "test-support"))]
pub use adapters::{BusCall, FakeBus, FakeGraphite};
