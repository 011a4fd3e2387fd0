// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request handling engine: election dispatch, timers, child supervision.

mod error;
mod runtime;
mod scheduler;
mod supervisor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::RuntimeError;
pub use runtime::{
    ChildExit, ElectionKey, Runtime, RuntimeDeps, CONNECTION_REFRESH_INTERVAL,
    METRICS_FLUSH_INTERVAL, REFRESH_HOUR, SHOWDOWN_TIMEOUT,
};
pub use supervisor::ProcessConfig;
