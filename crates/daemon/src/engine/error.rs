// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use crate::adapters::BusError;
use drover_core::{ConfigError, Target};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while handling session events and requests
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A request's working directory does not exist; no child is spawned.
    #[error(
        "({hostname}) target[{target}] request failed: target directory \"{}\" does not exist",
        path.display()
    )]
    TargetDirectoryMissing { hostname: String, target: Target, path: PathBuf },

    /// Session opened with nothing to subscribe to. Fatal; the agent is
    /// useless without targets.
    #[error("no targets configured or no targets in allowed targets")]
    NoAllowedTargets,

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
