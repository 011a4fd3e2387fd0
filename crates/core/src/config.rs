// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration.
//!
//! Loaded from a TOML file at startup. `allowed_targets` is special: it is
//! re-read from disk on every session open so targets can be added or removed
//! without restarting the agent.

use crate::id::Target;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("cannot parse configuration {}: {source}", path.display())]
    Parse { path: PathBuf, source: Box<toml::de::Error> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub broadcaster_host: String,
    pub broadcaster_port: u16,
    /// Name of this agent host, used in lifecycle messages.
    pub hostname: String,
    /// Interpreter for the deployment script.
    pub python_command: String,
    /// Script handed to the interpreter together with the request arguments.
    pub script_to_execute: String,
    /// Per-target working directories live under this root.
    pub targets_directory: PathBuf,
    /// Targets this agent may subscribe to. Reloaded on every session open.
    #[serde(default)]
    pub allowed_targets: Vec<Target>,
    pub log_filename: PathBuf,
    /// Metrics snapshots are skipped entirely when unset.
    #[serde(default)]
    pub metrics_directory: Option<PathBuf>,
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
    pub graphite_host: String,
    pub graphite_port: u16,
}

impl Config {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source: Box::new(source) })
    }

    /// Re-read `allowed_targets` from disk, leaving everything else as
    /// loaded at startup.
    pub fn reload_targets(&mut self, path: &Path) -> Result<(), ConfigError> {
        self.allowed_targets = Self::load(path)?.allowed_targets;
        Ok(())
    }

    /// Working directory for a target's deployment processes.
    pub fn target_directory(&self, target: &Target) -> PathBuf {
        self.targets_directory.join(target.as_str())
    }
}

crate::builder! {
    pub struct ConfigBuilder => Config {
        into {
            broadcaster_host: String = "localhost",
            hostname: String = "host01",
            python_command: String = "/usr/bin/python3",
            script_to_execute: String = "/usr/bin/deploy",
            targets_directory: PathBuf = "/etc/drover/targets",
            log_filename: PathBuf = "/var/log/drover/droverd.log",
            graphite_host: String = "localhost",
        }
        set {
            broadcaster_port: u16 = 8081,
            allowed_targets: Vec<Target> = Vec::new(),
            graphite_port: u16 = 2003,
        }
        option {
            metrics_directory: PathBuf = None,
            metrics_file: PathBuf = None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
