// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! droverd, the drover deployment agent.

use drover_daemon::lifecycle::{self, LifecycleError};

#[tokio::main]
async fn main() {
    let code = match lifecycle::run_daemon().await {
        Ok(()) => 0,
        // The agent is useless without targets; systemd should not restart
        // us into the same configuration.
        Err(LifecycleError::NoAllowedTargets) => 1,
        Err(error) => {
            eprintln!("droverd: {error}");
            2
        }
    };
    std::process::exit(code);
}
