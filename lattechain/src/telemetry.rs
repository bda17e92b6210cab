// Copyright (c) 2024 Botho Foundation

//! Log output setup.
//!
//! Logs go to stderr; stdout carries command replies. `RUST_LOG` overrides
//! the level chosen by `--verbose`, e.g. `RUST_LOG=lattechain=trace`.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
