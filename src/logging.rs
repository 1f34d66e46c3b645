// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Logging setup
//!
//! Diagnostics go to stderr so stdout carries only summary lines. An optional
//! directory receives a plain-text copy in `verbose.log`.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

pub const LOG_FILE_NAME: &str = "verbose.log";

/// Install the global subscriber
///
/// The returned guard flushes the file layer on drop and must be held until
/// the program exits.
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to prepare log directory {}", dir.display()))?;
            let appender = rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(build_env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    if let Some(dir) = log_dir {
        tracing::info!("Logging to {}", dir.join(LOG_FILE_NAME).display());
    }
    Ok(guard)
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs").join("run");

        let guard = init(Some(&log_dir)).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());

        // a second subscriber cannot be installed
        assert!(init(None).is_err());
    }
}
