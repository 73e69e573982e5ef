//! SPDX-License-Identifier: MIT

//! A `tracing` + `tracing-subscriber` + `tracing-appender` setup scaled to
//! what this crate's call sites actually need: an `EnvFilter`, a
//! non-blocking writer, and an optional JSON event format. The library
//! itself never calls this — only integration tests and downstream binaries
//! that want the client's `tracing::debug!`/`warn!`/`trace!` events
//! surfaced.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt};

/// Where logger output is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Logger configuration. `RUST_LOG` (or `level` if set) selects verbosity;
/// `json` switches the event formatter to structured JSON output.
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    pub level: Option<String>,
    pub target: LogTarget,
    pub json: bool,
}

/// Installs a process-global `tracing` subscriber built from `config`.
///
/// Returns the [`WorkerGuard`] for the non-blocking writer; the guard must
/// be held for the subscriber to keep flushing, exactly as
/// `tracing_appender::non_blocking` requires.
pub fn init_logger(config: LoggerConfig) -> Result<WorkerGuard> {
    let env_filter = match &config.level {
        Some(level) => EnvFilter::try_new(level).context("failed to parse log level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (writer, guard) = match config.target {
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(writer);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_stdout_text() {
        let cfg = LoggerConfig::default();
        assert_eq!(cfg.target, LogTarget::Stdout);
        assert!(!cfg.json);
    }
}
