// src/logging.rs

//! Logging setup for `tickdag` using `tracing` + `tracing-subscriber`.
//!
//! The effective filter is, in order of priority:
//! 1. `--log-level` CLI flag
//! 2. the `TICKDAG_LOG` environment variable, which accepts full
//!    `EnvFilter` directives (e.g. `"debug"` or `"tickdag=debug,info"`)
//! 3. `info`
//!
//! Logs go to STDERR so stdout stays free for task output and `--dry-run`.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

const LOG_ENV_VAR: &str = "TICKDAG_LOG";

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directive = match cli_level {
        Some(level) => directive_for(level).to_string(),
        None => std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| "info".to_string()),
    };

    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid {LOG_ENV_VAR} filter '{directive}'"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn directive_for(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
