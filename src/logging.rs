//! Tracing setup for claimflow.
//!
//! Output goes to stderr, or to `<state>/logs/claimflow-{timestamp}.log`
//! when `logging.to_file` is set. Stdout belongs to the stdio bridge
//! transport and is never written by the logger.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Keeps file logging alive; drop it last so buffered lines are flushed
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,
    /// Set only when logging to a file
    pub log_file_path: Option<PathBuf>,
}

/// Where log lines end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Log file name for a process started at `started`
pub fn log_file_name(started: DateTime<Utc>) -> String {
    format!("claimflow-{}.log", started.format("%Y%m%dT%H%M%SZ"))
}

/// Filter directive: `RUST_LOG` wins, then `--debug`, then `logging.level`
pub fn filter_directive(config: &Config, debug: bool, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ if debug => "debug".to_string(),
        _ => config.logging.level.clone(),
    }
}

/// Resolve the log destination for a process started at `started`
pub fn log_target(config: &Config, started: DateTime<Utc>) -> LogTarget {
    if config.logging.to_file {
        LogTarget::File(config.logs_path().join(log_file_name(started)))
    } else {
        LogTarget::Stderr
    }
}

/// Install the global subscriber.
///
/// `debug` comes from the `--debug` flag.
pub fn init_logging(config: &Config, debug: bool) -> Result<LoggingHandle> {
    let directive = filter_directive(config, debug, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter '{}'", directive))?;

    match log_target(config, Utc::now()) {
        LogTarget::File(path) => {
            let (dir, file_name) = split_log_path(&path)?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init()
                .context("Logging already initialized")?;

            Ok(LoggingHandle {
                _guard: Some(guard),
                log_file_path: Some(path),
            })
        }
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .context("Logging already initialized")?;

            Ok(LoggingHandle {
                _guard: None,
                log_file_path: None,
            })
        }
    }
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
    let dir = path.parent().context("Log path has no directory")?;
    let name = path.file_name().context("Log path has no file name")?;
    Ok((dir, name))
}
