//! Tracing setup
//!
//! Logs go to stderr so stdout stays free for device output. When file
//! logging is enabled a daily rolling file is written through a non-blocking
//! appender; keep the returned guard alive for the lifetime of the process.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer flushing until dropped
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory of the rolling log file, if file logging is on
    pub fn log_dir(&self) -> Option<&std::path::Path> {
        self.log_dir.as_deref()
    }
}

/// Filter directive for the given verbosity.
///
/// `RUST_LOG` wins over everything; otherwise `--verbose` raises the level to
/// debug and `--quiet` lowers it to errors only.
pub fn filter_directive(settings: &LoggingSettings, verbose: bool, quiet: bool) -> String {
    if verbose {
        "debug".to_string()
    } else if quiet {
        "error".to_string()
    } else {
        settings.filter.clone()
    }
}

/// Install the global subscriber.
///
/// Returns `None` if a subscriber is already installed.
pub fn init(settings: &LoggingSettings, verbose: bool, quiet: bool) -> Option<LoggingGuard> {
    let directive = filter_directive(settings, verbose, quiet);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard, log_dir) = match file_target(settings) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, "serialbridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);
            (Some(layer), Some(guard), Some(dir))
        }
        None => (None, None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    if subscriber.try_init().is_err() {
        return None;
    }

    if let Some(dir) = &log_dir {
        tracing::debug!(log_dir = %dir.display(), "file logging enabled");
    }

    Some(LoggingGuard {
        _guard: guard,
        log_dir,
    })
}

fn file_target(settings: &LoggingSettings) -> Option<PathBuf> {
    if !settings.file {
        return None;
    }
    let dir = settings
        .directory
        .clone()
        .or_else(crate::config::log_dir)
        .unwrap_or_else(|| std::env::temp_dir().join("serialbridge").join("logs"));
    match std::fs::create_dir_all(&dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            eprintln!("Cannot create log directory {}: {}", dir.display(), e);
            None
        }
    }
}
