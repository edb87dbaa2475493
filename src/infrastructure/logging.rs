//! Logging initialization.
//!
//! Structured tracing output driven by [`LoggingConfig`]: env-filterable
//! level, json or pretty format, and optional daily-rotated file output.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::domain::models::LoggingConfig;

/// Initialize the global tracing subscriber. Returns the appender guard
/// when file logging is enabled; hold it for the process lifetime or
/// buffered log lines are lost on exit.
///
/// `RUST_LOG` overrides the configured level. Calling twice is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "metronome.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            if config.format == "json" {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .json()
                    .try_init();
            } else {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .try_init();
            }
            Some(guard)
        }
        None => {
            if config.format == "json" {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .try_init();
            } else {
                let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
            }
            None
        }
    }
}
