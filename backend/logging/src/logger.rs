//! Structured Logger
//!
//! Console output plus two daily-rotated JSON files in the log directory:
//! - `wor.log`: ordinary diagnostics, filtered by the configured level
//! - `federation-events.log`: the federation audit trail, every
//!   `federation_events` record regardless of level

use std::path::Path;

use tracing::{Level, Metadata};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, Targets};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Target under which [`crate::EventLogger`] emits federation events.
pub const FEDERATION_EVENTS_TARGET: &str = "federation_events";

const LOG_FILE: &str = "wor.log";
const EVENTS_FILE: &str = "federation-events.log";

/// Initialize the global logger. `RUST_LOG` takes precedence over `level`
/// for the console and `wor.log`; the event file ignores both.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) {
    let log_dir = log_dir.as_ref();

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true)
        .with_filter(level_filter(level));

    let file_layer = fmt::layer()
        .json()
        .with_writer(RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE))
        .with_ansi(false)
        .with_filter(level_filter(level))
        .with_filter(filter_fn(|meta| !is_federation_event(meta)));

    let events_layer = fmt::layer()
        .json()
        .with_writer(RollingFileAppender::new(Rotation::DAILY, log_dir, EVENTS_FILE))
        .with_ansi(false)
        .with_filter(events_filter());

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(events_layer)
        .try_init();
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn events_filter() -> Targets {
    Targets::new().with_target(FEDERATION_EVENTS_TARGET, Level::INFO)
}

fn is_federation_event(meta: &Metadata<'_>) -> bool {
    meta.target() == FEDERATION_EVENTS_TARGET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_file_takes_only_federation_events() {
        let filter = events_filter();
        assert!(filter.would_enable(FEDERATION_EVENTS_TARGET, &Level::INFO));
        assert!(!filter.would_enable("wor_federation::service", &Level::ERROR));
        assert!(!filter.would_enable(FEDERATION_EVENTS_TARGET, &Level::DEBUG));
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("wor-logger-{}", std::process::id()));
        init_logger(&dir, "warn");
        init_logger(&dir, "debug");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
