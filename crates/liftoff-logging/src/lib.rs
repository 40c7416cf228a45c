//! # liftoff-logging
//!
//! Structured logging with `tracing` for the launch coordinator.
//!
//! - [`init_subscriber`] installs the process-wide stderr subscriber
//!   (compact text or one JSON object per line)
//! - [`LogLevel`] normalizes level names from settings and flags
//! - [`capture_logs`] records events in memory for test assertions

#![deny(unsafe_code)]

pub mod capture;
pub mod types;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};
pub use types::LogLevel;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors from subscriber setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter `{filter}`: {source}")]
    Filter {
        /// The rejected directive.
        filter: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the level filter. `RUST_LOG` takes precedence over `default_filter`.
pub fn build_filter(default_filter: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_filter).map_err(|source| LoggingError::Filter {
        filter: default_filter.to_string(),
        source,
    })
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// Call once at startup. `json` selects one JSON object per line instead of
/// compact human-readable output.
pub fn init_subscriber(default_filter: &str, json: bool) -> Result<(), LoggingError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = build_filter(default_filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().flatten_event(true).finish().try_init()?;
    } else {
        builder.compact().finish().try_init()?;
    }
    Ok(())
}
