//! Server error types.

use thiserror::Error;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Other listener I/O failure.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be turned into a runnable server.
    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),
    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// The coordinator task is no longer accepting requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// The coordinator has shut down.
    #[error("launch coordinator is closed")]
    Closed,
}
