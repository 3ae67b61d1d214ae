#![forbid(unsafe_code)]

//! Log subscriber setup for the CLI and embedding applications.

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("invalid log level: {0}")]
    InvalidFilter(String),
    /// A global subscriber is already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Installs a `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?,
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}
