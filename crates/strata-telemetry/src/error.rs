//! Telemetry error types.

use thiserror::Error;

/// Errors raised while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A filter directive did not parse.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// The directive as given.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// Unknown `--log-format` value.
    #[error("unknown log format '{0}', expected compact, pretty or json")]
    UnknownFormat(String),

    /// A global subscriber is already installed.
    #[error("failed to install the log subscriber: {0}")]
    Init(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
