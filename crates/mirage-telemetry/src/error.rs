//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The metrics recorder could not be installed.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// The tracing subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A filter directive did not parse.
    #[error("Invalid log level '{level}': {reason}")]
    InvalidLevel {
        /// The rejected directive.
        level: String,
        /// Parser message.
        reason: String,
    },

    /// Failed to parse the metrics listener address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
