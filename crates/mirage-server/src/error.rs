//! Transport errors.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias using [`ServerError`].
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by the HTTP server.
///
/// Request-level failures never surface here; they are answered with an
/// envelope. Only problems that stop the server itself are reported.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured bind address could not be parsed.
    #[error("Bind error: invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// The listener could not be bound.
    #[error("Bind error: failed to bind to {addr}: {source}")]
    Bind {
        /// The resolved address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The listener failed after binding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
