//! Structured logging and Prometheus metrics for Mirage.
//!
//! - **Logging**: [`init_logging`] installs a `tracing-subscriber` registry
//!   with JSON or pretty output, filtered by an `EnvFilter` directive.
//! - **Metrics**: [`init_metrics`] installs the Prometheus exporter. The
//!   dispatcher records through [`metrics::record_request`],
//!   [`metrics::record_rejection`] and [`InFlightGuard`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mirage_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! init_telemetry(&LogConfig::production(), &MetricsConfig::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/mirage-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use crate::error::TelemetryError;
pub use crate::logging::{create_env_filter, fields, init_logging, is_valid_level, LogConfig};
pub use crate::metrics::{init_metrics, install_recorder, InFlightGuard, MetricsConfig, MetricsRegistry};

#[doc(hidden)]
pub use tracing;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns the first subsystem error.
pub fn init_telemetry(log: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(log)?;
    init_metrics(metrics)?;
    Ok(())
}
