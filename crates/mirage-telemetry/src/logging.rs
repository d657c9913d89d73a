//! Structured logging.
//!
//! Mirage logs through `tracing`. [`init_logging`] installs a
//! `tracing-subscriber` registry with an [`EnvFilter`] and either a JSON
//! layer (production) or a pretty layer (development).
//!
//! # Example
//!
//! ```rust,ignore
//! use mirage_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(route = "users.get", "request handled");
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Default service name attached to startup logs.
pub const DEFAULT_SERVICE_NAME: &str = "mirage";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g. "info" or "mirage_server=debug,info").
    pub level: String,

    /// Whether to output JSON.
    pub json_format: bool,

    /// Whether to include the target (module path).
    pub include_target: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Service name logged at startup.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            include_target: true,
            file_line_info: true,
            thread_ids: false,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            include_target: true,
            file_line_info: false,
            thread_ids: false,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

/// Installs the global subscriber.
///
/// Does nothing when `config.enabled` is false.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidLevel`] for a bad filter directive and
/// [`TelemetryError::LoggingInit`] when a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json_format,
        "logging initialized"
    );
    Ok(())
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidLevel`] if the directive is invalid.
pub fn create_env_filter(level: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| TelemetryError::InvalidLevel {
        level: level.to_string(),
        reason: e.to_string(),
    })
}

/// Returns `true` if `level` is a usable filter directive.
#[must_use]
pub fn is_valid_level(level: &str) -> bool {
    !level.trim().is_empty() && create_env_filter(level).is_ok()
}

/// Standard structured field names.
///
/// Use these names so that logs from the dispatcher, the middlewares and
/// application code can be queried together.
pub mod fields {
    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";

    /// Composite route name.
    pub const ROUTE: &str = "route";

    /// Action name of the matched route.
    pub const ACTION: &str = "action";

    /// Dev code of the outgoing envelope.
    pub const DEV_CODE: &str = "dev_code";

    /// HTTP status of the outgoing envelope.
    pub const HTTP_CODE: &str = "http_code";

    /// Name of the middleware that rejected a request.
    pub const MIDDLEWARE: &str = "middleware";

    /// HTTP method.
    pub const HTTP_METHOD: &str = "method";

    /// Request path.
    pub const HTTP_PATH: &str = "path";

    /// Duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Error description.
    pub const ERROR: &str = "error";
}

/// Logs the start of a dispatch.
#[macro_export]
macro_rules! log_request_start {
    ($request_id:expr, $method:expr, $path:expr) => {
        $crate::tracing::debug!(
            request_id = %$request_id,
            method = %$method,
            path = %$path,
            "request started"
        );
    };
}

/// Logs the end of a dispatch.
#[macro_export]
macro_rules! log_request_complete {
    ($request_id:expr, $route:expr, $http_code:expr, $duration_ms:expr) => {
        $crate::tracing::info!(
            request_id = %$request_id,
            route = %$route,
            http_code = $http_code,
            duration_ms = $duration_ms,
            "request completed"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_production() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
        assert_eq!(config, LogConfig::production());
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.file_line_info);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_level_validation() {
        assert!(is_valid_level("info"));
        assert!(is_valid_level("mirage_server=debug,warn"));
        assert!(!is_valid_level(""));
        assert!(!is_valid_level("mirage=loud"));
    }

    #[test]
    fn test_disabled_logging_is_ok() {
        let config = LogConfig {
            enabled: false,
            level: "not a level ===".to_string(),
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_field_names() {
        assert_eq!(fields::REQUEST_ID, "request_id");
        assert_eq!(fields::DEV_CODE, "dev_code");
        assert_eq!(fields::MIDDLEWARE, "middleware");
    }
}
