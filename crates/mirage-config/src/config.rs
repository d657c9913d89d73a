//! The root configuration type.

use std::net::SocketAddr;
use std::time::Duration;

use mirage_core::{CorsPolicy, LogMode};
use mirage_telemetry::{LogConfig, MetricsConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{
    AppSettings, CacheConfig, LoggingConfig, MetricsSettings, SecurityConfig, ServerConfig,
};

/// Environment name under which dev messages are shown.
pub const DEV_ENVIRONMENT: &str = "dev";

/// Complete Mirage configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use mirage_config::AppConfig;
///
/// let config = AppConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(!config.is_dev());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP transport.
    #[serde(default)]
    pub server: ServerConfig,

    /// Dispatcher and responder settings.
    #[serde(default)]
    pub app: AppSettings,

    /// Keys.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Cache service.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl AppConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field:
    /// - an address that does not parse;
    /// - an allowed method outside the known tokens;
    /// - an empty language;
    /// - an invalid log level;
    /// - a zero timeout, body limit or TTL.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        for (field, value) in [
            ("server.shutdown_timeout_secs", self.server.shutdown_timeout_secs),
            ("server.body_timeout_secs", self.server.body_timeout_secs),
            ("cache.default_ttl_secs", self.cache.default_ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be greater than 0"));
            }
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than 0",
            ));
        }

        if let Some(method) = self
            .app
            .allow_methods
            .iter()
            .find(|m| !mirage_router::is_known_method(m))
        {
            return Err(ConfigError::invalid_value(
                "app.allow_methods",
                format!("unknown method: {method}"),
            ));
        }

        for (field, lang) in [
            ("app.lang", &self.app.lang),
            ("app.fallback_lang", &self.app.fallback_lang),
        ] {
            if lang.trim().is_empty() {
                return Err(ConfigError::invalid_value(field, "must not be empty"));
            }
        }

        if !mirage_telemetry::is_valid_level(&self.logging.level) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("invalid filter directive: {}", self.logging.level),
            ));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Development preset.
    ///
    /// - `dev` environment, so dev messages reach clients
    /// - complete payload logging
    /// - pretty debug logs
    ///
    /// # Example
    ///
    /// ```
    /// use mirage_config::AppConfig;
    ///
    /// let config = AppConfig::development();
    /// assert!(config.is_dev());
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.app.environment = DEV_ENVIRONMENT.to_string();
        config.app.log_mode = LogMode::Complete;

        config.logging.level = "debug".to_string();
        config.logging.json_format = false;
        config.logging.file_line_info = true;
        config
    }

    /// Production preset. Identical to the defaults.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Returns `true` in the `dev` environment.
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.app.environment == DEV_ENVIRONMENT
    }

    /// CORS headers attached to every response.
    #[must_use]
    pub fn cors_policy(&self) -> CorsPolicy {
        CorsPolicy::new(
            self.app.allow_origins.iter().cloned(),
            self.app.allow_methods.iter().cloned(),
            self.app.allow_headers.iter().cloned(),
        )
    }

    /// Logging settings in the form `mirage-telemetry` takes.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let logging = &self.logging;
        LogConfig {
            enabled: logging.enabled,
            level: logging.level.clone(),
            json_format: logging.json_format,
            include_target: logging.include_target,
            file_line_info: logging.file_line_info,
            thread_ids: logging.thread_ids,
            service_name: logging.service_name.clone(),
        }
    }

    /// Metrics settings in the form `mirage-telemetry` takes.
    #[must_use]
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.metrics.enabled,
            addr: self.metrics.addr.clone(),
            ..MetricsConfig::default()
        }
    }

    /// Default cache TTL.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl_secs)
    }

    /// Request body timeout.
    #[must_use]
    pub const fn body_timeout(&self) -> Duration {
        Duration::from_secs(self.server.body_timeout_secs)
    }

    /// Graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}
