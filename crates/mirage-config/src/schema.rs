//! Configuration section types.
//!
//! Every section rejects unknown fields and fills missing ones with
//! defaults, so a file only needs to name what it changes.

use std::fmt;
use std::path::PathBuf;

use mirage_core::LogMode;
use serde::{Deserialize, Serialize};

/// HTTP transport settings.
///
/// # Example
///
/// ```
/// use mirage_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g. "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Time allowed to receive a request body, in seconds.
    #[serde(default = "default_body_timeout")]
    pub body_timeout_secs: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            body_timeout_secs: default_body_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_body_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// Application settings consumed by the dispatcher and the responder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppSettings {
    /// Deployment environment. `dev` exposes dev messages in responses.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// How much of each response payload is logged.
    #[serde(default)]
    pub log_mode: LogMode,

    /// Active language of the translator.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Language used when a code is missing from the active one.
    #[serde(default = "default_lang")]
    pub fallback_lang: String,

    /// Directory of `{lang}.json` catalogs merged over the built-in ones.
    #[serde(default)]
    pub lang_dir: Option<PathBuf>,

    /// `Access-Control-Allow-Origin` entries.
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,

    /// `Access-Control-Allow-Methods` entries.
    #[serde(default = "default_allow_methods")]
    pub allow_methods: Vec<String>,

    /// `Access-Control-Allow-Headers` entries.
    #[serde(default = "default_allow_headers")]
    pub allow_headers: Vec<String>,

    /// Whether the `cache` service stores anything.
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Whether job pipelines run in parallel.
    #[serde(default)]
    pub enable_parallel: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_mode: LogMode::default(),
            lang: default_lang(),
            fallback_lang: default_lang(),
            lang_dir: None,
            allow_origins: default_allow_origins(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            enable_cache: true,
            enable_parallel: false,
        }
    }
}

fn default_environment() -> String {
    "prod".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_allow_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_allow_headers() -> Vec<String> {
    [
        "Content-Type",
        "m-auth",
        "m-hash",
        "m-version",
        "m-time",
        "m-random",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_true() -> bool {
    true
}

/// Keys for token and request-integrity checks.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// HS256 key. The `security` service is registered only when set.
    #[serde(default)]
    pub jwt_hash_key: Option<String>,

    /// Shared key of the request hash middleware.
    #[serde(default)]
    pub request_hash_key: Option<String>,

    /// Clock leeway applied to `exp` and `nbf`, in seconds.
    #[serde(default)]
    pub jwt_leeway_secs: u64,

    /// Largest accepted distance between `m-time` and now, in seconds.
    #[serde(default)]
    pub request_hash_max_skew_secs: Option<u64>,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("SecurityConfig")
            .field("jwt_hash_key", &redact(&self.jwt_hash_key))
            .field("request_hash_key", &redact(&self.request_hash_key))
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("request_hash_max_skew_secs", &self.request_hash_max_skew_secs)
            .finish()
    }
}

/// Cache service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Prefix prepended to every key.
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,

    /// TTL used when none is given, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_cache_prefix(),
            default_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_prefix() -> String {
    mirage_core::cache::DEFAULT_PREFIX.to_string()
}

fn default_cache_ttl() -> u64 {
    mirage_core::cache::DEFAULT_TTL.as_secs()
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. "info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON output instead of pretty output.
    #[serde(default = "default_true")]
    pub json_format: bool,

    /// Include the module path.
    #[serde(default = "default_true")]
    pub include_target: bool,

    /// Include file and line.
    #[serde(default)]
    pub file_line_info: bool,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Service name logged at startup.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            json_format: true,
            include_target: true,
            file_line_info: false,
            thread_ids: false,
            service_name: default_service_name(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    mirage_telemetry::logging::DEFAULT_SERVICE_NAME.to_string()
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Enable the exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_defaults() {
        let app = AppSettings::default();
        assert_eq!(app.environment, "prod");
        assert_eq!(app.log_mode, LogMode::Short);
        assert_eq!(app.lang, "en");
        assert!(app.enable_cache);
        assert!(!app.enable_parallel);
        assert!(app.allow_headers.iter().any(|h| h == "m-auth"));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let app: AppSettings = toml::from_str("environment = \"dev\"").unwrap();
        assert_eq!(app.environment, "dev");
        assert_eq!(app.allow_origins, vec!["*"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<CacheConfig, _> = toml::from_str("prefx = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_security_debug_redacts_keys() {
        let security = SecurityConfig {
            jwt_hash_key: Some("top-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{security:?}");
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_cache_defaults_follow_core() {
        let cache = CacheConfig::default();
        assert_eq!(cache.prefix, "_mirage_");
        assert_eq!(cache.default_ttl_secs, 365 * 24 * 60 * 60);
    }
}
