//! Layered configuration loading.
//!
//! Layers apply in order, later ones winning:
//! 1. defaults (or a preset)
//! 2. configuration files and strings, merged field by field
//! 3. environment variables `PREFIX__SECTION__KEY`

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{ConfigError, ConfigResult};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "MIRAGE";

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use mirage_config::ConfigLoader;
///
/// # fn main() -> Result<(), mirage_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("config.toml")?
///     .with_env_prefix("MIRAGE")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: AppConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader seeded with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            env_prefix: None,
        }
    }

    /// Resets to the default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = AppConfig::default();
        self
    }

    /// Resets to the development preset.
    ///
    /// ```
    /// use mirage_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.app.environment, "dev");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = AppConfig::development();
        self
    }

    /// Merges a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or unreadable, has another extension,
    /// does not parse or names an unknown field.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))?;

        self.with_string(&content, &format)
    }

    /// Merges a file if it exists.
    ///
    /// # Errors
    ///
    /// Fails as [`with_file`](Self::with_file) does when the file exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges configuration text in `format` (`toml` or `json`).
    ///
    /// Only the fields present in `content` change.
    ///
    /// # Errors
    ///
    /// Fails for an unknown format, invalid text or an unknown field.
    ///
    /// # Example
    ///
    /// ```
    /// use mirage_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// assert_eq!(config.app.lang, "en");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> ConfigResult<Self> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => {
                toml::from_str::<AppConfig>(content)?;
                let raw: toml::Value = toml::from_str(content)?;
                serde_json::to_value(raw)?
            }
            "json" => {
                serde_json::from_str::<AppConfig>(content)?;
                serde_json::from_str(content)?
            }
            other => return Err(ConfigError::unsupported_format(other)),
        };

        let mut merged = serde_json::to_value(&self.config)?;
        merge(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(self)
    }

    /// Enables environment overrides under `prefix`.
    ///
    /// With prefix `MIRAGE`, `MIRAGE__SERVER__HTTP_ADDR=0.0.0.0:9000`
    /// overrides `server.http_addr`. List values are comma separated.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file from the working directory into the process
    /// environment. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> ConfigResult<Self> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::env_parse_error(".env", e.to_string())),
        }
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable override or an invalid configuration.
    pub fn load(mut self) -> ConfigResult<AppConfig> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> AppConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> ConfigResult<()> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();

        let c = &mut self.config;
        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => c.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => c.server.shutdown_timeout_secs = int(key, value)?,
            ["SERVER", "BODY_TIMEOUT_SECS"] => c.server.body_timeout_secs = int(key, value)?,
            ["SERVER", "MAX_BODY_BYTES"] => c.server.max_body_bytes = int(key, value)?,

            ["APP", "ENVIRONMENT"] => c.app.environment = value.to_string(),
            ["APP", "LOG_MODE"] => {
                c.app.log_mode = match value.to_lowercase().as_str() {
                    "complete" => mirage_core::LogMode::Complete,
                    "short" => mirage_core::LogMode::Short,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'complete' or 'short'")),
                };
            }
            ["APP", "LANG"] => c.app.lang = value.to_string(),
            ["APP", "FALLBACK_LANG"] => c.app.fallback_lang = value.to_string(),
            ["APP", "LANG_DIR"] => c.app.lang_dir = optional(value).map(Into::into),
            ["APP", "ALLOW_ORIGINS"] => c.app.allow_origins = list(value),
            ["APP", "ALLOW_METHODS"] => c.app.allow_methods = list(value),
            ["APP", "ALLOW_HEADERS"] => c.app.allow_headers = list(value),
            ["APP", "ENABLE_CACHE"] => c.app.enable_cache = boolean(key, value)?,
            ["APP", "ENABLE_PARALLEL"] => c.app.enable_parallel = boolean(key, value)?,

            ["SECURITY", "JWT_HASH_KEY"] => c.security.jwt_hash_key = optional(value),
            ["SECURITY", "REQUEST_HASH_KEY"] => c.security.request_hash_key = optional(value),
            ["SECURITY", "JWT_LEEWAY_SECS"] => c.security.jwt_leeway_secs = int(key, value)?,
            ["SECURITY", "REQUEST_HASH_MAX_SKEW_SECS"] => {
                c.security.request_hash_max_skew_secs = match optional(value) {
                    Some(v) => Some(int(key, &v)?),
                    None => None,
                };
            }

            ["CACHE", "PREFIX"] => c.cache.prefix = value.to_string(),
            ["CACHE", "DEFAULT_TTL_SECS"] => c.cache.default_ttl_secs = int(key, value)?,

            ["LOGGING", "ENABLED"] => c.logging.enabled = boolean(key, value)?,
            ["LOGGING", "LEVEL"] => c.logging.level = value.to_string(),
            ["LOGGING", "JSON_FORMAT"] => c.logging.json_format = boolean(key, value)?,
            ["LOGGING", "INCLUDE_TARGET"] => c.logging.include_target = boolean(key, value)?,
            ["LOGGING", "FILE_LINE_INFO"] => c.logging.file_line_info = boolean(key, value)?,
            ["LOGGING", "THREAD_IDS"] => c.logging.thread_ids = boolean(key, value)?,
            ["LOGGING", "SERVICE_NAME"] => c.logging.service_name = value.to_string(),

            ["METRICS", "ENABLED"] => c.metrics.enabled = boolean(key, value)?,
            ["METRICS", "ADDR"] => c.metrics.addr = value.to_string(),

            // Unknown keys are ignored.
            _ => {}
        }

        Ok(())
    }
}

// Recursively overlays `layer` onto `base`. Objects merge, everything else
// is replaced.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn int<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn boolean(key: &str, value: &str) -> ConfigResult<bool> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Parses a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert!(config.is_dev());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_string_layers_merge_field_by_field() {
        let config = ConfigLoader::new()
            .with_development()
            .with_string("[app]\nlang = \"fa\"", "toml")
            .unwrap()
            .with_string(r#"{"server": {"max_body_bytes": 1024}}"#, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.app.lang, "fa");
        assert_eq!(config.app.environment, "dev");
        assert_eq!(config.server.max_body_bytes, 1024);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unknown_field_fails() {
        let err = ConfigLoader::new()
            .with_string("[app]\nlanguage = \"fa\"", "toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));

        let err = ConfigLoader::new()
            .with_string(r#"{"cache": {"ttl": 1}}"#, "json")
            .unwrap_err();
        assert!(matches!(err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigLoader::new().with_string("a: 1", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[security]\njwt_hash_key = \"k\"\njwt_leeway_secs = 5").unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.security.jwt_hash_key.as_deref(), Some("k"));
        assert_eq!(config.security.jwt_leeway_secs, 5);
    }

    #[test]
    fn test_with_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        writeln!(file, "x=1").unwrap();
        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_with_file_not_found() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/mirage.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/mirage.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_validates() {
        let err = ConfigLoader::new()
            .with_string("[server]\nhttp_addr = \"nope\"", "toml")
            .unwrap()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let config = ConfigLoader::new()
            .with_string("[server]\nhttp_addr = \"nope\"", "toml")
            .unwrap()
            .load_unvalidated();
        assert_eq!(config.server.http_addr, "nope");
    }

    #[test]
    fn test_apply_env_vars() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("T__SERVER__HTTP_ADDR", "127.0.0.1:9000", "T").unwrap();
        loader.apply_env_var("T__APP__ALLOW_ORIGINS", "https://a.io, https://b.io", "T").unwrap();
        loader.apply_env_var("T__APP__LOG_MODE", "complete", "T").unwrap();
        loader.apply_env_var("T__APP__ENABLE_CACHE", "off", "T").unwrap();
        loader.apply_env_var("T__SECURITY__REQUEST_HASH_MAX_SKEW_SECS", "300", "T").unwrap();
        loader.apply_env_var("T__SECURITY__JWT_HASH_KEY", "", "T").unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.server.http_addr, "127.0.0.1:9000");
        assert_eq!(config.app.allow_origins, vec!["https://a.io", "https://b.io"]);
        assert_eq!(config.app.log_mode, mirage_core::LogMode::Complete);
        assert!(!config.app.enable_cache);
        assert_eq!(config.security.request_hash_max_skew_secs, Some(300));
        assert_eq!(config.security.jwt_hash_key, None);
    }

    #[test]
    fn test_apply_env_var_errors() {
        let mut loader = ConfigLoader::new();
        assert!(loader.apply_env_var("T__SERVER__MAX_BODY_BYTES", "lots", "T").is_err());
        assert!(loader.apply_env_var("T__METRICS__ENABLED", "maybe", "T").is_err());
        assert!(loader.apply_env_var("T__APP__LOG_MODE", "verbose", "T").is_err());
        assert!(loader.apply_env_var("T__NOPE__KEY", "x", "T").is_ok());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_merge_replaces_leaves_and_merges_objects() {
        let mut base = serde_json::json!({"a": {"x": 1, "y": 2}, "b": [1]});
        merge(&mut base, serde_json::json!({"a": {"y": 3}, "b": [2, 3]}));
        assert_eq!(base, serde_json::json!({"a": {"x": 1, "y": 3}, "b": [2, 3]}));
    }
}
