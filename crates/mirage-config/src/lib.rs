//! Typed configuration for Mirage.
//!
//! [`AppConfig`] holds every setting a Mirage application reads at boot.
//! It is loaded in layers by [`ConfigLoader`]:
//! - defaults (or the development preset)
//! - TOML or JSON files, merged field by field
//! - environment variables `MIRAGE__SECTION__KEY`
//!
//! Unknown fields are rejected and the result is validated before use.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! body_timeout_secs = 30
//! max_body_bytes = 2097152
//!
//! [app]
//! environment = "dev"
//! log_mode = "complete"
//! lang = "en"
//! fallback_lang = "en"
//! allow_origins = ["*"]
//! enable_cache = true
//! enable_parallel = true
//!
//! [security]
//! jwt_hash_key = "change-me"
//! jwt_leeway_secs = 30
//!
//! [cache]
//! prefix = "_mirage_"
//!
//! [logging]
//! level = "info"
//! json_format = true
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```

#![doc(html_root_url = "https://docs.rs/mirage-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{AppConfig, DEV_ENVIRONMENT};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    AppSettings, CacheConfig, LoggingConfig, MetricsSettings, SecurityConfig, ServerConfig,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_file_parses() {
        let toml = r#"
            [server]
            http_addr = "0.0.0.0:8080"
            max_body_bytes = 2097152

            [app]
            environment = "dev"
            log_mode = "complete"
            allow_origins = ["*"]
            enable_parallel = true

            [security]
            jwt_hash_key = "change-me"
            jwt_leeway_secs = 30

            [metrics]
            enabled = true
            addr = "0.0.0.0:9090"
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert!(config.is_dev());
        assert!(config.app.enable_parallel);
        assert_eq!(config.security.jwt_leeway_secs, 30);
        assert!(config.metrics_config().enabled);
        assert_eq!(config.log_config().level, "info");
    }
}
