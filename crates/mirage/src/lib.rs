//! # Mirage
//!
//! **A REST micro-framework with enveloped JSON responses**
//!
//! - **Route collections** – endpoints grouped under a prefix, validated and
//!   registered once at boot; duplicates fail the boot
//! - **Ordered middlewares** – each route runs its checks in declaration
//!   order and the first rejection ends the request
//! - **One envelope per response** – `status` block with HTTP code, dev code,
//!   developer and translated messages, plus the handler's `output`
//! - **Service registry** – lazily built singletons resolved by name
//! - **Job pipelines** – optional parallel execution of independent jobs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mirage::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_optional_file("mirage.toml")?.load()?;
//!     mirage::init_telemetry(&config)?;
//!
//!     let users = RouteCollection::new("/users").route(
//!         Route::get("/:id", "getUser").handler(handler_fn(|ctx| async move {
//!             Ok(Envelope::ok(json!({ "id": ctx.path_param("id") })))
//!         })),
//!     );
//!
//!     let app = RestApp::builder().config(config).collection(users).build()?;
//!     Server::new(Arc::new(app)).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request lifecycle
//!
//! ```text
//! Idle → Matching → BeforeHooks → Handling → AfterHook → Sent
//!  │        │            │           │
//!  │        └→ NotFound ─┼───────────┼──────────────────→ Sent
//!  │                     └→ Aborted ←┘ ─────────────────→ Sent
//!  └→ Sent (OPTIONS preflight)
//! ```

#![doc(html_root_url = "https://docs.rs/mirage/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use mirage_core as core;

// Re-export router types
pub use mirage_router as router;

// Re-export middleware types
pub use mirage_middleware as middleware;

// Re-export configuration
pub use mirage_config as config;

// Re-export logging and metrics
pub use mirage_telemetry as telemetry;

// Re-export job pipelines
pub use mirage_tasks as tasks;

// Re-export routes, dispatcher and transport
pub use mirage_server as server;

use mirage_config::AppConfig;
use mirage_telemetry::TelemetryError;

/// Initializes logging and, when enabled, the Prometheus exporter from the
/// `logging` and `metrics` sections of `config`.
///
/// Call once at startup, inside a tokio runtime when metrics are enabled.
///
/// # Errors
///
/// Returns [`TelemetryError`] if a subscriber is already installed or the
/// exporter cannot start.
pub fn init_telemetry(config: &AppConfig) -> Result<(), TelemetryError> {
    mirage_telemetry::init_logging(&config.log_config())?;
    mirage_telemetry::init_metrics(&config.metrics_config())?;
    mirage_telemetry::tracing::info!(
        environment = %config.app.environment,
        metrics = config.metrics.enabled,
        "telemetry initialized"
    );
    Ok(())
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use mirage::prelude::*;
///
/// let app = RestApp::builder().build().unwrap();
/// assert_eq!(app.route_count(), 0);
/// ```
pub mod prelude {
    pub use mirage_core::{
        codes, handler_fn, ApiError, ApiResult, BootError, BootResult, BoxFuture, Controller,
        Envelope, Handler, MemoryCache, RequestContext, RequestId, ServiceRegistry, Translator,
    };

    // Service names registered at boot
    pub use mirage_core::names;

    pub use mirage_middleware::{
        middleware_fn, Acl, AclMiddleware, AuthMiddleware, Hs256Authenticator, Middleware,
        RequestHashMiddleware, SharedMiddleware,
    };

    pub use mirage_config::{AppConfig, ConfigLoader};

    pub use mirage_tasks::{ExecutionMode, Job, Pipeline};

    pub use mirage_server::{
        request_hash_middleware, DispatchState, Lifecycle, RestApp, Route, RouteCollection,
        Server, ShutdownSignal,
    };
}
