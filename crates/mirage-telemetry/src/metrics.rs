//! Prometheus metrics.
//!
//! Metrics are recorded through the `metrics` facade. Until a recorder is
//! installed every call is a no-op, so the dispatcher records
//! unconditionally.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `mirage_requests_total` | Counter | `route`, `http_code` |
//! | `mirage_request_duration_seconds` | Histogram | `route` |
//! | `mirage_requests_in_flight` | Gauge | - |
//! | `mirage_middleware_rejections_total` | Counter | `middleware` |

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Total dispatched requests.
pub const REQUESTS_TOTAL: &str = "mirage_requests_total";
/// Dispatch latency.
pub const REQUEST_DURATION_SECONDS: &str = "mirage_request_duration_seconds";
/// Requests currently being dispatched.
pub const REQUESTS_IN_FLIGHT: &str = "mirage_requests_in_flight";
/// Requests stopped by a middleware.
pub const MIDDLEWARE_REJECTIONS_TOTAL: &str = "mirage_middleware_rejections_total";

/// Route label used for requests that matched nothing.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Listener address of the Prometheus scrape endpoint.
    pub addr: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Handle onto an installed recorder.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Wraps a Prometheus handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders every metric in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn builder(config: &MetricsConfig) -> TelemetryResult<PrometheusBuilder> {
    let builder = PrometheusBuilder::new();
    if config.duration_buckets.is_empty() {
        return Ok(builder);
    }
    builder
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Installs the global recorder and starts the scrape listener.
///
/// Does nothing when `config.enabled` is false. The listener runs on the
/// current tokio runtime, or on a dedicated one when called outside a
/// runtime.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidAddress`] for a bad address and
/// [`TelemetryError::MetricsInit`] when a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    builder(config)?
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    describe_metrics();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

/// Installs the global recorder without a listener.
///
/// Use this when the application exposes [`MetricsRegistry::render`]
/// itself.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] when a recorder is already
/// installed.
pub fn install_recorder(config: &MetricsConfig) -> TelemetryResult<MetricsRegistry> {
    let handle = builder(config)?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    describe_metrics();
    Ok(MetricsRegistry::new(handle))
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of dispatched requests");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Request dispatch duration in seconds"
    );
    describe_gauge!(
        REQUESTS_IN_FLIGHT,
        "Number of requests currently being dispatched"
    );
    describe_counter!(
        MIDDLEWARE_REJECTIONS_TOTAL,
        "Requests rejected by a middleware"
    );
}

/// Records a finished dispatch.
pub fn record_request(route: &str, http_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "route" => route.to_string(),
        "http_code" => http_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "route" => route.to_string())
        .record(duration.as_secs_f64());
}

/// Records a middleware rejection.
pub fn record_rejection(middleware: &str) {
    counter!(MIDDLEWARE_REJECTIONS_TOTAL, "middleware" => middleware.to_string()).increment(1);
}

/// Keeps `mirage_requests_in_flight` raised while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge. It is decremented on drop.
    #[must_use]
    pub fn new() -> Self {
        gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}
