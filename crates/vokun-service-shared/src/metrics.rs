//! Prometheus metrics for the mock API server.
//!
//! This module provides:
//! - [`MetricsConfig`]: whether to install the recorder and where to expose it
//! - [`init_metrics`]: install the Prometheus recorder
//! - [`metrics_handler`]: axum handler rendering the exposition text
//! - helpers for the audit, fixture, history and health counters
//!
//! The `metrics` macros are no-ops until a recorder is installed, so the
//! helpers are safe to call from tests.
//!
//! # Example
//!
//! ```no_run
//! use vokun_service_shared::metrics::{init_metrics, metrics_handler, MetricsConfig};
//! use axum::{routing::get, Router};
//!
//! let config = MetricsConfig::from_env();
//! if config.enabled {
//!     init_metrics(&config).expect("recorder installed once");
//! }
//!
//! let app: Router = Router::new().route(&config.path, get(metrics_handler));
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vokun_lib::HealthCheckStats;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Configuration for the metrics system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Route serving the exposition text.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Create configuration from environment variables.
    ///
    /// - `METRICS_ENABLED`: anything but "false" enables (default: true)
    /// - `METRICS_PATH`: endpoint path (default: "/metrics")
    pub fn from_env() -> Self {
        let enabled = std::env::var("METRICS_ENABLED")
            .map(|v| !v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let path = std::env::var("METRICS_PATH")
            .ok()
            .filter(|p| p.starts_with('/'))
            .unwrap_or_else(|| "/metrics".to_string());

        Self { enabled, path }
    }
}

/// Errors that can occur while installing the recorder.
#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    #[error("metrics are disabled")]
    Disabled,
    #[error("metrics recorder already initialized")]
    AlreadyInitialized,
    #[error("failed to install metrics recorder: {0}")]
    InstallFailed(String),
}

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if PROMETHEUS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// The installed handle, if [`init_metrics`] succeeded.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Axum handler for the metrics endpoint (Prometheus exposition format).
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

/// A request row was written to the audit log.
pub fn record_request_recorded() {
    metrics::counter!("vokun_requests_recorded_total").increment(1);
}

/// Writing the audit row failed; the call was answered with a 500.
pub fn record_request_record_failed() {
    metrics::counter!("vokun_request_record_failures_total").increment(1);
}

/// A fixture was served with `status`.
pub fn record_fixture_served(status: u16) {
    metrics::counter!(
        "vokun_fixtures_served_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Fixture resolution failed; `kind` is the error kind label
/// (`not-found`, `malformed-fixture`, `internal`).
pub fn record_fixture_failed(kind: &str) {
    metrics::counter!(
        "vokun_fixture_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// A history lookup returned `count` entries.
pub fn record_history_lookup(count: usize) {
    metrics::counter!("vokun_history_lookups_total").increment(1);
    metrics::histogram!("vokun_history_entries_returned").record(count as f64);
}

/// Publish the outcome of a health check as gauges.
pub fn record_health_check(stats: &HealthCheckStats) {
    metrics::gauge!("vokun_db_error_rate").set(stats.db.error_rate);
    metrics::gauge!("vokun_db_roundtrip").set(stats.db.round_trip);
    metrics::gauge!("vokun_db_connections").set(stats.db.connections as f64);
}
