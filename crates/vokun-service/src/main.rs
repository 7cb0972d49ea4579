//! vokun mock API server.
//!
//! Answers calls from canned fixture files, records every call in SQLite, and
//! reports datastore health.
//!
//! # Endpoints
//!
//! - `GET|POST /api/{*subpath}` - record the call, then serve `<root>/<subpath>.<verb>`
//! - `GET /history/{*subpath}` - every recorded call for a subpath, oldest first
//! - `GET /healthcheck` - concurrent datastore probe
//! - `GET /health/live` - liveness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! # Configuration
//!
//! - `VOKUN_DB_PATH` - SQLite file (default: /data/vokun.db)
//! - `VOKUN_DB_MAX_CONNECTIONS` - pool size (default: 10)
//! - `VOKUN_FIXTURE_ROOT` - fixture directory (default: /opt/sonaak/vokun-api)
//! - `SERVICE_PORT` - HTTP port (default: 9000)
//! - `RUST_LOG` - log filter (default: info)
//! - `LOG_FORMAT` - json (default) or text
//! - `METRICS_ENABLED` - set to `false` to disable metrics

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn};

use vokun_service_shared::{
    build_router, init_logging, init_metrics, AppState, LoggingConfig, MetricsConfig,
    ServiceConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logging_config = LoggingConfig::from_env();
    init_logging(&logging_config).context("failed to initialize logging")?;

    let metrics_config = MetricsConfig::from_env();
    if metrics_config.enabled {
        if let Err(e) = init_metrics(&metrics_config) {
            warn!(error = %e, "failed to initialize metrics, continuing without metrics");
        }
    }

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    info!(
        db_path = %config.db_path.display(),
        fixture_root = %config.fixture_root.display(),
        port = config.port,
        version = %config.version,
        "starting vokun"
    );

    let port = config.port;
    let state = AppState::open(config).context("failed to initialize application state")?;
    let app = build_router(state, &metrics_config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
