//! Health endpoints.
//!
//! - `GET /healthcheck`: runs the datastore probe and reports the pool state
//! - `GET /health/live`: liveness, touches nothing external

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::metrics::record_health_check;
use crate::middleware::CorrelationId;
use crate::problem::ProblemDetails;
use crate::AppState;

/// Service name reported by the liveness probe.
pub const SERVICE_NAME: &str = "vokun";

/// Liveness response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl HealthStatus {
    pub fn alive(version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: SERVICE_NAME.to_string(),
            version: version.to_string(),
        }
    }
}

/// Liveness probe.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"vokun","version":"0.1.0"}
/// ```
pub async fn health_live(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(HealthStatus::alive(&state.config().version)))
}

/// Datastore health check.
///
/// Runs the concurrent ping probe on the blocking pool. The report is
/// always returned with 200; `error_rate` carries the verdict.
///
/// ```text
/// GET /healthcheck
/// {"status":"ok","db":{"connections":1,"roundtrip":0.21,"error_rate":0.0}}
/// ```
pub async fn healthcheck(State(state): State<AppState>, request_id: CorrelationId) -> Response {
    let datastore = state.datastore();
    let prober = state.prober();

    match tokio::task::spawn_blocking(move || prober.check_health(&*datastore)).await {
        Ok(stats) => {
            record_health_check(&stats);
            if stats.db.error_rate > 0.0 {
                tracing::warn!(
                    error_rate = stats.db.error_rate,
                    roundtrip = stats.db.round_trip,
                    "datastore probe reported failures"
                );
            }
            Json(stats).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "health check task failed");
            ProblemDetails::internal_error("health check did not complete", request_id.as_str())
                .into_response()
        }
    }
}
