//! Route table.

use std::any::Any;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::handlers::{get_history, serve_fixture};
use crate::health::{health_live, healthcheck};
use crate::metrics::{metrics_handler, MetricsConfig};
use crate::middleware::{current_request_id, RequestTrackingLayer};
use crate::problem::{ProblemDetails, PROBLEM_INTERNAL_ERROR};
use crate::AppState;

/// Build the service router.
///
/// | Route                       | Handler             |
/// |-----------------------------|---------------------|
/// | `GET, POST /api/{*subpath}` | [`serve_fixture`]   |
/// | `GET /history/{*subpath}`   | [`get_history`]     |
/// | `GET /healthcheck`          | [`healthcheck`]     |
/// | `GET /health/live`          | [`health_live`]     |
/// | `GET <metrics path>`        | [`metrics_handler`] |
///
/// The metrics route is only mounted when metrics are enabled. Bodies on
/// `/api` are capped by `max_body_bytes` and unlimited when it is unset.
pub fn build_router(state: AppState, metrics: &MetricsConfig) -> Router {
    let body_limit = match state.config().max_body_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let mut router = Router::new()
        .route(
            "/api/{*subpath}",
            get(serve_fixture).post(serve_fixture).layer(body_limit),
        )
        .route("/history/{*subpath}", get(get_history))
        .route("/healthcheck", get(healthcheck))
        .route("/health/live", get(health_live));

    if metrics.enabled {
        router = router.route(&metrics.path, get(metrics_handler));
    }

    with_service_layers(router).with_state(state)
}

/// Panic recovery inside request tracking, so panics still get an id.
fn with_service_layers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(RequestTrackingLayer)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("handler panicked");
    tracing::error!(panic = detail, "handler panicked");

    let problem = ProblemDetails::new(
        PROBLEM_INTERNAL_ERROR,
        "Internal Error",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .with_detail(detail);

    match current_request_id() {
        Some(id) => problem.with_request_id(id.as_str()),
        None => problem,
    }
    .into_response()
}
