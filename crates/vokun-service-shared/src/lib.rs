//! HTTP glue for the vokun mock API server.
//!
//! - [`AppState`]: datastore, audit log, fixture store and prober shared by handlers
//! - [`handlers`]: fixture serving and request history
//! - [`health`]: datastore health check and liveness probe
//! - [`ProblemDetails`]: RFC 9457 error responses
//! - [`Envelope`]: `{"meta", "data"}` wrapper for history results
//! - [`config`]: environment-driven [`ServiceConfig`]
//! - [`metrics`], [`logging`], [`middleware`]: observability
//!
//! All behavior lives in `vokun-lib`; handlers only translate HTTP to library
//! calls and run them on the blocking pool:
//!
//! ```text
//! request ──► RequestTrackingLayer ──► handler ──► spawn_blocking(vokun-lib) ──► response
//! ```
//!
//! # Testing Support
//!
//! [`test_utils`] builds isolated state in a temporary directory. Enable the
//! `test-utils` feature to use it from other crates.

#![deny(warnings)]

pub mod config;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod response;
mod router;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConfigError, ServiceConfig};
pub use handlers::{get_history, serve_fixture};
pub use health::{health_live, healthcheck, HealthStatus, SERVICE_NAME};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, metrics_handler, MetricsConfig, MetricsError};
pub use middleware::{
    current_request_id, extract_or_generate_request_id, CorrelationId, RequestTrackingLayer,
    REQUEST_ID_HEADER,
};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_FIXTURE_NOT_FOUND, PROBLEM_INTERNAL_ERROR,
    PROBLEM_MALFORMED_FIXTURE,
};
pub use response::{Envelope, Meta, ResponseStatus};
pub use router::build_router;
pub use state::{AppState, AppStateError};
