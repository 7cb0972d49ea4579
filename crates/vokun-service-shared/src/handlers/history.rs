//! `/history/{*subpath}`: every recorded call for one subpath, oldest first.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tracing::error;

use super::run_blocking;
use crate::metrics::record_history_lookup;
use crate::middleware::CorrelationId;
use crate::problem::from_lib_error;
use crate::response::Envelope;
use crate::AppState;

pub async fn get_history(
    State(state): State<AppState>,
    Path(subpath): Path<String>,
    request_id: CorrelationId,
) -> Response {
    let audit_log = state.audit_log().clone();
    let lookup = subpath.clone();

    match run_blocking(move || audit_log.find_by_subpath(&lookup)).await {
        Ok(requests) => {
            record_history_lookup(requests.len());
            Envelope::ok(requests).into_response()
        }
        Err(e) => {
            error!(error = %e, subpath = %subpath, "history lookup failed");
            from_lib_error(&e, request_id.as_str()).into_response()
        }
    }
}
