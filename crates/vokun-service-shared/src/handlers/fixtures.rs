//! `/api/{*subpath}`: record the call, then answer from the fixture tree.

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, error, warn};
use vokun_lib::{group_params, ErrorKind, Fixture, Header, QueryParam, Request};

use super::run_blocking;
use crate::metrics::{
    record_fixture_failed, record_fixture_served, record_request_record_failed,
    record_request_recorded,
};
use crate::middleware::CorrelationId;
use crate::problem::{from_lib_error, ProblemDetails};
use crate::AppState;

/// Group inbound headers by name, in arrival order.
///
/// Names come out lower-cased; values that are not UTF-8 are converted lossily.
pub fn header_params(headers: &HeaderMap) -> Vec<Header> {
    group_params(headers.iter().map(|(name, value)| {
        (
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
    }))
}

/// Decode and group a raw query string (`a=1&a=2&b=3`).
pub fn query_params(raw: Option<&str>) -> Vec<QueryParam> {
    raw.map(|q| group_params(url::form_urlencoded::parse(q.as_bytes())))
        .unwrap_or_default()
}

/// Serve a mocked call.
///
/// The request is written to the audit log first. If that fails the caller
/// gets a 500 and the fixture tree is never consulted.
pub async fn serve_fixture(
    State(state): State<AppState>,
    method: Method,
    Path(subpath): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    request_id: CorrelationId,
    body: Bytes,
) -> Response {
    let request = Request::new(
        subpath.clone(),
        Utc::now(),
        body.to_vec(),
        header_params(&headers),
        query_params(raw_query.as_deref()),
    );

    let audit_log = state.audit_log().clone();
    match run_blocking(move || audit_log.record(&request)).await {
        Ok(audit_id) => {
            record_request_recorded();
            debug!(%audit_id, subpath = %subpath, "request recorded");
        }
        Err(e) => {
            record_request_record_failed();
            error!(error = %e, subpath = %subpath, "failed to record request");
            return ProblemDetails::internal_error(
                format!("failed to record request: {e}"),
                request_id.as_str(),
            )
            .into_response();
        }
    }

    let fixtures = state.fixtures().clone();
    let verb = method.as_str().to_string();
    let lookup_subpath = subpath.clone();
    let fixture = match run_blocking(move || fixtures.resolve(&lookup_subpath, &verb)).await {
        Ok(fixture) => fixture,
        Err(e) => {
            record_fixture_failed(e.kind().as_str());
            warn!(
                error = %e,
                kind = %e.kind(),
                subpath = %subpath,
                method = %method,
                "fixture resolution failed"
            );
            return from_lib_error(&e, request_id.as_str()).into_response();
        }
    };

    fixture_response(fixture, &request_id)
}

/// Turn a fixture into the HTTP response, rejecting status codes or headers
/// that cannot go on the wire.
fn fixture_response(fixture: Fixture, request_id: &CorrelationId) -> Response {
    let Ok(status) = StatusCode::from_u16(fixture.status_code) else {
        record_fixture_failed(ErrorKind::MalformedFixture.as_str());
        return ProblemDetails::malformed_fixture(
            format!("status_code {} is not a valid HTTP status", fixture.status_code),
            request_id.as_str(),
        )
        .into_response();
    };

    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in &fixture.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(Body::from(fixture.content)) {
        Ok(response) => {
            record_fixture_served(status.as_u16());
            response
        }
        Err(e) => {
            record_fixture_failed(ErrorKind::MalformedFixture.as_str());
            ProblemDetails::malformed_fixture(
                format!("fixture headers are not valid HTTP: {e}"),
                request_id.as_str(),
            )
            .into_response()
        }
    }
}
