//! Request tracking middleware.
//!
//! [`RequestTrackingLayer`] wraps every route and:
//! - takes the `X-Request-ID` header or generates a UUID v7 ([`CorrelationId`])
//! - stores the id in the request extensions for handlers
//! - opens an `info_span` carrying the id, method and route
//! - records `http_requests_total` and `http_request_duration_seconds`
//! - echoes the id back in the `X-Request-ID` response header
//!
//! While the inner service runs, the id is also reachable through
//! [`current_request_id`], for code that only sees the task (panic handlers).
//!
//! Routes are labelled by their matched pattern (`/api/{*subpath}`) rather
//! than the raw path so mocked subpaths do not explode label cardinality.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::{FromRequestParts, MatchedPath};
use http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Request, Response};
use pin_project_lite::pin_project;
use tokio::task::futures::TaskLocalFuture;
use tower::{Layer, Service};
use tracing::{info_span, Span};
use uuid::Uuid;

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

tokio::task_local! {
    static CURRENT_REQUEST_ID: CorrelationId;
}

/// Id of the request whose service future is being polled, if any.
pub fn current_request_id() -> Option<CorrelationId> {
    CURRENT_REQUEST_ID.try_with(Clone::clone).ok()
}

/// Correlation id of one HTTP exchange.
///
/// Distinct from the audit row id: clients may supply any string here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new UUID v7 id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Handlers get the id stored by the middleware, or derive one from the
/// headers when running without it.
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CorrelationId>()
            .cloned()
            .unwrap_or_else(|| extract_or_generate_request_id(&parts.headers)))
    }
}

/// Extract the `X-Request-ID` header, or generate a UUID v7 when it is
/// missing, empty or not valid UTF-8.
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> CorrelationId {
    headers
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(CorrelationId::from)
        .unwrap_or_else(CorrelationId::generate)
}

/// Metric label for a request: the matched route pattern, or `unmatched`.
pub fn route_label<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

fn status_bucket(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Tower layer installing [`RequestTracking`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTrackingLayer;

impl<S> Layer<S> for RequestTrackingLayer {
    type Service = RequestTracking<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTracking { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestTracking<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestTracking<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: http_body::Body + Send + 'static,
    ResBody: http_body::Body + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TrackedFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let route = route_label(&req);
        let request_id = extract_or_generate_request_id(req.headers());
        req.extensions_mut().insert(request_id.clone());

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            route = %route,
            path = %req.uri().path(),
        );
        span.in_scope(|| tracing::debug!("handling request"));

        let inner = CURRENT_REQUEST_ID.sync_scope(request_id.clone(), || self.inner.call(req));

        TrackedFuture {
            inner: CURRENT_REQUEST_ID.scope(request_id.clone(), inner),
            start,
            method,
            route,
            request_id,
            span,
        }
    }
}

pin_project! {
    /// Records metrics and stamps the response once the inner future is done.
    pub struct TrackedFuture<F> {
        #[pin]
        inner: TaskLocalFuture<CorrelationId, F>,
        start: Instant,
        method: String,
        route: String,
        request_id: CorrelationId,
        span: Span,
    }
}

impl<F, ResBody, E> Future for TrackedFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: http_body::Body,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();

        let mut result = match this.inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        let elapsed = this.start.elapsed().as_secs_f64();
        let status = match &mut result {
            Ok(response) => {
                if let Ok(value) = HeaderValue::from_str(this.request_id.as_str()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                response.status().as_u16()
            }
            Err(_) => 500,
        };

        metrics::counter!(
            "http_requests_total",
            "method" => this.method.clone(),
            "route" => this.route.clone(),
            "status" => status_bucket(status)
        )
        .increment(1);
        metrics::histogram!(
            "http_request_duration_seconds",
            "method" => this.method.clone(),
            "route" => this.route.clone()
        )
        .record(elapsed);

        if status >= 500 {
            tracing::warn!(status, latency_ms = elapsed * 1000.0, "request failed");
        } else {
            tracing::info!(status, latency_ms = elapsed * 1000.0, "request completed");
        }

        Poll::Ready(result)
    }
}
