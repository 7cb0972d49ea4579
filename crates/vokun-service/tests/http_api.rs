//! End-to-end tests of the HTTP surface against a temporary SQLite file and
//! fixture tree.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use rusqlite::types::Value;
use serde_json::Value as Json;

use vokun_lib::{Datastore, Error, PoolStats, Result, Row, SqliteDatastore};
use vokun_service_shared::test_utils::TestContext;
use vokun_service_shared::{build_router, MetricsConfig};

const DOCUMENTED_FIXTURE: &str = "{\"headers\":{\"X\":\"Y\"},\"status_code\":200}\n---\nhello";

fn server(ctx: &TestContext) -> TestServer {
    let metrics = MetricsConfig {
        enabled: true,
        path: "/metrics".to_string(),
    };
    TestServer::new(build_router(ctx.state(), &metrics)).unwrap()
}

/// Accepts reads but refuses every write.
struct ReadOnlyStore(Arc<SqliteDatastore>);

impl Datastore for ReadOnlyStore {
    fn execute(&self, _sql: &str, _params: &[Value]) -> Result<usize> {
        Err(Error::datastore("database is read-only"))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.0.query(sql, params)
    }

    fn ping(&self) -> Result<()> {
        self.0.ping()
    }

    fn stats(&self) -> PoolStats {
        self.0.stats()
    }
}

#[tokio::test]
async fn serves_fixture_headers_and_body() {
    let ctx = TestContext::new();
    ctx.write_fixture("foo.get", DOCUMENTED_FIXTURE);
    let server = server(&ctx);

    let response = server.get("/api/foo").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.headers().get("x").unwrap(), "Y");
    assert_eq!(response.text(), "hello");
}

#[tokio::test]
async fn applies_fixture_status_for_post() {
    let ctx = TestContext::new();
    ctx.write_fixture(
        "v1/users.post",
        "{\"headers\":{\"Location\":\"/v1/users/7\"},\"status_code\":201}\n---\n{\"id\":7}",
    );
    let server = server(&ctx);

    let response = server
        .post("/api/v1/users")
        .bytes(Bytes::from_static(b"{\"name\":\"ada\"}"))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.headers().get("location").unwrap(), "/v1/users/7");
    assert_eq!(response.text(), "{\"id\":7}");
}

#[tokio::test]
async fn verb_selects_fixture_file() {
    let ctx = TestContext::new();
    ctx.write_fixture("items.get", "{}\n---\nlist");
    let server = server(&ctx);

    assert_eq!(server.get("/api/items").await.text(), "list");
    let response = server.post("/api/items").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_returns_recorded_request() {
    let ctx = TestContext::new();
    ctx.write_fixture("users.post", "{}\n---\nok");
    let server = server(&ctx);

    server
        .post("/api/users")
        .add_query_param("a", "1")
        .add_query_param("a", "2")
        .add_query_param("b", "3")
        .add_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("t-1"),
        )
        .bytes(Bytes::from_static(b"payload"))
        .await;

    let history: Json = server.get("/history/users").await.json();
    assert_eq!(history["meta"]["status"], "ok");
    assert_eq!(history["meta"]["message"], "");
    assert_eq!(history["meta"]["count"], 1);

    let entry = &history["data"][0];
    assert_eq!(entry["subpath"], "users");
    assert_eq!(entry["body"], "cGF5bG9hZA==");
    assert!(entry["timestamp"].is_string());

    let params = entry["query-params"].as_array().unwrap();
    assert_eq!(params.len(), 2);
    assert!(params.contains(&serde_json::json!({"name": "a", "value": ["1", "2"]})));
    assert!(params.contains(&serde_json::json!({"name": "b", "value": ["3"]})));

    let headers = entry["headers"].as_array().unwrap();
    assert!(headers.contains(&serde_json::json!({"name": "x-trace", "value": ["t-1"]})));
}

#[tokio::test]
async fn history_is_oldest_first_and_exact_match() {
    let ctx = TestContext::new();
    ctx.write_fixture("orders.post", "{}\n---\nok");
    let server = server(&ctx);

    for body in ["first", "second", "third"] {
        server
            .post("/api/orders")
            .bytes(Bytes::from(body.as_bytes().to_vec()))
            .await;
    }
    server.get("/api/orders/1").await;

    let history: Json = server.get("/history/orders").await.json();
    assert_eq!(history["meta"]["count"], 3);
    let bodies: Vec<&str> = history["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["Zmlyc3Q=", "c2Vjb25k", "dGhpcmQ="]);

    let nested: Json = server.get("/history/orders/1").await.json();
    assert_eq!(nested["meta"]["count"], 1);
}

#[tokio::test]
async fn history_for_unknown_subpath_is_empty() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let history: Json = server.get("/history/nothing-here").await.json();
    assert_eq!(history["meta"]["count"], 0);
    assert_eq!(history["data"], serde_json::json!([]));
}

#[tokio::test]
async fn missing_fixture_is_404_but_still_recorded() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server.get("/api/ghost").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    let problem: Json = response.json();
    assert_eq!(problem["type"], "/problems/fixture-not-found");
    assert_eq!(problem["status"], 404);

    let history: Json = server.get("/history/ghost").await.json();
    assert_eq!(history["meta"]["count"], 1);
}

#[tokio::test]
async fn malformed_fixture_is_500() {
    let ctx = TestContext::new();
    ctx.write_fixture("broken.get", "{\"status_code\":200}no separator");
    let server = server(&ctx);

    let response = server.get("/api/broken").await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let problem: Json = response.json();
    assert_eq!(problem["type"], "/problems/malformed-fixture");
}

#[tokio::test]
async fn record_failure_is_500_and_skips_fixture() {
    let sqlite_ctx = TestContext::new();
    let sqlite =
        Arc::new(SqliteDatastore::open(sqlite_ctx.temp_path().join("ro.db"), 2).unwrap());
    let ctx = TestContext::with_datastore(Arc::new(ReadOnlyStore(sqlite)));
    ctx.write_fixture("foo.get", DOCUMENTED_FIXTURE);
    let server = server(&ctx);

    let response = server.get("/api/foo").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get("x").is_none());
    let problem: Json = response.json();
    assert_eq!(problem["type"], "/problems/internal-error");
    assert!(problem["detail"]
        .as_str()
        .unwrap()
        .contains("failed to record request"));
}

#[tokio::test]
async fn large_body_is_served_and_recorded() {
    let ctx = TestContext::new();
    ctx.write_fixture("uploads.post", "{\"status_code\":202}\n---\nstored");
    let server = server(&ctx);

    let response = server
        .post("/api/uploads")
        .bytes(Bytes::from(vec![b'x'; 3 * 1024 * 1024]))
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    assert_eq!(response.text(), "stored");

    let history: Json = server.get("/history/uploads").await.json();
    assert_eq!(history["meta"]["count"], 1);
    let body = history["data"][0]["body"].as_str().unwrap();
    assert_eq!(body.len(), 4 * 1024 * 1024);
}

#[tokio::test]
async fn configured_body_limit_rejects_oversized_body() {
    let ctx = TestContext::configured(|config| config.max_body_bytes = Some(1024));
    ctx.write_fixture("uploads.post", "{}\n---\nstored");
    let server = server(&ctx);

    let small = server
        .post("/api/uploads")
        .bytes(Bytes::from(vec![b'x'; 512]))
        .await;
    assert_eq!(small.status_code(), StatusCode::OK);

    let large = server
        .post("/api/uploads")
        .bytes(Bytes::from(vec![b'x'; 4096]))
        .await;
    assert_eq!(large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn request_id_is_echoed_and_used_as_instance() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server
        .get("/api/ghost")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("corr-42"),
        )
        .await;

    assert_eq!(response.headers().get("x-request-id").unwrap(), "corr-42");
    let problem: Json = response.json();
    assert_eq!(problem["instance"], "corr-42");
}

#[tokio::test]
async fn generates_request_id_when_absent() {
    let ctx = TestContext::new();
    ctx.write_fixture("foo.get", DOCUMENTED_FIXTURE);
    let server = server(&ctx);

    let response = server.get("/api/foo").await;
    let id = response.headers().get("x-request-id").unwrap();
    assert_eq!(id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn healthcheck_reports_datastore() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server.get("/healthcheck").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let stats: Json = response.json();
    assert_eq!(stats["status"], "ok");
    assert_eq!(stats["db"]["error_rate"], 0.0);
    assert!(stats["db"]["roundtrip"].as_f64().unwrap() >= 0.0);
    assert!(stats["db"]["connections"].is_u64());
}

#[tokio::test]
async fn liveness_reports_version() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let status: Json = server.get("/health/live").await.json();
    assert_eq!(status["status"], "ok");
    assert_eq!(status["service"], "vokun");
    assert_eq!(status["version"], "0.0.0-test");
}

#[tokio::test]
async fn metrics_route_answers() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_route_absent_when_disabled() {
    let ctx = TestContext::new();
    let metrics = MetricsConfig {
        enabled: false,
        path: "/metrics".to_string(),
    };
    let server = TestServer::new(build_router(ctx.state(), &metrics)).unwrap();

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
