//! Durable audit trail of every inbound request.
//!
//! Each request becomes one row of the `request` table. Headers and query
//! parameters are stored as JSON arrays of `{"name", "value"}` objects so
//! repeated names survive the round trip. A row is written by a single
//! `INSERT`, so a failed write leaves nothing behind for history reads.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use tracing::debug;

use crate::datastore::{Datastore, Row};
use crate::error::{Error, Result};
use crate::request::{Header, QueryParam, Request, RequestId};

/// Table holding audited requests.
pub const REQUEST_TABLE: &str = "request";

const CREATE_SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS request (
        id TEXT PRIMARY KEY NOT NULL,
        subpath TEXT NOT NULL,
        request_time TEXT NOT NULL,
        headers TEXT NOT NULL,
        query_params TEXT NOT NULL,
        body BLOB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS request_subpath_idx ON request (subpath, request_time)",
];

const INSERT_REQUEST: &str = "INSERT INTO request (id, subpath, request_time, headers, query_params, body) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const SELECT_BY_SUBPATH: &str = "SELECT subpath, request_time, headers, query_params, body \
     FROM request WHERE subpath = ?1 ORDER BY request_time ASC, id ASC";

/// Records requests and looks them up again by subpath.
#[derive(Clone)]
pub struct AuditLog {
    datastore: Arc<dyn Datastore>,
}

impl AuditLog {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }

    /// Create the `request` table and its subpath index when missing.
    pub fn initialize(&self) -> Result<()> {
        for statement in CREATE_SCHEMA {
            self.datastore.execute(statement, &[])?;
        }
        Ok(())
    }

    /// Persist `request` under a freshly generated id.
    pub fn record(&self, request: &Request) -> Result<RequestId> {
        let id = RequestId::generate();
        let headers = serde_json::to_string(&request.headers)?;
        let query_params = serde_json::to_string(&request.query_params)?;

        self.datastore.execute(
            INSERT_REQUEST,
            &[
                Value::Text(id.to_string()),
                Value::Text(request.subpath.clone()),
                Value::Text(format_timestamp(&request.timestamp)),
                Value::Text(headers),
                Value::Text(query_params),
                Value::Blob(request.body.clone()),
            ],
        )?;

        debug!(%id, subpath = %request.subpath, body_len = request.body.len(), "recorded request");
        Ok(id)
    }

    /// Every recorded request whose subpath equals `subpath` exactly, oldest
    /// first.
    ///
    /// A row that cannot be decoded fails the whole lookup.
    pub fn find_by_subpath(&self, subpath: &str) -> Result<Vec<Request>> {
        let rows = self
            .datastore
            .query(SELECT_BY_SUBPATH, &[Value::Text(subpath.to_string())])?;

        let requests = rows.iter().map(row_to_request).collect::<Result<Vec<_>>>()?;
        debug!(subpath, count = requests.len(), "loaded request history");
        Ok(requests)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("pool", &self.datastore.stats())
            .finish()
    }
}

/// Fixed-width UTC text, so lexical order matches time order.
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::InvalidRow {
            column: "request_time".to_string(),
            message: format!("{text:?} is not an RFC 3339 timestamp: {e}"),
        })
}

fn row_to_request(row: &Row) -> Result<Request> {
    let headers: Vec<Header> = serde_json::from_str(row.text(2)?)?;
    let query_params: Vec<QueryParam> = serde_json::from_str(row.text(3)?)?;

    Ok(Request {
        subpath: row.text(0)?.to_string(),
        timestamp: parse_timestamp(row.text(1)?)?,
        headers,
        query_params,
        body: row.blob(4)?.to_vec(),
    })
}
