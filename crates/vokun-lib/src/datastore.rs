//! The storage surface the core needs from a SQL client.
//!
//! Parameters and result cells are owned [`Value`]s so implementations can be
//! swapped behind `dyn Datastore`, including in-memory fakes in tests.

use std::sync::Arc;

use rusqlite::types::Value;
use serde::Serialize;

use crate::error::{Error, Result};

/// Connection pool statistics reported by a datastore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Connections currently open, idle or in use.
    pub open_connections: usize,
    /// Open connections waiting in the pool.
    pub idle_connections: usize,
    /// Open connections checked out right now.
    pub in_use: usize,
    /// Upper bound on open connections.
    pub max_open: usize,
}

/// A SQL client safe to share across threads.
pub trait Datastore: Send + Sync {
    /// Run a parameterized statement, returning the number of changed rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run a parameterized query and collect every row.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Round-trip to the store to check it is alive.
    fn ping(&self) -> Result<()>;

    /// Snapshot of the connection pool.
    fn stats(&self) -> PoolStats;
}

impl<D: Datastore + ?Sized> Datastore for Arc<D> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        (**self).execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn stats(&self) -> PoolStats {
        (**self).stats()
    }
}

/// One result row of owned values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| Error::InvalidRow {
            column: self.column_name(index),
            message: format!("row has only {} columns", self.values.len()),
        })
    }

    /// Read a TEXT cell.
    pub fn text(&self, index: usize) -> Result<&str> {
        match self.value(index)? {
            Value::Text(text) => Ok(text),
            other => Err(self.type_mismatch(index, "text", other)),
        }
    }

    /// Read a BLOB cell. TEXT is accepted as its UTF-8 bytes and NULL as empty.
    pub fn blob(&self, index: usize) -> Result<&[u8]> {
        match self.value(index)? {
            Value::Blob(bytes) => Ok(bytes),
            Value::Text(text) => Ok(text.as_bytes()),
            Value::Null => Ok(&[]),
            other => Err(self.type_mismatch(index, "blob", other)),
        }
    }

    fn column_name(&self, index: usize) -> String {
        self.columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("#{index}"))
    }

    fn type_mismatch(&self, index: usize, expected: &str, found: &Value) -> Error {
        Error::InvalidRow {
            column: self.column_name(index),
            message: format!("expected {expected}, found {:?}", found.data_type()),
        }
    }
}
