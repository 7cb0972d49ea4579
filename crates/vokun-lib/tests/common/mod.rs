#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rusqlite::types::Value;
use tempfile::TempDir;
use vokun_lib::{AuditLog, Datastore, Error, PoolStats, Result, Row, SqliteDatastore};

/// A fresh SQLite-backed audit log in its own temp directory.
pub fn sqlite_audit_log() -> (TempDir, Arc<SqliteDatastore>, AuditLog) {
    let dir = TempDir::new().expect("create temp dir");
    let datastore =
        Arc::new(SqliteDatastore::open(dir.path().join("audit.db"), 4).expect("open datastore"));
    let audit = AuditLog::new(datastore.clone());
    audit.initialize().expect("create request table");
    (dir, datastore, audit)
}

/// Write `content` to `<root>/<name>`, creating parent directories.
pub fn write_fixture(root: &Path, name: &str, content: &[u8]) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(path, content).expect("write fixture");
}

/// Delegates reads to `inner` and rejects every write.
pub struct FailingWrites<D> {
    pub inner: D,
}

impl<D: Datastore> Datastore for FailingWrites<D> {
    fn execute(&self, _sql: &str, _params: &[Value]) -> Result<usize> {
        Err(Error::datastore("disk I/O error"))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.inner.query(sql, params)
    }

    fn ping(&self) -> Result<()> {
        self.inner.ping()
    }

    fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}

/// A datastore whose pings succeed or fail on demand and can be slowed down.
pub struct ScriptedPings {
    pub fail: bool,
    pub delay: Duration,
    pub open_connections: usize,
    pub pings: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedPings {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            delay: Duration::ZERO,
            open_connections: 3,
            pings: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Datastore for ScriptedPings {
    fn execute(&self, _sql: &str, _params: &[Value]) -> Result<usize> {
        Ok(0)
    }

    fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            Err(Error::datastore("connection refused"))
        } else {
            Ok(())
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            open_connections: self.open_connections,
            idle_connections: self.open_connections,
            in_use: 0,
            max_open: 10,
        }
    }
}
