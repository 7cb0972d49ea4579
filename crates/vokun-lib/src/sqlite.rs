//! SQLite-backed [`Datastore`] over an `r2d2` connection pool.
//!
//! Every pooled connection runs in WAL mode with a busy timeout. Callers
//! that find the pool exhausted wait up to [`CHECKOUT_TIMEOUT`] for a
//! connection to come back.

use std::path::Path;
use std::time::Duration;

use r2d2::{HandleError, ManageConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::{debug, warn};

use crate::datastore::{Datastore, PoolStats, Row};
use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a caller waits for a free connection before failing.
pub const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on simultaneously open connections.
pub const DEFAULT_MAX_OPEN: usize = 10;

/// Routes pool-internal connection failures to `tracing`.
#[derive(Debug)]
struct LogPoolErrors;

impl HandleError<rusqlite::Error> for LogPoolErrors {
    fn handle_error(&self, error: rusqlite::Error) {
        warn!(error = %error, "sqlite pool connection error");
    }
}

/// Pooled SQLite client.
#[derive(Clone)]
pub struct SqliteDatastore {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for SqliteDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatastore")
            .field("stats", &self.stats())
            .finish()
    }
}

impl SqliteDatastore {
    /// Open a pool of at most `max_open` connections (at least one) over the
    /// database file at `path`.
    ///
    /// A connection is opened up front so a bad path fails here rather than
    /// on the first request.
    pub fn open(path: impl AsRef<Path>, max_open: usize) -> Result<Self> {
        let path = path.as_ref();
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_init(configure_connection);

        drop(manager.connect()?);

        let max_size = u32::try_from(max_open.max(1)).unwrap_or(u32::MAX);
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(1))
            .connection_timeout(CHECKOUT_TIMEOUT)
            .error_handler(Box::new(LogPoolErrors))
            .build(manager)?;

        debug!(path = %path.display(), max_open = max_size, "opened sqlite datastore");
        Ok(Self { pool })
    }

    /// Run `f` on a pooled connection. The connection goes back to the pool
    /// when `f` returns or unwinds.
    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.pool.get()?;
        f(&conn)
    }
}

impl Datastore for SqliteDatastore {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        self.with_connection(|conn| Ok(conn.execute(sql, params_from_iter(params.iter()))?))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(columns.len());
                for index in 0..columns.len() {
                    values.push(row.get::<_, Value>(index)?);
                }
                collected.push(Row::new(columns.clone(), values));
            }
            Ok(collected)
        })
    }

    fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn stats(&self) -> PoolStats {
        let state = self.pool.state();
        let open = state.connections as usize;
        let idle = state.idle_connections as usize;
        PoolStats {
            open_connections: open,
            idle_connections: idle,
            in_use: open.saturating_sub(idle),
            max_open: self.pool.max_size() as usize,
        }
    }
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    })?;
    conn.busy_timeout(BUSY_TIMEOUT)
}
