//! Route handlers for the mocked API and its history.

mod fixtures;
mod history;

pub use fixtures::{header_params, query_params, serve_fixture};
pub use history::get_history;

use vokun_lib::{Error as LibError, Result as LibResult};

/// Run datastore or filesystem work on the blocking pool.
///
/// A panicked or cancelled task surfaces as an internal error.
pub(crate) async fn run_blocking<T, F>(work: F) -> LibResult<T>
where
    F: FnOnce() -> LibResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .unwrap_or_else(|e| Err(LibError::datastore(format!("blocking task failed: {e}"))))
}
