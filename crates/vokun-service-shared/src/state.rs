//! Application state shared by all handlers.

use std::sync::Arc;

use vokun_lib::{AuditLog, Datastore, Error as LibError, FixtureStore, HealthProber, SqliteDatastore};

use crate::config::ServiceConfig;

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// Failed to open the datastore.
    DatastoreOpen(LibError),

    /// Failed to create the `request` table.
    SchemaInit(LibError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatastoreOpen(e) => write!(f, "failed to open datastore: {}", e),
            Self::SchemaInit(e) => write!(f, "failed to initialize request table: {}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DatastoreOpen(e) | Self::SchemaInit(e) => Some(e),
        }
    }
}

/// Shared application state for all axum handlers.
///
/// Cheap to clone (an `Arc` inside) and handed to axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServiceConfig,
    datastore: Arc<dyn Datastore>,
    audit_log: AuditLog,
    fixtures: FixtureStore,
    prober: HealthProber,
}

impl AppState {
    /// Open the SQLite datastore named in `config` and make sure the
    /// `request` table exists.
    pub fn open(config: ServiceConfig) -> Result<Self, AppStateError> {
        tracing::info!(
            path = %config.db_path.display(),
            max_connections = config.db_max_connections,
            "opening datastore"
        );
        let datastore = SqliteDatastore::open(&config.db_path, config.db_max_connections)
            .map_err(AppStateError::DatastoreOpen)?;

        let state = Self::from_components(config, Arc::new(datastore));
        state
            .audit_log()
            .initialize()
            .map_err(AppStateError::SchemaInit)?;
        Ok(state)
    }

    /// Build state around an already opened datastore.
    ///
    /// Useful for tests that inject a fake datastore.
    pub fn from_components(config: ServiceConfig, datastore: Arc<dyn Datastore>) -> Self {
        if !config.fixture_root.is_dir() {
            tracing::warn!(
                path = %config.fixture_root.display(),
                "fixture root is not a directory; every fixture lookup will miss"
            );
        }

        Self {
            inner: Arc::new(AppStateInner {
                audit_log: AuditLog::new(Arc::clone(&datastore)),
                fixtures: FixtureStore::new(config.fixture_root.clone()),
                prober: HealthProber::new(),
                datastore,
                config,
            }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Shared handle on the datastore, for moving into blocking tasks.
    pub fn datastore(&self) -> Arc<dyn Datastore> {
        Arc::clone(&self.inner.datastore)
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.inner.audit_log
    }

    pub fn fixtures(&self) -> &FixtureStore {
        &self.inner.fixtures
    }

    pub fn prober(&self) -> HealthProber {
        self.inner.prober
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("fixture_root", &self.inner.config.fixture_root)
            .field("pool", &self.inner.datastore.stats())
            .finish()
    }
}
