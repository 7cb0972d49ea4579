//! Test helpers for handler and router tests.
//!
//! Each [`TestContext`] owns a temporary directory holding both the SQLite
//! file and the fixture tree, so tests never share state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use vokun_lib::Datastore;

use crate::config::ServiceConfig;
use crate::state::AppState;

/// Isolated service state backed by a temporary directory.
pub struct TestContext {
    dir: TempDir,
    state: AppState,
}

impl TestContext {
    /// Fresh SQLite datastore and an empty fixture root.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory or database cannot be created.
    pub fn new() -> Self {
        Self::configured(|_| {})
    }

    /// Like [`TestContext::new`], with `adjust` applied to the configuration
    /// before the state is opened.
    pub fn configured(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let mut config = Self::config_for(&dir);
        adjust(&mut config);
        let state = AppState::open(config).expect("open test state");
        Self { dir, state }
    }

    /// Same layout, but the service talks to `datastore` instead of SQLite.
    pub fn with_datastore(datastore: Arc<dyn Datastore>) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let state = AppState::from_components(Self::config_for(&dir), datastore);
        Self { dir, state }
    }

    fn config_for(dir: &TempDir) -> ServiceConfig {
        let fixture_root = dir.path().join("fixtures");
        fs::create_dir_all(&fixture_root).expect("create fixture root");
        ServiceConfig {
            db_path: dir.path().join("vokun.db"),
            db_max_connections: 4,
            fixture_root,
            version: "0.0.0-test".to_string(),
            ..ServiceConfig::default()
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn fixture_root(&self) -> PathBuf {
        self.state.config().fixture_root.clone()
    }

    pub fn temp_path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `<fixture_root>/<name>`, creating parent directories.
    pub fn write_fixture(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.fixture_root().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture parent");
        }
        fs::write(&path, content).expect("write fixture");
        path
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
