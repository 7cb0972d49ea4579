//! Service configuration.
//!
//! Built once at startup and moved into [`crate::AppState`]; nothing here is
//! global.
//!
//! # Environment Variables
//!
//! - `VOKUN_DB_PATH`: SQLite database file (default: `/data/vokun.db`)
//! - `VOKUN_DB_MAX_CONNECTIONS`: connection pool size (default: `10`)
//! - `VOKUN_FIXTURE_ROOT`: fixture directory (default: `/opt/sonaak/vokun-api`)
//! - `VOKUN_MAX_BODY_BYTES`: cap on mocked request bodies (default: unlimited)
//! - `SERVICE_PORT`: HTTP port (default: `9000`)
//! - `VERSION`: version reported by the liveness probe (default: crate version)

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use vokun_lib::DEFAULT_MAX_OPEN;

pub const DEFAULT_DB_PATH: &str = "/data/vokun.db";
pub const DEFAULT_FIXTURE_ROOT: &str = "/opt/sonaak/vokun-api";
pub const DEFAULT_PORT: u16 = 9000;

/// A configuration value that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Everything the service needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// SQLite file holding the `request` table.
    pub db_path: PathBuf,
    /// Upper bound on pooled datastore connections.
    pub db_max_connections: usize,
    /// Directory searched for `<subpath>.<verb>` fixture files.
    pub fixture_root: PathBuf,
    /// Largest request body accepted on mocked routes; `None` accepts any
    /// size so every call can be recorded.
    pub max_body_bytes: Option<usize>,
    /// Port to listen on.
    pub port: u16,
    /// Version string for health output.
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            db_max_connections: DEFAULT_MAX_OPEN,
            fixture_root: PathBuf::from(DEFAULT_FIXTURE_ROOT),
            max_body_bytes: None,
            port: DEFAULT_PORT,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset or empty keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let db_max_connections = match get("VOKUN_DB_MAX_CONNECTIONS") {
            Some(raw) => {
                let parsed: usize = parse("VOKUN_DB_MAX_CONNECTIONS", &raw)?;
                if parsed == 0 {
                    return Err(ConfigError {
                        key: "VOKUN_DB_MAX_CONNECTIONS".to_string(),
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                parsed
            }
            None => defaults.db_max_connections,
        };

        let max_body_bytes = get("VOKUN_MAX_BODY_BYTES")
            .map(|raw| parse::<usize>("VOKUN_MAX_BODY_BYTES", &raw))
            .transpose()?;

        let port = match get("SERVICE_PORT") {
            Some(raw) => parse("SERVICE_PORT", &raw)?,
            None => defaults.port,
        };

        Ok(Self {
            db_path: get("VOKUN_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            db_max_connections,
            fixture_root: get("VOKUN_FIXTURE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.fixture_root),
            max_body_bytes,
            port,
            version: get("VERSION").unwrap_or(defaults.version),
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
