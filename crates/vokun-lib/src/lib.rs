//! vokun library entry points.
//!
//! This crate holds everything the HTTP service delegates to: resolving
//! canned responses from fixture files, durably recording every inbound
//! request, and probing the backing datastore for health statistics. The
//! service crates should only depend on the items exported here instead of
//! reimplementing behavior.
//!

#![deny(warnings)]

pub mod audit;
pub mod datastore;
pub mod error;
pub mod fixture;
pub mod health;
pub mod request;
pub mod sqlite;

pub use audit::{AuditLog, REQUEST_TABLE};
pub use datastore::{Datastore, PoolStats, Row};
pub use error::{Error, ErrorKind, Result};
pub use fixture::{Fixture, FixtureStore, FIXTURE_SENTINEL};
pub use health::{DbStatus, HealthCheckStats, HealthProber, HealthState, PROBE_COUNT};
pub use request::{group_params, Header, Param, QueryParam, Request, RequestId};
pub use sqlite::{SqliteDatastore, CHECKOUT_TIMEOUT, DEFAULT_MAX_OPEN};
