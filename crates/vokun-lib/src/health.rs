//! Datastore health probing.
//!
//! A health check snapshots the pool statistics, fires [`PROBE_COUNT`] pings
//! at the datastore at once, waits for every one of them, and folds the
//! outcomes into two composite scores:
//!
//! - `error_rate = 0.1 * failed_probes`
//! - `roundtrip = 100 * sum(elapsed seconds of each probe)`
//!
//! Both are unit-less and kept for compatibility with existing dashboards.
//! Probe failures only move `error_rate`; the check itself never fails and
//! the overall status stays `ok`.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::datastore::Datastore;

/// Number of concurrent pings per health check.
pub const PROBE_COUNT: usize = 10;

const ERROR_WEIGHT: f64 = 0.1;
const ROUND_TRIP_WEIGHT: f64 = 100.0;

/// Overall service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Error,
}

/// Datastore section of a health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbStatus {
    /// Open connections at the start of the check.
    pub connections: usize,
    /// Composite latency score.
    #[serde(rename = "roundtrip")]
    pub round_trip: f64,
    /// Composite failure score.
    pub error_rate: f64,
}

/// Result of one health check. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckStats {
    pub status: HealthState,
    pub db: DbStatus,
}

#[derive(Debug)]
struct ProbeOutcome {
    elapsed: Duration,
    failed: bool,
}

/// Runs health checks against a [`Datastore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthProber;

impl HealthProber {
    pub fn new() -> Self {
        Self
    }

    /// Probe `datastore` and aggregate the results.
    ///
    /// Blocks until all probes have returned; there is no per-probe timeout.
    pub fn check_health(&self, datastore: &dyn Datastore) -> HealthCheckStats {
        let pool = datastore.stats();
        let outcomes = run_probes(datastore);

        let failed = outcomes.iter().filter(|o| o.failed).count();
        let elapsed_secs: f64 = outcomes.iter().map(|o| o.elapsed.as_secs_f64()).sum();

        let db = DbStatus {
            connections: pool.open_connections,
            round_trip: ROUND_TRIP_WEIGHT * elapsed_secs,
            error_rate: ERROR_WEIGHT * failed as f64,
        };
        debug!(
            connections = db.connections,
            roundtrip = db.round_trip,
            error_rate = db.error_rate,
            failed,
            "datastore health checked"
        );

        HealthCheckStats {
            status: HealthState::Ok,
            db,
        }
    }
}

fn run_probes(datastore: &dyn Datastore) -> Vec<ProbeOutcome> {
    thread::scope(|scope| {
        let handles: Vec<_> = (0..PROBE_COUNT)
            .map(|_| scope.spawn(move || probe(datastore)))
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    error!("datastore probe panicked");
                    ProbeOutcome {
                        elapsed: Duration::ZERO,
                        failed: true,
                    }
                })
            })
            .collect()
    })
}

fn probe(datastore: &dyn Datastore) -> ProbeOutcome {
    let start = Instant::now();
    let result = datastore.ping();
    let elapsed = start.elapsed();

    if let Err(e) = &result {
        error!(error = %e, "error pinging datastore");
    }

    ProbeOutcome {
        elapsed,
        failed: result.is_err(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_with_wire_names() {
        let stats = HealthCheckStats {
            status: HealthState::Ok,
            db: DbStatus {
                connections: 2,
                round_trip: 0.5,
                error_rate: 0.1,
            },
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["db"]["connections"], 2);
        assert_eq!(json["db"]["roundtrip"], 0.5);
        assert_eq!(json["db"]["error_rate"], 0.1);
    }

    #[test]
    fn error_rate_is_exact_at_full_failure() {
        assert_eq!(ERROR_WEIGHT * PROBE_COUNT as f64, 1.0);
    }
}
