//! Validity rule shared by the rent, return and health check paths

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use super::config::PoolOptions;
use super::connection::ConnectionEntry;
use crate::health::probe_connection;

/// Why a connection was judged unfit for reuse
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// The connection or the pool flagged it unhealthy
    Unhealthy,
    /// Older than the maximum connection age
    Expired,
    /// Unused for longer than the maximum idle time
    Idle,
    /// The liveness round-trip failed or timed out
    ProbeFailed,
    /// Clearing transactional state failed on return
    ResetFailed,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaleReason::Unhealthy => "unhealthy",
            StaleReason::Expired => "expired",
            StaleReason::Idle => "idle",
            StaleReason::ProbeFailed => "probe_failed",
            StaleReason::ResetFailed => "reset_failed",
        };
        f.write_str(s)
    }
}

/// Cheap checks only: health flag, age and idle time.
pub(crate) fn check_cheap(entry: &ConnectionEntry, options: &PoolOptions) -> Result<(), StaleReason> {
    if !entry.is_healthy() {
        return Err(StaleReason::Unhealthy);
    }
    if entry.age() > options.max_connection_age() {
        return Err(StaleReason::Expired);
    }
    if entry.idle_for() > options.max_idle_time() {
        return Err(StaleReason::Idle);
    }
    Ok(())
}

/// Cheap checks, then the liveness probe when `probe` is set.
///
/// The probe does not count as use; it leaves `last_used_at` alone.
pub(crate) async fn check(
    entry: &ConnectionEntry,
    options: &PoolOptions,
    probe: bool,
) -> Result<(), StaleReason> {
    check_cheap(entry, options)?;

    if probe {
        // A panic inside the connection counts as a failed round-trip
        let outcome = AssertUnwindSafe(probe_connection(entry.raw(), options.probe_timeout()))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::debug!(
                    tenant_key = %entry.tenant_key(),
                    connection_id = %entry.id(),
                    error = %e,
                    "liveness probe failed"
                );
                return Err(StaleReason::ProbeFailed);
            }
            Err(_) => {
                tracing::warn!(
                    tenant_key = %entry.tenant_key(),
                    connection_id = %entry.id(),
                    "liveness probe panicked"
                );
                return Err(StaleReason::ProbeFailed);
            }
        }
    }

    Ok(())
}
