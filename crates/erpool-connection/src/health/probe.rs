//! Liveness probe for ERP connections
//!
//! Runs the connection's trivial round-trip under a timeout and measures
//! how long it took.

use std::time::Duration;

use erpool_core::ErpConnection;
use thiserror::Error;
use tokio::time::Instant;

/// Result of a probe: the round-trip time on success
pub type ProbeResult = Result<Duration, ProbeError>;

/// Error that can occur during a liveness probe
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The connection reports itself unhealthy, no round-trip attempted
    #[error("Connection reports unhealthy")]
    Unhealthy,
    /// The round-trip failed
    #[error("Probe failed: {0}")]
    Failed(String),
    /// The round-trip did not finish in time
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Probe a connection to check that it is alive.
///
/// # Returns
///
/// * `Ok(Duration)` - The round-trip time if the probe succeeded
/// * `Err(ProbeError)` - If the probe failed or timed out
///
/// # Example
///
/// ```ignore
/// use erpool_connection::health::probe_connection;
///
/// let latency = probe_connection(connection.as_ref(), Duration::from_secs(5)).await?;
/// println!("ERP latency: {:?}", latency);
/// ```
pub async fn probe_connection(conn: &dyn ErpConnection, timeout: Duration) -> ProbeResult {
    if !conn.is_healthy() {
        return Err(ProbeError::Unhealthy);
    }

    let start = Instant::now();
    match tokio::time::timeout(timeout, conn.ping()).await {
        Ok(Ok(())) => Ok(start.elapsed()),
        Ok(Err(e)) => Err(ProbeError::Failed(e.to_string())),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}
