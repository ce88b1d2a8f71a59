//! Health checking for pooled connections
//!
//! This module provides the liveness probe used by the validity rule, the
//! report produced by a tenant pool health check, and the background driver
//! that runs health checks on a fixed interval.
//!
//! # Example
//!
//! ```ignore
//! use erpool_connection::health::probe_connection;
//!
//! // One-time liveness check
//! let latency = probe_connection(raw.as_ref(), Duration::from_secs(5)).await?;
//!
//! // On-demand check of one tenant through the manager
//! if let Some(report) = manager.health_check("tenant-a").await {
//!     println!("evicted {} idle connections", report.evicted_total());
//! }
//! ```

mod driver;
mod probe;
mod report;

#[cfg(test)]
mod tests;

pub(crate) use driver::HealthCheckDriver;
pub use probe::{ProbeError, ProbeResult, probe_connection};
pub use report::HealthCheckReport;
