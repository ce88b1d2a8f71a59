//! ERPool Connection - Multi-tenant pooling for ERP connections
//!
//! This crate keeps one bounded pool of reusable ERP connections per tenant,
//! evicts stale connections, pre-warms pools and reports statistics.

mod error;
pub mod health;
pub mod logging;
mod manager;
pub mod pool;
pub mod settings;

#[cfg(test)]
mod testing;

pub use error::{PoolError, PoolResult};
pub use health::{HealthCheckReport, ProbeError, ProbeResult, probe_connection};
pub use manager::ConnectionPoolManager;
pub use pool::{
    ConnectionId, PoolOptions, PoolStatistics, PooledConnection, StaleReason, TenantPool,
};
