//! Per-tenant connection pooling
//!
//! This module provides the tenant pool, the handle callers rent, the
//! validity rule that decides whether a connection may be reused, and
//! the options and statistics types.
//!
//! # Example
//!
//! ```ignore
//! use erpool_connection::pool::{PoolOptions, TenantPool};
//!
//! let options = PoolOptions::new(5)
//!     .with_max_idle_time_ms(60_000)
//!     .with_health_checks(false);
//!
//! let pool = Arc::new(TenantPool::new("tenant-a", options));
//! let conn = pool.rent(factory.clone()).await?;
//! // Use connection...
//! pool.return_connection(conn).await;
//! ```

mod config;
mod connection;
mod stats;
mod tenant;
mod validity;


pub use config::PoolOptions;
pub use connection::{ConnectionId, PooledConnection};
pub use stats::PoolStatistics;
pub use tenant::TenantPool;
pub use validity::StaleReason;
