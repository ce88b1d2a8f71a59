//! ERPool Core - Core abstractions for pooled ERP connections
//!
//! This crate defines the boundary between the connection pool and the
//! systems it talks to:
//!
//! - `ErpConnection` - Trait for a live connection to a tenant's ERP backend
//! - `ConnectionFactory` - Trait for opening new connections per tenant
//! - `ErpError` - Error type shared by connection implementations

mod connection;
mod error;

pub use connection::*;
pub use error::*;
