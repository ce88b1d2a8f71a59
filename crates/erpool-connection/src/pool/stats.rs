//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of one tenant pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatistics {
    /// Tenant the snapshot belongs to
    tenant_key: String,
    /// Idle plus leased connections
    total_connections: usize,
    /// Connections waiting in the idle queue
    available_connections: usize,
    /// Connections currently checked out
    leased_connections: usize,
    /// Idle-queue capacity
    max_connections: usize,
}

impl PoolStatistics {
    /// Create a snapshot from idle and leased counts
    pub fn new(
        tenant_key: impl Into<String>,
        available: usize,
        leased: usize,
        max_connections: usize,
    ) -> Self {
        Self {
            tenant_key: tenant_key.into(),
            total_connections: available + leased,
            available_connections: available,
            leased_connections: leased,
            max_connections,
        }
    }

    /// Zeroed snapshot for a tenant that has no pool yet
    pub fn empty(tenant_key: impl Into<String>) -> Self {
        Self::new(tenant_key, 0, 0, 0)
    }

    pub fn tenant_key(&self) -> &str {
        &self.tenant_key
    }

    pub fn total_connections(&self) -> usize {
        self.total_connections
    }

    pub fn available_connections(&self) -> usize {
        self.available_connections
    }

    pub fn leased_connections(&self) -> usize {
        self.leased_connections
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Share of connections currently leased (0.0 to 1.0)
    ///
    /// Returns 0.0 if the pool holds no connections.
    pub fn utilization(&self) -> f64 {
        if self.total_connections == 0 {
            0.0
        } else {
            self.leased_connections as f64 / self.total_connections as f64
        }
    }

    /// Whether the idle queue is at capacity
    pub fn is_idle_full(&self) -> bool {
        self.max_connections > 0 && self.available_connections >= self.max_connections
    }
}
