//! Outcome of a tenant pool health check

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pool::StaleReason;

/// What a single health check pass found in one tenant pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckReport {
    /// Tenant the check ran for
    pub tenant_key: String,
    /// Idle connections taken out of the queue and re-validated
    pub inspected: usize,
    /// Idle connections that passed and went back to the queue
    pub retained: usize,
    /// Idle connections disposed, by reason
    pub evicted: BTreeMap<StaleReason, usize>,
    /// Leased connections that will fail validation when returned
    pub leased_stale: usize,
    /// When the check completed
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckReport {
    pub fn new(tenant_key: impl Into<String>) -> Self {
        Self {
            tenant_key: tenant_key.into(),
            inspected: 0,
            retained: 0,
            evicted: BTreeMap::new(),
            leased_stale: 0,
            checked_at: Utc::now(),
        }
    }

    pub(crate) fn record_eviction(&mut self, reason: StaleReason) {
        *self.evicted.entry(reason).or_insert(0) += 1;
    }

    /// Total number of idle connections disposed
    pub fn evicted_total(&self) -> usize {
        self.evicted.values().sum()
    }

    /// Number of idle connections disposed for one reason
    pub fn evicted_for(&self, reason: StaleReason) -> usize {
        self.evicted.get(&reason).copied().unwrap_or(0)
    }

    pub(crate) fn finish(mut self) -> Self {
        self.checked_at = Utc::now();
        self
    }
}
