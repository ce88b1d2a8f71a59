//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};

const DEFAULT_MAX_POOL_SIZE: usize = 10;
const DEFAULT_MAX_CONNECTION_AGE_MS: u64 = 60 * 60 * 1000;
const DEFAULT_MAX_IDLE_TIME_MS: u64 = 30 * 60 * 1000;
const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 5 * 60 * 1000;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Policy shared by every tenant pool of a manager
///
/// Controls idle-queue capacity, connection lifetime and health checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Capacity of each tenant's idle queue
    max_pool_size: usize,
    /// Age in milliseconds after which a connection is recycled
    max_connection_age_ms: u64,
    /// Time in milliseconds a connection may sit unused before it is recycled
    max_idle_time_ms: u64,
    /// Whether validity checks include a liveness round-trip
    enable_health_checks: bool,
    /// Interval in milliseconds between background health checks (0 disables)
    health_check_interval_ms: u64,
    /// Whether the rent path probes idle connections before handing them out
    probe_on_rent: bool,
    /// Timeout in milliseconds for a single liveness probe
    probe_timeout_ms: u64,
}

impl PoolOptions {
    /// Create options with the given idle-queue capacity and default timings
    ///
    /// # Panics
    ///
    /// Panics if `max_pool_size` is 0.
    pub fn new(max_pool_size: usize) -> Self {
        assert!(
            max_pool_size > 0,
            "max_pool_size must be greater than 0, got {}",
            max_pool_size
        );

        Self {
            max_pool_size,
            max_connection_age_ms: DEFAULT_MAX_CONNECTION_AGE_MS,
            max_idle_time_ms: DEFAULT_MAX_IDLE_TIME_MS,
            enable_health_checks: true,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            probe_on_rent: true,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }

    /// Set the maximum connection age in milliseconds
    pub fn with_max_connection_age_ms(mut self, age_ms: u64) -> Self {
        self.max_connection_age_ms = age_ms;
        self
    }

    /// Set the maximum idle time in milliseconds
    pub fn with_max_idle_time_ms(mut self, idle_ms: u64) -> Self {
        self.max_idle_time_ms = idle_ms;
        self
    }

    /// Enable or disable liveness probing
    pub fn with_health_checks(mut self, enabled: bool) -> Self {
        self.enable_health_checks = enabled;
        self
    }

    /// Set the background health check interval in milliseconds
    ///
    /// An interval of 0 disables the background driver; on-demand checks still work.
    pub fn with_health_check_interval_ms(mut self, interval_ms: u64) -> Self {
        self.health_check_interval_ms = interval_ms;
        self
    }

    /// Set whether idle connections are probed on the rent path
    pub fn with_probe_on_rent(mut self, probe: bool) -> Self {
        self.probe_on_rent = probe;
        self
    }

    /// Set the liveness probe timeout in milliseconds
    pub fn with_probe_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.probe_timeout_ms = timeout_ms;
        self
    }

    /// Check options loaded from an external source
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pool_size == 0 {
            return Err(PoolError::Configuration(
                "max_pool_size must be greater than 0".into(),
            ));
        }
        if self.max_connection_age_ms == 0 {
            return Err(PoolError::Configuration(
                "max_connection_age_ms must be greater than 0".into(),
            ));
        }
        if self.max_idle_time_ms == 0 {
            return Err(PoolError::Configuration(
                "max_idle_time_ms must be greater than 0".into(),
            ));
        }
        if self.enable_health_checks && self.probe_timeout_ms == 0 {
            return Err(PoolError::Configuration(
                "probe_timeout_ms must be greater than 0 when health checks are enabled".into(),
            ));
        }
        Ok(())
    }

    /// Get the idle-queue capacity
    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Get the maximum connection age as a Duration
    pub fn max_connection_age(&self) -> Duration {
        Duration::from_millis(self.max_connection_age_ms)
    }

    /// Get the maximum idle time as a Duration
    pub fn max_idle_time(&self) -> Duration {
        Duration::from_millis(self.max_idle_time_ms)
    }

    /// Whether liveness probing is enabled
    pub fn health_checks_enabled(&self) -> bool {
        self.enable_health_checks
    }

    /// Get the background health check interval, if the driver is enabled
    pub fn health_check_interval(&self) -> Option<Duration> {
        (self.health_check_interval_ms > 0)
            .then(|| Duration::from_millis(self.health_check_interval_ms))
    }

    /// Whether the rent path runs the liveness probe
    pub fn probes_on_rent(&self) -> bool {
        self.enable_health_checks && self.probe_on_rent
    }

    /// Get the liveness probe timeout as a Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for PoolOptions {
    /// Defaults:
    /// - max_pool_size: 10
    /// - max_connection_age: 1 hour
    /// - max_idle_time: 30 minutes
    /// - health checks: enabled, every 5 minutes, 5 second probe timeout
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOL_SIZE)
    }
}
