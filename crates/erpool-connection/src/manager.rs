//! Connection pool manager: one pool per tenant behind a single surface

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use erpool_core::ConnectionFactory;

use crate::error::{PoolError, PoolResult};
use crate::health::{HealthCheckDriver, HealthCheckReport};
use crate::pool::{PoolOptions, PoolStatistics, PooledConnection, TenantPool};


/// Tenant pools keyed by tenant, shared with the health check driver
pub(crate) struct PoolRegistry {
    options: PoolOptions,
    pools: RwLock<HashMap<String, Arc<TenantPool>>>,
    closed: AtomicBool,
}

impl PoolRegistry {
    fn new(options: PoolOptions) -> Self {
        Self {
            options,
            pools: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn get(&self, tenant_key: &str) -> Option<Arc<TenantPool>> {
        self.pools.read().get(tenant_key).cloned()
    }

    /// Get the tenant's pool, creating it on first use
    fn get_or_create(&self, tenant_key: &str) -> PoolResult<Arc<TenantPool>> {
        if tenant_key.is_empty() {
            return Err(PoolError::InvalidArgument(
                "tenant key cannot be empty".into(),
            ));
        }

        if let Some(pool) = self.get(tenant_key) {
            return Ok(pool);
        }

        let mut pools = self.pools.write();
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        let pool = match pools.entry(tenant_key.to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                tracing::info!(tenant_key = %tenant_key, "creating tenant pool");
                Arc::clone(entry.insert(Arc::new(TenantPool::new(
                    tenant_key,
                    self.options.clone(),
                ))))
            }
        };
        Ok(pool)
    }

    fn snapshot(&self) -> Vec<(String, Arc<TenantPool>)> {
        self.pools
            .read()
            .iter()
            .map(|(key, pool)| (key.clone(), Arc::clone(pool)))
            .collect()
    }

    /// Health-check every tenant pool, each in its own task
    ///
    /// A failing or panicking check is logged and does not affect the others.
    pub(crate) async fn health_check_all(&self) -> Vec<HealthCheckReport> {
        let tasks: Vec<_> = self
            .snapshot()
            .into_iter()
            .map(|(key, pool)| (key, tokio::spawn(async move { pool.health_check().await })))
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for (tenant_key, task) in tasks {
            match task.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(tenant_key = %tenant_key, error = %e, "health check failed");
                }
            }
        }
        reports
    }
}

/// Manages per-tenant pools of ERP connections
///
/// Pools are created lazily on first use of a tenant key. A background task
/// health-checks every pool on the configured interval. Must be created
/// inside a tokio runtime.
pub struct ConnectionPoolManager {
    factory: Arc<dyn ConnectionFactory>,
    registry: Arc<PoolRegistry>,
    driver: Mutex<Option<HealthCheckDriver>>,
}

impl ConnectionPoolManager {
    /// Create a manager and start its health check driver
    ///
    /// # Panics
    ///
    /// Panics if `options.max_pool_size()` is 0. Use [`Self::try_new`] for
    /// options that come from a file or another external source.
    pub fn new<F: ConnectionFactory>(factory: F, options: PoolOptions) -> Self {
        assert!(
            options.max_pool_size() > 0,
            "max_pool_size must be greater than 0, got 0"
        );
        let registry = Arc::new(PoolRegistry::new(options));
        let driver = registry
            .options
            .health_check_interval()
            .map(|interval| HealthCheckDriver::spawn(interval, Arc::downgrade(&registry)));

        Self {
            factory: Arc::new(factory),
            registry,
            driver: Mutex::new(driver),
        }
    }

    /// Create a manager from unchecked options
    ///
    /// Fails with `Configuration` when the options do not validate.
    pub fn try_new<F: ConnectionFactory>(factory: F, options: PoolOptions) -> PoolResult<Self> {
        options.validate()?;
        Ok(Self::new(factory, options))
    }

    /// Create a manager with default options
    pub fn with_defaults<F: ConnectionFactory>(factory: F) -> Self {
        Self::new(factory, PoolOptions::default())
    }

    pub fn options(&self) -> &PoolOptions {
        &self.registry.options
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.closed.load(Ordering::SeqCst)
    }

    /// Rent a connection for a tenant
    ///
    /// Fails with `InvalidArgument` for an empty key and with
    /// `ConnectionUnavailable` when a new connection cannot be created.
    #[tracing::instrument(skip(self), fields(tenant_key = %tenant_key))]
    pub async fn rent(&self, tenant_key: &str) -> PoolResult<PooledConnection> {
        let pool = self.registry.get_or_create(tenant_key)?;

        match pool.rent(Arc::clone(&self.factory)).await {
            Ok(conn) => {
                tracing::debug!(
                    connection_id = %conn.id(),
                    pool_size = pool.size(),
                    "rented connection"
                );
                Ok(conn)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to rent connection");
                Err(e)
            }
        }
    }

    /// Return a rented connection to its tenant's pool
    ///
    /// Never fails. A connection whose tenant has no pool is disposed.
    #[tracing::instrument(skip(self, conn), fields(tenant_key = %conn.tenant_key(), connection_id = %conn.id()))]
    pub async fn return_connection(&self, conn: PooledConnection) {
        let Some(pool) = self.registry.get(conn.tenant_key()) else {
            tracing::warn!("returned connection for unknown tenant; disposing");
            conn.into_entry().dispose().await;
            return;
        };

        pool.return_connection(conn).await;
        tracing::debug!(pool_size = pool.size(), "returned connection");
    }

    /// Pre-populate a tenant's idle queue
    ///
    /// Adds up to `min(count, max_pool_size)` idle connections and returns how
    /// many were added. Individual failures are logged, not returned.
    #[tracing::instrument(skip(self), fields(tenant_key = %tenant_key))]
    pub async fn warmup(&self, tenant_key: &str, count: usize) -> PoolResult<usize> {
        let pool = self.registry.get_or_create(tenant_key)?;
        let added = pool.warmup(Arc::clone(&self.factory), count).await;
        tracing::info!(requested = count, added = added, "warmed up connections");
        Ok(added)
    }

    /// Health-check one tenant's pool
    ///
    /// Returns `None` if the tenant has no pool or the check itself failed.
    #[tracing::instrument(skip(self), fields(tenant_key = %tenant_key))]
    pub async fn health_check(&self, tenant_key: &str) -> Option<HealthCheckReport> {
        let pool = self.registry.get(tenant_key)?;

        // Run detached so a caller dropping this future cannot strand drained connections
        match tokio::spawn(async move { pool.health_check().await }).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "health check failed");
                None
            }
        }
    }

    /// Health-check every tenant pool
    pub async fn health_check_all(&self) -> Vec<HealthCheckReport> {
        self.registry.health_check_all().await
    }

    /// Snapshot of one tenant's pool; zeroed if the tenant has no pool
    pub fn statistics(&self, tenant_key: &str) -> PoolStatistics {
        self.registry
            .get(tenant_key)
            .map(|pool| pool.statistics())
            .unwrap_or_else(|| PoolStatistics::empty(tenant_key))
    }

    /// Snapshots of every tenant pool, sorted by tenant key
    pub fn statistics_all(&self) -> Vec<PoolStatistics> {
        let mut stats: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|(_, pool)| pool.statistics())
            .collect();
        stats.sort_by(|a, b| a.tenant_key().cmp(b.tenant_key()));
        stats
    }

    /// Tenant keys that currently have a pool
    pub fn tenants(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.registry.pools.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop the health check driver and dispose every pooled connection
    ///
    /// Safe to call more than once.
    #[tracing::instrument(skip(self))]
    pub async fn dispose(&self) {
        if self.registry.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            driver.shutdown().await;
        }

        let pools: Vec<_> = self.registry.pools.write().drain().collect();
        let count = pools.len();
        for (_, pool) in pools {
            pool.close().await;
        }
        tracing::info!(tenants = count, "connection pool manager disposed");
    }
}

impl Drop for ConnectionPoolManager {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.cancel();
        }
    }
}
