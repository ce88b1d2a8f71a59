//! Per-tenant connection pool

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use erpool_core::ConnectionFactory;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, oneshot};

use super::config::PoolOptions;
use super::connection::{ConnectionEntry, ConnectionId, PooledConnection};
use super::stats::PoolStatistics;
use super::validity::{self, StaleReason};
use crate::error::{PoolError, PoolResult};
use crate::health::HealthCheckReport;

/// Idle queue and leased set, guarded together so a connection moves
/// between them in one step and is never in both.
struct PoolState {
    idle: VecDeque<Arc<ConnectionEntry>>,
    leased: HashMap<ConnectionId, Arc<ConnectionEntry>>,
}

/// Connection pool for exactly one tenant
///
/// The idle queue is bounded by `max_pool_size`; returns wait for a free slot
/// when it is full. The number of leased connections is not bounded.
pub struct TenantPool {
    tenant_key: String,
    options: PoolOptions,
    state: Mutex<PoolState>,
    /// One permit per free idle-queue slot
    idle_slots: Semaphore,
    /// Single permit: at most one connection is being created at a time
    creation_gate: Semaphore,
    closed: AtomicBool,
}

impl TenantPool {
    /// # Panics
    ///
    /// Panics if `options.max_pool_size()` is 0.
    pub fn new(tenant_key: impl Into<String>, options: PoolOptions) -> Self {
        let capacity = options.max_pool_size();
        assert!(capacity > 0, "max_pool_size must be greater than 0, got 0");
        Self {
            tenant_key: tenant_key.into(),
            options,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(capacity),
                leased: HashMap::new(),
            }),
            idle_slots: Semaphore::new(capacity),
            creation_gate: Semaphore::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn tenant_key(&self) -> &str {
        &self.tenant_key
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Idle plus leased connections; diagnostics only
    pub fn size(&self) -> usize {
        let state = self.state.lock();
        state.idle.len() + state.leased.len()
    }

    pub fn statistics(&self) -> PoolStatistics {
        let state = self.state.lock();
        PoolStatistics::new(
            self.tenant_key.clone(),
            state.idle.len(),
            state.leased.len(),
            self.options.max_pool_size(),
        )
    }

    /// Rent a connection: reuse a valid idle one, otherwise create one
    pub async fn rent(
        self: &Arc<Self>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> PoolResult<PooledConnection> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        while let Some(conn) = self.checkout_idle() {
            match validity::check(conn.entry(), &self.options, self.options.probes_on_rent()).await
            {
                Ok(()) => {
                    conn.entry().touch();
                    tracing::trace!(
                        tenant_key = %self.tenant_key,
                        connection_id = %conn.id(),
                        "reusing idle connection"
                    );
                    return Ok(conn);
                }
                Err(reason) => self.discard(conn.into_entry(), reason).await,
            }
        }

        self.create(factory).await
    }

    /// Pop the oldest idle connection and lease it in the same critical section
    fn checkout_idle(self: &Arc<Self>) -> Option<PooledConnection> {
        let entry = {
            let mut state = self.state.lock();
            let entry = state.idle.pop_front()?;
            state.leased.insert(entry.id(), Arc::clone(&entry));
            entry
        };
        self.idle_slots.add_permits(1);
        Some(PooledConnection::new(entry, Arc::downgrade(self)))
    }

    /// Create a connection through the creation gate.
    ///
    /// The factory call runs in its own task holding the gate permit. A renter
    /// cancelled before its turn at the gate causes no factory call. One
    /// cancelled while the factory was running leaves the new connection in
    /// the idle queue if there is room for it.
    async fn create(
        self: &Arc<Self>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> PoolResult<PooledConnection> {
        let (tx, rx) = oneshot::channel();
        let pool = Arc::clone(self);

        tokio::spawn(async move {
            let Ok(_permit) = pool.creation_gate.acquire().await else {
                let _ = tx.send(Err(PoolError::Closed));
                return;
            };
            if tx.is_closed() {
                tracing::trace!(
                    tenant_key = %pool.tenant_key,
                    "rent cancelled before creation; skipping factory call"
                );
                return;
            }

            let result = pool.open_leased(factory.as_ref()).await;
            if let Err(unclaimed) = tx.send(result) {
                match unclaimed {
                    Ok(conn) => pool.park_unclaimed(conn.into_entry()).await,
                    Err(e) => {
                        tracing::debug!(
                            tenant_key = %pool.tenant_key,
                            error = %e,
                            "connection creation failed after rent was cancelled"
                        );
                    }
                }
            }
        });

        rx.await.map_err(|_| PoolError::Closed)?
    }

    /// Open a leased connection, waiting for the creation gate
    async fn create_leased(
        self: &Arc<Self>,
        factory: &dyn ConnectionFactory,
    ) -> PoolResult<PooledConnection> {
        let _permit = self
            .creation_gate
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        self.open_leased(factory).await
    }

    /// Call the factory and lease the result. The caller holds the creation gate.
    async fn open_leased(
        self: &Arc<Self>,
        factory: &dyn ConnectionFactory,
    ) -> PoolResult<PooledConnection> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let raw = factory
            .create(&self.tenant_key)
            .await
            .map_err(|e| PoolError::unavailable(&self.tenant_key, e))?;

        let entry = Arc::new(ConnectionEntry::new(self.tenant_key.clone(), raw));
        tracing::debug!(
            tenant_key = %self.tenant_key,
            connection_id = %entry.id(),
            "created connection"
        );

        let leased = {
            let mut state = self.state.lock();
            if self.is_closed() {
                false
            } else {
                state.leased.insert(entry.id(), Arc::clone(&entry));
                true
            }
        };

        if !leased {
            entry.dispose().await;
            return Err(PoolError::Closed);
        }

        Ok(PooledConnection::new(entry, Arc::downgrade(self)))
    }

    /// Keep a connection nobody claimed, without waiting for an idle slot
    async fn park_unclaimed(&self, entry: Arc<ConnectionEntry>) {
        match self.try_enqueue(entry) {
            None => {
                tracing::debug!(
                    tenant_key = %self.tenant_key,
                    "rent cancelled during creation; keeping connection"
                );
            }
            Some(entry) => {
                tracing::debug!(
                    tenant_key = %self.tenant_key,
                    connection_id = %entry.id(),
                    "rent cancelled during creation; idle queue full, disposing"
                );
                entry.dispose().await;
            }
        }
    }

    /// Move a freshly leased entry straight into the idle queue if a slot is
    /// free. Hands the entry back when the queue is full or the pool closed.
    fn try_enqueue(&self, entry: Arc<ConnectionEntry>) -> Option<Arc<ConnectionEntry>> {
        let mut state = self.state.lock();
        state.leased.remove(&entry.id());
        match self.idle_slots.try_acquire() {
            Ok(permit) if !self.is_closed() => {
                permit.forget();
                state.idle.push_back(entry);
                None
            }
            _ => Some(entry),
        }
    }

    /// Give a rented connection back
    ///
    /// Invalid connections are disposed. Valid ones are reset and queued,
    /// waiting for a free idle slot when the queue is full.
    pub async fn return_connection(&self, conn: PooledConnection) {
        if self.is_closed() {
            self.release(conn.into_entry()).await;
            return;
        }

        if let Err(reason) =
            validity::check(conn.entry(), &self.options, self.options.health_checks_enabled()).await
        {
            self.discard(conn.into_entry(), reason).await;
            return;
        }

        if let Err(e) = conn.reset_state().await {
            tracing::warn!(
                tenant_key = %self.tenant_key,
                connection_id = %conn.id(),
                error = %e,
                "failed to reset connection state"
            );
            self.discard(conn.into_entry(), StaleReason::ResetFailed).await;
            return;
        }

        let Ok(permit) = self.idle_slots.acquire().await else {
            // Semaphore closed: the pool was torn down while we waited
            self.release(conn.into_entry()).await;
            return;
        };

        let entry = conn.into_entry();
        let rejected = {
            let mut state = self.state.lock();
            if self.is_closed() {
                Some(entry)
            } else if state.leased.remove(&entry.id()).is_none() {
                tracing::warn!(
                    tenant_key = %self.tenant_key,
                    connection_id = %entry.id(),
                    "returned connection was not leased from this pool"
                );
                Some(entry)
            } else {
                permit.forget();
                state.idle.push_back(entry);
                None
            }
        };

        if let Some(entry) = rejected {
            entry.dispose().await;
        }
    }

    /// Fill the idle queue up to `min(count, max_pool_size)` connections
    ///
    /// Returns the number of connections added. Failed attempts are logged and
    /// do not stop the others.
    pub async fn warmup(self: &Arc<Self>, factory: Arc<dyn ConnectionFactory>, count: usize) -> usize {
        let target = count.min(self.options.max_pool_size());
        let available = self.state.lock().idle.len();
        let missing = target.saturating_sub(available);

        let attempts = (0..missing).map(|_| {
            let pool = Arc::clone(self);
            let factory = Arc::clone(&factory);
            async move { pool.warm_one(factory.as_ref()).await }
        });

        let mut added = 0;
        for result in futures::future::join_all(attempts).await {
            match result {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        tenant_key = %self.tenant_key,
                        error = %e,
                        "warmup attempt failed"
                    );
                }
            }
        }
        added
    }

    async fn warm_one(self: &Arc<Self>, factory: &dyn ConnectionFactory) -> PoolResult<bool> {
        let entry = self.create_leased(factory).await?.into_entry();

        match self.try_enqueue(entry) {
            Some(entry) => {
                entry.dispose().await;
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Re-validate every idle connection and dispose the invalid ones
    ///
    /// Leased connections are only inspected; they are discarded when returned.
    pub async fn health_check(&self) -> HealthCheckReport {
        let mut report = HealthCheckReport::new(self.tenant_key.clone());

        // Drained entries keep their idle slots until they are re-queued or disposed
        let (drained, leased): (Vec<_>, Vec<_>) = {
            let mut state = self.state.lock();
            (
                state.idle.drain(..).collect(),
                state.leased.values().cloned().collect(),
            )
        };
        report.inspected = drained.len();

        let mut retained = Vec::with_capacity(drained.len());
        for entry in drained {
            match validity::check(&entry, &self.options, self.options.health_checks_enabled()).await {
                Ok(()) => retained.push(entry),
                Err(reason) => {
                    tracing::debug!(
                        tenant_key = %self.tenant_key,
                        connection_id = %entry.id(),
                        reason = %reason,
                        "evicting idle connection"
                    );
                    report.record_eviction(reason);
                    entry.dispose().await;
                    self.idle_slots.add_permits(1);
                }
            }
        }

        report.leased_stale = leased
            .iter()
            .filter(|entry| validity::check_cheap(entry, &self.options).is_err())
            .count();

        let orphaned = {
            let mut state = self.state.lock();
            if self.is_closed() {
                retained
            } else {
                report.retained = retained.len();
                state.idle.extend(retained);
                Vec::new()
            }
        };
        for entry in orphaned {
            entry.dispose().await;
        }

        tracing::debug!(
            tenant_key = %self.tenant_key,
            inspected = report.inspected,
            retained = report.retained,
            evicted = report.evicted_total(),
            leased_stale = report.leased_stale,
            "health check complete"
        );
        report.finish()
    }

    /// Dispose every idle and leased connection. Idempotent.
    pub async fn close(&self) {
        let entries: Vec<_> = {
            let mut state = self.state.lock();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            let mut entries: Vec<_> = state.idle.drain(..).collect();
            entries.extend(state.leased.drain().map(|(_, entry)| entry));
            entries
        };
        self.idle_slots.close();
        self.creation_gate.close();

        let count = entries.len();
        for entry in entries {
            entry.dispose().await;
        }
        tracing::debug!(tenant_key = %self.tenant_key, disposed = count, "tenant pool closed");
    }

    /// Dispose a connection that failed validation
    async fn discard(&self, entry: Arc<ConnectionEntry>, reason: StaleReason) {
        tracing::debug!(
            tenant_key = %self.tenant_key,
            connection_id = %entry.id(),
            reason = %reason,
            "discarding stale connection"
        );
        self.release(entry).await;
    }

    async fn release(&self, entry: Arc<ConnectionEntry>) {
        self.state.lock().leased.remove(&entry.id());
        entry.dispose().await;
    }
}
