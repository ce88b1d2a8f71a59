//! Pooled connection handle and its pool-side bookkeeping

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use erpool_core::{ErpConnection, ErpError, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use super::tenant::TenantPool;

/// Identity of a pooled connection within its tenant pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Internal wrapper for a raw connection with pool metadata
///
/// Shared between the owning pool (idle queue or leased map) and the caller's
/// [`PooledConnection`] handle.
pub(crate) struct ConnectionEntry {
    id: ConnectionId,
    tenant_key: String,
    raw: Box<dyn ErpConnection>,
    created_at: Instant,
    last_used_at: Mutex<Instant>,
    marked_unhealthy: AtomicBool,
    disposed: AtomicBool,
}

impl ConnectionEntry {
    pub(crate) fn new(tenant_key: String, raw: Box<dyn ErpConnection>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            tenant_key,
            raw,
            created_at: now,
            last_used_at: Mutex::new(now),
            marked_unhealthy: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn tenant_key(&self) -> &str {
        &self.tenant_key
    }

    pub(crate) fn raw(&self) -> &dyn ErpConnection {
        self.raw.as_ref()
    }

    pub(crate) fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn last_used_at(&self) -> Instant {
        *self.last_used_at.lock()
    }

    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used_at().elapsed()
    }

    pub(crate) fn touch(&self) {
        let mut last_used_at = self.last_used_at.lock();
        // Instant is monotonic, max() only guards against a racing older touch
        *last_used_at = (*last_used_at).max(Instant::now());
    }

    pub(crate) fn is_healthy(&self) -> bool {
        !self.is_disposed() && !self.marked_unhealthy.load(Ordering::SeqCst) && self.raw.is_healthy()
    }

    pub(crate) fn mark_unhealthy(&self) {
        self.marked_unhealthy.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) async fn execute(&self, operation: &str, payload: Value) -> Result<Value> {
        if self.is_disposed() {
            return Err(ErpError::Closed);
        }

        match self.raw.execute(operation, payload).await {
            Ok(value) => {
                self.touch();
                Ok(value)
            }
            Err(e) => {
                if e.is_connection_fatal() {
                    self.mark_unhealthy();
                }
                Err(e)
            }
        }
    }

    pub(crate) async fn reset_state(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ErpError::Closed);
        }
        self.raw.reset_state().await
    }

    /// Release the raw connection. Returns false if it was already released.
    pub(crate) async fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }

        if let Err(e) = self.raw.close().await {
            tracing::warn!(
                tenant_key = %self.tenant_key,
                connection_id = %self.id,
                error = %e,
                "error while closing connection"
            );
        } else {
            tracing::trace!(
                tenant_key = %self.tenant_key,
                connection_id = %self.id,
                "connection closed"
            );
        }
        true
    }
}

/// A connection rented from a tenant pool
///
/// Hand it back with `ConnectionPoolManager::return_connection`. A handle that
/// is dropped without being returned is routed back to its pool in the
/// background.
pub struct PooledConnection {
    entry: Option<Arc<ConnectionEntry>>,
    pool: Weak<TenantPool>,
}

impl PooledConnection {
    pub(crate) fn new(entry: Arc<ConnectionEntry>, pool: Weak<TenantPool>) -> Self {
        Self {
            entry: Some(entry),
            pool,
        }
    }

    pub(crate) fn entry(&self) -> &Arc<ConnectionEntry> {
        self.entry.as_ref().expect("connection taken")
    }

    /// Take the entry out without triggering the drop-return path
    pub(crate) fn into_entry(mut self) -> Arc<ConnectionEntry> {
        self.entry.take().expect("connection taken")
    }

    pub fn id(&self) -> ConnectionId {
        self.entry().id()
    }

    pub fn tenant_key(&self) -> &str {
        self.entry().tenant_key()
    }

    /// Whether the connection is still usable
    pub fn is_healthy(&self) -> bool {
        self.entry().is_healthy()
    }

    pub fn created_at(&self) -> Instant {
        self.entry().created_at()
    }

    pub fn last_used_at(&self) -> Instant {
        self.entry().last_used_at()
    }

    /// Run a unit of work against the connection
    ///
    /// Updates `last_used_at` on success. A transport-level failure marks the
    /// connection unhealthy so it is discarded when returned.
    pub async fn execute(&self, operation: &str, payload: Value) -> Result<Value> {
        self.entry().execute(operation, payload).await
    }

    /// Close any open unit of work on the connection
    pub async fn reset_state(&self) -> Result<()> {
        self.entry().reset_state().await
    }

    /// Flag the connection so the pool discards it on return
    pub fn mark_unhealthy(&self) {
        self.entry().mark_unhealthy();
    }

    /// Release the underlying connection without returning it to a pool
    ///
    /// Safe to call more than once; the raw connection is closed exactly once.
    pub async fn dispose(&self) {
        self.entry().dispose().await;
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => f
                .debug_struct("PooledConnection")
                .field("id", &entry.id())
                .field("tenant_key", &entry.tenant_key())
                .field("healthy", &entry.is_healthy())
                .finish(),
            None => f.write_str("PooledConnection(<returned>)"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(
                tenant_key = %entry.tenant_key(),
                connection_id = %entry.id(),
                "connection dropped outside a runtime; releasing without close"
            );
            return;
        };

        tracing::debug!(
            tenant_key = %entry.tenant_key(),
            connection_id = %entry.id(),
            "connection dropped without being returned"
        );

        match self.pool.upgrade() {
            Some(pool) => {
                let handle = PooledConnection::new(entry, Arc::downgrade(&pool));
                runtime.spawn(async move { pool.return_connection(handle).await });
            }
            None => {
                runtime.spawn(async move {
                    entry.dispose().await;
                });
            }
        }
    }
}
