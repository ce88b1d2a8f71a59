//! Mock connections and factory shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use erpool_core::{ConnectionFactory, ErpConnection, ErpError, PING_OPERATION, Result};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Observable state of one mock connection
#[derive(Default)]
pub struct MockState {
    pub id: usize,
    pub healthy: AtomicBool,
    pub fail_ping: AtomicBool,
    pub panic_on_ping: AtomicBool,
    pub fail_reset: AtomicBool,
    pub pings: AtomicUsize,
    pub resets: AtomicUsize,
    pub closes: AtomicUsize,
}

impl MockState {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

pub struct MockConnection {
    tenant_key: String,
    state: Arc<MockState>,
}

#[async_trait]
impl ErpConnection for MockConnection {
    fn tenant_key(&self) -> &str {
        &self.tenant_key
    }

    fn is_healthy(&self) -> bool {
        self.state.healthy.load(Ordering::SeqCst)
    }

    async fn execute(&self, operation: &str, payload: Value) -> Result<Value> {
        if operation == PING_OPERATION {
            self.state.pings.fetch_add(1, Ordering::SeqCst);
            if self.state.panic_on_ping.load(Ordering::SeqCst) {
                panic!("injected ping panic for tenant {}", self.tenant_key);
            }
            if self.state.fail_ping.load(Ordering::SeqCst) {
                return Err(ErpError::Connection("ping rejected".into()));
            }
            return Ok(Value::Bool(true));
        }

        match operation {
            "fail" => Err(ErpError::Operation("document rejected".into())),
            "drop_link" => Err(ErpError::Connection("link lost".into())),
            _ => Ok(json!({ "operation": operation, "payload": payload, "connection": self.state.id })),
        }
    }

    async fn reset_state(&self) -> Result<()> {
        self.state.resets.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_reset.load(Ordering::SeqCst) {
            return Err(ErpError::Transaction("rollback failed".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out [`MockConnection`]s and remembering each one's state
#[derive(Default)]
pub struct MockFactory {
    created: Mutex<Vec<(String, Arc<MockState>)>>,
    fail: AtomicBool,
    fail_tenant: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn connections(&self) -> Vec<Arc<MockState>> {
        self.created.lock().iter().map(|(_, s)| Arc::clone(s)).collect()
    }

    pub fn connections_for(&self, tenant_key: &str) -> Vec<Arc<MockState>> {
        self.created
            .lock()
            .iter()
            .filter(|(key, _)| key == tenant_key)
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }

    pub fn total_closes(&self) -> usize {
        self.connections().iter().map(|s| s.close_count()).sum()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_for_tenant(&self, tenant_key: &str) {
        *self.fail_tenant.lock() = Some(tenant_key.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Highest number of concurrent `create` calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn create(&self, tenant_key: &str) -> Result<Box<dyn ErpConnection>> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail_tenant = self.fail_tenant.lock().clone();
        let result = if self.fail.load(Ordering::SeqCst)
            || fail_tenant.as_deref() == Some(tenant_key)
        {
            Err(ErpError::Connection("ERP backend unreachable".into()))
        } else {
            let mut created = self.created.lock();
            let state = Arc::new(MockState {
                id: created.len(),
                healthy: AtomicBool::new(true),
                ..Default::default()
            });
            created.push((tenant_key.to_string(), Arc::clone(&state)));
            Ok(Box::new(MockConnection {
                tenant_key: tenant_key.to_string(),
                state,
            }) as Box<dyn ErpConnection>)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
