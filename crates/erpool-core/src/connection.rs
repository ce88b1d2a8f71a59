//! Connection and factory traits for external ERP systems

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Operation name used by the default liveness probe
pub const PING_OPERATION: &str = "ping";

/// A live connection to a tenant's ERP backend
///
/// Implementations own whatever session, transport and authentication state
/// the backend needs. The pool only relies on this contract.
#[async_trait]
pub trait ErpConnection: Send + Sync {
    /// Tenant this connection was opened for
    fn tenant_key(&self) -> &str;

    /// Whether the connection considers itself usable
    fn is_healthy(&self) -> bool;

    /// Run a named unit of work against the backend
    async fn execute(&self, operation: &str, payload: Value) -> Result<Value>;

    /// Trivial round-trip used as a liveness probe
    ///
    /// Default implementation executes [`PING_OPERATION`] with an empty payload.
    async fn ping(&self) -> Result<()> {
        self.execute(PING_OPERATION, Value::Null).await.map(|_| ())
    }

    /// Close any open unit of work so the connection is safe to hand to an
    /// unrelated caller
    async fn reset_state(&self) -> Result<()>;

    /// Release the underlying resource
    async fn close(&self) -> Result<()>;
}

/// Factory for opening new ERP connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a new connection for the given tenant
    async fn create(&self, tenant_key: &str) -> Result<Box<dyn ErpConnection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self, tenant_key: &str) -> Result<Box<dyn ErpConnection>> {
        (**self).create(tenant_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErpError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConnection {
        operations: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl ErpConnection for RecordingConnection {
        fn tenant_key(&self) -> &str {
            "tenant"
        }

        fn is_healthy(&self) -> bool {
            true
        }

        async fn execute(&self, operation: &str, payload: Value) -> Result<Value> {
            self.operations
                .lock()
                .unwrap()
                .push((operation.to_string(), payload));
            Ok(Value::Bool(true))
        }

        async fn reset_state(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct RefusingFactory;

    #[async_trait]
    impl ConnectionFactory for RefusingFactory {
        async fn create(&self, tenant_key: &str) -> Result<Box<dyn ErpConnection>> {
            Err(ErpError::Connection(format!("no route to {tenant_key}")))
        }
    }

    #[tokio::test]
    async fn test_default_ping_executes_ping_operation() {
        let conn = RecordingConnection::default();
        conn.ping().await.expect("ping");

        let operations = conn.operations.lock().unwrap();
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].0, PING_OPERATION);
        assert_eq!(operations[0].1, Value::Null);
    }

    #[tokio::test]
    async fn test_shared_factory_delegates() {
        let factory = Arc::new(RefusingFactory);
        let err = match factory.create("acme").await {
            Ok(_) => panic!("factory should refuse"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("no route to acme"));
    }
}
