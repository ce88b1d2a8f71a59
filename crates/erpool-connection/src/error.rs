use erpool_core::ErpError;
use thiserror::Error;

pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced to callers of the pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection unavailable for tenant '{tenant_key}': {source}")]
    ConnectionUnavailable {
        tenant_key: String,
        #[source]
        source: ErpError,
    },

    #[error("Connection pool is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    pub(crate) fn unavailable(tenant_key: &str, source: ErpError) -> Self {
        PoolError::ConnectionUnavailable {
            tenant_key: tenant_key.to_string(),
            source,
        }
    }
}
