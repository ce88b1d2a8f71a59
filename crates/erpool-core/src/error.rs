//! Error types for ERP connections

use thiserror::Error;

/// Core error type for ERP connection operations
#[derive(Error, Debug)]
pub enum ErpError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Operation error: {0}")]
    Operation(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection closed")]
    Closed,

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl ErpError {
    /// Whether the error means the underlying connection can no longer be used.
    ///
    /// Operation-level failures (a rejected document, a validation error on the
    /// ERP side) leave the connection usable; transport and session failures do not.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ErpError::Connection(_)
                | ErpError::Authentication(_)
                | ErpError::Io(_)
                | ErpError::Closed
        )
    }
}

/// Result type alias for ERP connection operations
pub type Result<T> = std::result::Result<T, ErpError>;
