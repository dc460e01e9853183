use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during vector store operations
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Every configured endpoint was tried and none accepted a connection.
    /// Callers should not retry this; the client already did.
    #[error(
        "Failed to connect to any of {endpoints} vector endpoints after {attempts} attempts: {last_error}"
    )]
    Connection {
        endpoints: usize,
        attempts: u32,
        last_error: String,
    },

    /// Input rejected before reaching the backend
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Collection does not exist on the backend
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Backend reported a failure for an individual operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// A backend call did not complete in time
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Client configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VectorStoreError {
    /// Whether the error is terminal for the current request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VectorStoreError::Connection { .. } | VectorStoreError::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;
