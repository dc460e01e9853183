use lodestar_embeddings::EmbeddingError;
use lodestar_vector_store::VectorStoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Request rejected before any backend call
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document source error: {0}")]
    Source(String),
}

impl RetrievalError {
    /// Whether the error is a hard failure the caller must see. Everything
    /// else is degraded around inside the retriever.
    pub fn is_fatal(&self) -> bool {
        match self {
            RetrievalError::VectorStore(err) => err.is_fatal(),
            RetrievalError::Validation(_) => true,
            _ => false,
        }
    }

    /// Whether every vector endpoint was exhausted.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            RetrievalError::VectorStore(VectorStoreError::Connection { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
