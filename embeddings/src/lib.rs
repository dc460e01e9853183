//! # Lodestar Embeddings
//!
//! Text embedding seam for the retrieval engine. The retriever only ever
//! talks to an [`EmbeddingProvider`]; the vector index and the lexical index
//! never embed anything themselves.
//!
//! With the `fastembed` feature enabled, [`EmbeddingService`] provides a
//! local implementation backed by fastembed-rs (Nomic-embed-text-v1.5 by
//! default), running inference on tokio's blocking pool.
//!
//! ## Example
//!
//! ```ignore
//! use lodestar_embeddings::{EmbeddingProvider, EmbeddingService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = EmbeddingService::new().await?;
//!     let vector = service.embed_query("order table columns").await?;
//!     println!("{} dimensions", vector.len());
//!     Ok(())
//! }
//! ```

mod error;
mod provider;
#[cfg(feature = "fastembed")]
mod service;

pub use error::EmbeddingError;
pub use provider::EmbeddingProvider;
pub use provider::cosine_similarity;
#[cfg(feature = "fastembed")]
pub use service::EmbeddingConfig;
#[cfg(feature = "fastembed")]
pub use service::EmbeddingModelType;
#[cfg(feature = "fastembed")]
pub use service::EmbeddingService;

/// Default embedding dimension for Nomic-embed-text-v1.5
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Compact embedding dimension (using Matryoshka truncation)
pub const COMPACT_EMBEDDING_DIM: usize = 256;
