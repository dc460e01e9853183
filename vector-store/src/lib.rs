//! # Lodestar Vector Store
//!
//! Fault-tolerant client for an external vector-similarity service.
//!
//! The database itself sits behind the [`VectorBackend`] trait. On top of it
//! [`VectorBackendClient`] adds:
//!
//! - multi-endpoint failover with per-endpoint retry and linear backoff
//! - a health check before every operation
//! - input validation before any backend call
//! - batched inserts with partial-failure reporting
//! - a bounded, TTL'd cache for first-page search results
//!
//! [`MemoryBackend`] is an in-process implementation for tests and small
//! deployments.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lodestar_vector_store::{MemoryBackend, VectorBackendClient, VectorClientConfig};
//! use lodestar_vector_store::{VectorDocument, VectorSearchRequest};
//!
//! let client = VectorBackendClient::connect(
//!     Arc::new(MemoryBackend::new()),
//!     VectorClientConfig::default(),
//! )
//! .await?;
//! client.ensure_collection("docs", 3).await?;
//! client
//!     .insert("docs", &[VectorDocument::new("c1", "d1", "hello", vec![0.1, 0.2, 0.3])])
//!     .await?;
//! let results = client
//!     .search(&VectorSearchRequest::new("docs", vec![0.1, 0.2, 0.3], 5))
//!     .await?;
//! ```

mod backend;
mod client;
mod config;
mod connection;
mod document;
mod error;
mod filter;
mod memory;
mod validate;

pub use backend::BackendHit;
pub use backend::CollectionDescription;
pub use backend::Endpoint;
pub use backend::FieldDescriptor;
pub use backend::IndexDescriptor;
pub use backend::IndexParams;
pub use backend::IndexType;
pub use backend::MetricType;
pub use backend::SearchParams;
pub use backend::VectorBackend;
pub use client::CollectionStats;
pub use client::DeleteFailure;
pub use client::DeleteReport;
pub use client::InsertReport;
pub use client::VectorBackendClient;
pub use client::VectorSearchRequest;
pub use client::VectorSearchResults;
pub use config::VectorClientConfig;
pub use connection::ConnectionManager;
pub use connection::ConnectionState;
pub use connection::EndpointHealth;
pub use connection::RetryPolicy;
pub use document::Metadata;
pub use document::VectorDocument;
pub use document::VectorHit;
pub use error::Result;
pub use error::VectorStoreError;
pub use filter::DOC_ID_FIELD;
pub use filter::FilterExpr;
pub use filter::FilterValue;
pub use filter::Filters;
pub use filter::escape_str;
pub use memory::MemoryBackend;
pub use validate::validate_collection_name;
pub use validate::validate_doc_id;
