//! The narrow interface the client needs from a vector database.
//!
//! Anything that can connect to an endpoint, manage collections, and run
//! filtered top-k similarity search can sit behind [`VectorBackend`]. The
//! client owns retries, failover, validation, and caching; backends only
//! perform single operations and report errors.

use crate::document::{Metadata, VectorDocument};
use crate::error::Result;
use crate::filter::FilterExpr;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Network address of one vector-service node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// ANN index family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    Flat,
    IvfFlat,
    IvfSq8,
    Hnsw,
}

/// Similarity metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    #[serde(rename = "COSINE")]
    Cosine,
    #[serde(rename = "IP")]
    InnerProduct,
    #[serde(rename = "L2")]
    L2,
}

impl MetricType {
    /// Whether larger raw backend values mean closer matches.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, MetricType::L2)
    }

    /// Map a raw backend value onto a "higher is better" score.
    pub fn to_score(self, raw: f32) -> f64 {
        let raw = f64::from(raw);
        match self {
            MetricType::Cosine | MetricType::InnerProduct => raw,
            MetricType::L2 => 1.0 / (1.0 + raw.max(0.0)),
        }
    }
}

/// Parameters used when building a collection's vector index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexParams {
    #[serde(default = "default_index_type")]
    pub index_type: IndexType,

    #[serde(default = "default_metric")]
    pub metric: MetricType,

    /// Number of IVF clusters
    #[serde(default = "default_nlist")]
    pub nlist: u32,
}

fn default_index_type() -> IndexType {
    IndexType::IvfFlat
}

fn default_metric() -> MetricType {
    MetricType::Cosine
}

fn default_nlist() -> u32 {
    128
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            index_type: default_index_type(),
            metric: default_metric(),
            nlist: default_nlist(),
        }
    }
}

/// Per-query search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub metric: MetricType,

    /// Number of IVF clusters probed per query
    pub nprobe: u32,
}

/// A raw result row as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendHit {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    pub metadata: Metadata,

    /// Similarity for COSINE/IP, distance for L2
    pub raw_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub data_type: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub field: String,
    pub params: IndexParams,
}

/// Schema and size information for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescription {
    pub name: String,
    pub dimension: usize,
    pub row_count: u64,
    pub fields: Vec<FieldDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    pub loaded: bool,
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Open a connection to `endpoint`, registered under `alias`.
    async fn connect(&self, endpoint: &Endpoint, alias: &str, timeout: Duration) -> Result<()>;

    /// Drop the connection registered under `alias`. Never fails.
    async fn disconnect(&self, alias: &str);

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn has_collection(&self, name: &str) -> Result<bool>;

    async fn create_collection(&self, name: &str, dimension: usize, params: &IndexParams)
    -> Result<()>;

    /// Insert rows, returning how many were written.
    async fn insert(&self, collection: &str, rows: &[VectorDocument]) -> Result<usize>;

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        params: &SearchParams,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<BackendHit>>;

    /// Delete rows matching `filter`, returning how many were removed.
    async fn delete(&self, collection: &str, filter: &FilterExpr) -> Result<usize>;

    async fn flush(&self, collection: &str) -> Result<()>;

    async fn load(&self, collection: &str) -> Result<()>;

    async fn describe_collection(&self, collection: &str) -> Result<CollectionDescription>;
}
