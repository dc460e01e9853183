use lodestar_vector_store::Filters;
use lodestar_vector_store::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A caller-owned document indexed by the lexical index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// How a retrieval request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    /// Embed the query and search the vector backend
    Vector,
    /// BM25 over the collection's lexical index
    Keyword,
    /// Weighted reciprocal rank fusion of vector and keyword results
    Hybrid,
    /// Hybrid candidates re-ranked for diversity
    Mmr,
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetrievalMethod::Vector => "vector",
            RetrievalMethod::Keyword => "keyword",
            RetrievalMethod::Hybrid => "hybrid",
            RetrievalMethod::Mmr => "mmr",
        };
        f.write_str(name)
    }
}

/// Stage that produced a result's final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalSource {
    Vector,
    Keyword,
    Rrf,
    Mmr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub text: String,

    /// Final score, higher is better. Its scale depends on `source`.
    pub score: f64,

    #[serde(default)]
    pub metadata: Metadata,

    pub source: RetrievalSource,

    /// Similarity reported by the vector leg, when the document came from it
    pub vector_score: Option<f64>,

    /// BM25 score from the keyword leg, when the document came from it
    pub keyword_score: Option<f64>,
}

/// Parameters for one retrieval call. Unset fields fall back to the
/// retriever's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub collection: String,
    pub query: String,
    pub method: Option<RetrievalMethod>,
    pub top_k: Option<usize>,
    pub filters: Filters,
}

impl RetrievalRequest {
    pub fn new(collection: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            query: query.into(),
            method: None,
            top_k: None,
            filters: Filters::new(),
        }
    }

    pub fn with_method(mut self, method: RetrievalMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Add a single equality (or `in`, for arrays) filter.
    pub fn with_filter(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(field.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResults {
    pub query: String,

    /// Method that actually produced the results (after any fallback)
    pub method: RetrievalMethod,

    pub results: Vec<RetrievalResult>,
    pub stats: RetrievalStats,
}

/// Retrieval performance statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub total_time_ms: u64,
    pub vector_time_ms: u64,
    pub keyword_time_ms: u64,
    pub fusion_time_ms: u64,
    pub rerank_time_ms: u64,

    /// Number of vector candidates
    pub vector_count: usize,

    /// Number of keyword candidates
    pub keyword_count: usize,

    /// Query variants added by expansion
    pub expansion_count: usize,

    pub cache_hit: bool,

    /// Why the request was answered by a weaker path, if it was
    pub degraded: Option<String>,
}

impl RetrievalResults {
    /// Get top N results
    pub fn top(&self, n: usize) -> &[RetrievalResult] {
        &self.results[..n.min(self.results.len())]
    }

    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
