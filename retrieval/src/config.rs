use crate::error::Result;
use crate::error::RetrievalError;
use crate::expansion::QueryExpansion;
use crate::result::RetrievalMethod;
use lodestar_vector_store::VectorClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Method used when a request does not name one
    #[serde(default = "default_method")]
    pub default_method: RetrievalMethod,

    /// Results returned when a request does not set `top_k`
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Largest `top_k` a request may ask for
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Weight of the vector ranking in RRF (0.0 - 1.0)
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,

    /// Weight of the keyword ranking in RRF (0.0 - 1.0)
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    /// RRF constant k (higher = less emphasis on top results)
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure diversity
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f64,

    /// Candidates fetched from each leg before fusion
    #[serde(default = "default_mmr_top_k")]
    pub mmr_top_k: usize,

    /// BM25 term-frequency saturation
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,

    /// BM25 length normalisation
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,

    /// Keyword hits scoring below this are dropped
    #[serde(default)]
    pub keyword_min_score: f64,

    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Cache size (number of requests to cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_query_expansion")]
    pub query_expansion: QueryExpansion,

    /// Upper bound on expanded query variants
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Allowed filter keys per collection. Collections not listed accept
    /// any key.
    #[serde(default)]
    pub filter_fields: BTreeMap<String, Vec<String>>,
}

fn default_method() -> RetrievalMethod {
    RetrievalMethod::Hybrid
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

fn default_vector_weight() -> f64 {
    0.7
}

fn default_keyword_weight() -> f64 {
    0.3
}

fn default_rrf_k() -> f64 {
    60.0
}

fn default_mmr_lambda() -> f64 {
    0.5
}

fn default_mmr_top_k() -> usize {
    20
}

fn default_bm25_k1() -> f64 {
    1.2
}

fn default_bm25_b() -> f64 {
    0.75
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_query_expansion() -> QueryExpansion {
    QueryExpansion::None
}

fn default_max_expansions() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_method: default_method(),
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            rrf_k: default_rrf_k(),
            mmr_lambda: default_mmr_lambda(),
            mmr_top_k: default_mmr_top_k(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            keyword_min_score: 0.0,
            enable_cache: true,
            cache_size: default_cache_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            query_expansion: default_query_expansion(),
            max_expansions: default_max_expansions(),
            filter_fields: BTreeMap::new(),
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.vector_weight) {
            return Err(format!(
                "vector_weight must be in [0.0, 1.0], got {}",
                self.vector_weight
            ));
        }

        if !(0.0..=1.0).contains(&self.keyword_weight) {
            return Err(format!(
                "keyword_weight must be in [0.0, 1.0], got {}",
                self.keyword_weight
            ));
        }

        let total_weight = self.vector_weight + self.keyword_weight;
        if (total_weight - 1.0).abs() > 0.01 {
            return Err(format!(
                "vector_weight + keyword_weight must sum to 1.0, got {total_weight}"
            ));
        }

        if self.rrf_k <= 0.0 {
            return Err(format!("rrf_k must be > 0, got {}", self.rrf_k));
        }

        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(format!(
                "mmr_lambda must be in [0.0, 1.0], got {}",
                self.mmr_lambda
            ));
        }

        if self.top_k == 0 || self.max_top_k == 0 {
            return Err("top_k and max_top_k must be > 0".to_string());
        }

        if self.top_k > self.max_top_k {
            return Err(format!(
                "top_k ({}) cannot exceed max_top_k ({})",
                self.top_k, self.max_top_k
            ));
        }

        if self.mmr_top_k == 0 {
            return Err("mmr_top_k must be > 0".to_string());
        }

        if self.bm25_k1 < 0.0 {
            return Err(format!("bm25_k1 must be >= 0, got {}", self.bm25_k1));
        }

        if !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(format!("bm25_b must be in [0.0, 1.0], got {}", self.bm25_b));
        }

        if self.enable_cache && self.cache_size == 0 {
            return Err("cache_size must be > 0 when caching is enabled".to_string());
        }

        Ok(())
    }

    /// Keyword-only retrieval, no embedding calls
    pub fn fast() -> Self {
        Self {
            default_method: RetrievalMethod::Keyword,
            mmr_top_k: 10,
            ..Default::default()
        }
    }

    /// Diversified hybrid retrieval over a larger candidate pool
    pub fn accurate() -> Self {
        Self {
            default_method: RetrievalMethod::Mmr,
            vector_weight: 0.8,
            keyword_weight: 0.2,
            mmr_top_k: 50,
            query_expansion: QueryExpansion::Synonym,
            ..Default::default()
        }
    }

    /// Pure vector retrieval
    pub fn semantic() -> Self {
        Self {
            default_method: RetrievalMethod::Vector,
            vector_weight: 1.0,
            keyword_weight: 0.0,
            ..Default::default()
        }
    }
}

/// Top-level configuration file: retrieval settings plus the vector client.
///
/// ```toml
/// [retrieval]
/// default_method = "mmr"
/// mmr_lambda = 0.6
///
/// [vector_store]
/// endpoints = [{ host = "milvus-a", port = 19530 }, { host = "milvus-b", port = 19530 }]
/// max_retries = 5
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LodestarConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub vector_store: VectorClientConfig,
}

impl LodestarConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: LodestarConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.retrieval
            .validate()
            .map_err(|err| RetrievalError::InvalidConfig(format!("retrieval: {err}")))?;
        self.vector_store
            .validate()
            .map_err(|err| RetrievalError::InvalidConfig(format!("vector_store: {err}")))
    }
}
