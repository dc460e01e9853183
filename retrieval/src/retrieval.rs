use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::expansion::QueryExpander;
use crate::fusion::FusionEngine;
use crate::lexical::{LexicalIndex, query_terms};
use crate::rerank::MmrReranker;
use crate::result::{
    Document, RetrievalMethod, RetrievalRequest, RetrievalResult, RetrievalResults,
    RetrievalSource, RetrievalStats,
};
use crate::source::DocumentSource;
use lodestar_embeddings::EmbeddingProvider;
use lodestar_utils_cache::{CacheKeyBuilder, CacheStats, TtlCache};
use lodestar_vector_store::{
    DOC_ID_FIELD, FilterExpr, VectorBackendClient, VectorSearchRequest, validate_collection_name,
};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Hybrid retrieval engine combining BM25 and vector search.
///
/// One instance is built at startup and shared by request handlers. It owns
/// the per-collection lexical indexes and the request-level cache; vector
/// retries and failover stay inside the [`VectorBackendClient`].
pub struct HybridRetriever {
    config: RetrievalConfig,
    client: Arc<VectorBackendClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    source: Option<Arc<dyn DocumentSource>>,
    lexical: RwLock<HashMap<String, Arc<LexicalIndex>>>,
    fusion: FusionEngine,
    reranker: MmrReranker,
    expander: QueryExpander,
    cache: TtlCache<RetrievalResults>,
}

struct Candidates {
    vector: Vec<RetrievalResult>,
    keyword: Vec<RetrievalResult>,
}

impl HybridRetriever {
    pub fn new(
        config: RetrievalConfig,
        client: Arc<VectorBackendClient>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;

        info!("Initializing hybrid retriever");

        let cache = if config.enable_cache {
            TtlCache::new(config.cache_size, Duration::from_secs(config.cache_ttl_secs))
        } else {
            TtlCache::disabled()
        };

        Ok(Self {
            fusion: FusionEngine::from_config(&config),
            reranker: MmrReranker::new(config.mmr_lambda),
            expander: QueryExpander::new(config.query_expansion, config.max_expansions),
            config,
            client,
            embedder,
            source: None,
            lexical: RwLock::new(HashMap::new()),
            cache,
        })
    }

    /// Build missing lexical indexes from `source` on first keyword use.
    pub fn with_document_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Answer a retrieval request.
    ///
    /// Only invalid requests and exhausted vector endpoints fail; a missing
    /// lexical index or an embedding failure during MMR degrade to a weaker
    /// answer, recorded in [`RetrievalStats::degraded`].
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResults> {
        let start = Instant::now();
        let method = request.method.unwrap_or(self.config.default_method);
        let top_k = request.top_k.unwrap_or(self.config.top_k);
        let filter = self.validate(request, top_k)?;
        let query = request.query.trim();

        debug!("{method} retrieval in {} for: '{query}'", request.collection);

        let cache_key = self.cache_key(request, method, top_k)?;
        if let Some(mut cached) = self.cache.get(&cache_key).await {
            debug!("Cache hit for query: '{query}'");
            cached.stats.cache_hit = true;
            cached.stats.total_time_ms = elapsed_ms(start);
            return Ok(cached);
        }

        let mut stats = RetrievalStats::default();
        let (results, answered_by) = match method {
            RetrievalMethod::Vector => {
                let results = self.timed_vector(request, top_k, &mut stats).await?;
                (results, RetrievalMethod::Vector)
            }
            RetrievalMethod::Keyword => {
                let terms = self.expanded_terms(query, &mut stats);
                match self
                    .timed_keyword(request, &terms, top_k, filter.as_ref(), &mut stats)
                    .await
                {
                    Some(results) => (results, RetrievalMethod::Keyword),
                    None => {
                        stats.degraded = Some(format!(
                            "no lexical index for {}, answered by vector search",
                            request.collection
                        ));
                        let results = self.timed_vector(request, top_k, &mut stats).await?;
                        (results, RetrievalMethod::Vector)
                    }
                }
            }
            RetrievalMethod::Hybrid => {
                let candidates = self
                    .candidates(request, query, filter.as_ref(), &mut stats)
                    .await?;
                let fusion_start = Instant::now();
                let fused = self
                    .fusion
                    .fuse(candidates.vector, candidates.keyword, top_k);
                stats.fusion_time_ms = elapsed_ms(fusion_start);
                (fused, RetrievalMethod::Hybrid)
            }
            RetrievalMethod::Mmr => {
                let candidates = self
                    .candidates(request, query, filter.as_ref(), &mut stats)
                    .await?;
                let pool = self.pool_size(top_k);
                let fusion_start = Instant::now();
                let mut fused = self.fusion.fuse(candidates.vector, candidates.keyword, pool);
                stats.fusion_time_ms = elapsed_ms(fusion_start);

                let rerank_start = Instant::now();
                let reranked = self
                    .reranker
                    .rerank(fused.clone(), top_k, self.embedder.as_ref())
                    .await;
                stats.rerank_time_ms = elapsed_ms(rerank_start);
                match reranked {
                    Ok(diversified) => (diversified, RetrievalMethod::Mmr),
                    Err(err) => {
                        warn!("MMR embedding failed, returning fused ranking: {err}");
                        stats.degraded = Some(format!("mmr skipped: {err}"));
                        fused.truncate(top_k);
                        (fused, RetrievalMethod::Hybrid)
                    }
                }
            }
        };

        stats.total_time_ms = elapsed_ms(start);
        let results = RetrievalResults {
            query: query.to_string(),
            method: answered_by,
            results,
            stats,
        };

        // Degraded answers are not cached so the full path is retried.
        if results.stats.degraded.is_none() {
            self.cache.insert(cache_key, results.clone()).await;
        }

        info!(
            "Retrieval completed in {}ms, returned {} results",
            results.stats.total_time_ms,
            results.len()
        );

        Ok(results)
    }

    /// Replace the lexical index for `collection`. Clears the request cache.
    pub async fn index_documents(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        validate_collection_name(collection)
            .map_err(|err| RetrievalError::Validation(err.to_string()))?;

        let mut index = LexicalIndex::new(self.config.bm25_k1, self.config.bm25_b);
        index.index_documents(documents);
        let count = index.len();

        self.lexical
            .write()
            .await
            .insert(collection.to_string(), Arc::new(index));
        self.cache.clear().await;

        info!("Indexed {count} documents for keyword search in {collection}");
        Ok(count)
    }

    /// Drop the lexical index for `collection`, returning whether one existed.
    pub async fn drop_lexical_index(&self, collection: &str) -> bool {
        let removed = self.lexical.write().await.remove(collection).is_some();
        if removed {
            self.cache.clear().await;
        }
        removed
    }

    pub async fn has_lexical_index(&self, collection: &str) -> bool {
        self.lexical.read().await.contains_key(collection)
    }

    /// Clear the request cache
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        info!("Retrieval cache cleared");
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<VectorBackendClient> {
        &self.client
    }

    fn validate(&self, request: &RetrievalRequest, top_k: usize) -> Result<Option<FilterExpr>> {
        if request.query.trim().is_empty() {
            return Err(RetrievalError::Validation(
                "query must not be empty".to_string(),
            ));
        }

        if top_k == 0 || top_k > self.config.max_top_k {
            return Err(RetrievalError::Validation(format!(
                "top_k must be in [1, {}], got {top_k}",
                self.config.max_top_k
            )));
        }

        validate_collection_name(&request.collection)
            .map_err(|err| RetrievalError::Validation(err.to_string()))?;

        if let Some(allowed) = self.config.filter_fields.get(&request.collection)
            && let Some(unknown) = request.filters.keys().find(|key| !allowed.contains(key))
        {
            return Err(RetrievalError::Validation(format!(
                "unknown filter field {unknown} for collection {}",
                request.collection
            )));
        }

        FilterExpr::from_filters(&request.filters)
            .map_err(|err| RetrievalError::Validation(err.to_string()))
    }

    fn cache_key(
        &self,
        request: &RetrievalRequest,
        method: RetrievalMethod,
        top_k: usize,
    ) -> Result<String> {
        let filters = serde_json::to_string(&request.filters)
            .map_err(|err| RetrievalError::Validation(err.to_string()))?;
        Ok(CacheKeyBuilder::new("retrieval")
            .field("collection", &request.collection)
            .field("query", request.query.trim())
            .field("method", method.to_string())
            .field("top_k", top_k.to_string())
            .field("filters", filters)
            .finish())
    }

    fn pool_size(&self, top_k: usize) -> usize {
        self.config.mmr_top_k.max(top_k)
    }

    /// Original query terms followed by any terms the expander adds.
    fn expanded_terms(&self, query: &str, stats: &mut RetrievalStats) -> Vec<String> {
        let mut terms = query_terms(query);
        let variants = self.expander.expand(query);
        stats.expansion_count = variants.len();
        for variant in &variants {
            for term in query_terms(variant) {
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        if !variants.is_empty() {
            debug!("Expanded '{query}' with {} variants", variants.len());
        }
        terms
    }

    /// Fetch an over-sized candidate pool from both legs concurrently.
    async fn candidates(
        &self,
        request: &RetrievalRequest,
        query: &str,
        filter: Option<&FilterExpr>,
        stats: &mut RetrievalStats,
    ) -> Result<Candidates> {
        let pool = self.pool_size(request.top_k.unwrap_or(self.config.top_k));
        let terms = self.expanded_terms(query, stats);

        let vector_leg = async {
            let start = Instant::now();
            let results = self.vector_leg(request, pool).await;
            (results, elapsed_ms(start))
        };
        let keyword_leg = async {
            let start = Instant::now();
            let results = self.keyword_leg(&request.collection, &terms, pool, filter).await;
            (results, elapsed_ms(start))
        };
        let ((vector, vector_ms), (keyword, keyword_ms)) = tokio::join!(vector_leg, keyword_leg);

        let vector = vector?;
        stats.vector_time_ms = vector_ms;
        stats.vector_count = vector.len();
        stats.keyword_time_ms = keyword_ms;

        let keyword = match keyword {
            Some(results) => results,
            None => {
                stats.degraded = Some(format!(
                    "no lexical index for {}, fused vector results only",
                    request.collection
                ));
                Vec::new()
            }
        };
        stats.keyword_count = keyword.len();

        debug!(
            "Candidate pool: {} vector, {} keyword",
            stats.vector_count, stats.keyword_count
        );
        Ok(Candidates { vector, keyword })
    }

    async fn timed_vector(
        &self,
        request: &RetrievalRequest,
        limit: usize,
        stats: &mut RetrievalStats,
    ) -> Result<Vec<RetrievalResult>> {
        let start = Instant::now();
        let results = self.vector_leg(request, limit).await?;
        stats.vector_time_ms = elapsed_ms(start);
        stats.vector_count = results.len();
        Ok(results)
    }

    async fn timed_keyword(
        &self,
        request: &RetrievalRequest,
        terms: &[String],
        limit: usize,
        filter: Option<&FilterExpr>,
        stats: &mut RetrievalStats,
    ) -> Option<Vec<RetrievalResult>> {
        let start = Instant::now();
        let results = self
            .keyword_leg(&request.collection, terms, limit, filter)
            .await?;
        stats.keyword_time_ms = elapsed_ms(start);
        stats.keyword_count = results.len();
        Some(results)
    }

    async fn vector_leg(
        &self,
        request: &RetrievalRequest,
        limit: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let vector = self.embedder.embed_query(request.query.trim()).await?;
        let search = VectorSearchRequest::new(request.collection.clone(), vector, limit)
            .with_filters(request.filters.clone());
        let found = self.client.search(&search).await?;

        Ok(found
            .hits
            .into_iter()
            .map(|hit| {
                let mut metadata = hit.metadata;
                metadata
                    .entry(DOC_ID_FIELD.to_string())
                    .or_insert(Value::String(hit.doc_id));
                RetrievalResult {
                    id: hit.id,
                    text: hit.text,
                    score: hit.score,
                    metadata,
                    source: RetrievalSource::Vector,
                    vector_score: Some(hit.score),
                    keyword_score: None,
                }
            })
            .collect())
    }

    /// BM25 results, or `None` when the collection has no lexical index.
    async fn keyword_leg(
        &self,
        collection: &str,
        terms: &[String],
        limit: usize,
        filter: Option<&FilterExpr>,
    ) -> Option<Vec<RetrievalResult>> {
        let index = self.lexical_index(collection).await?;
        let hits = index.search_terms_where(terms, limit, self.config.keyword_min_score, |doc| {
            filter.is_none_or(|f| f.matches_metadata(&doc.id, &doc.metadata))
        });

        Some(
            hits.into_iter()
                .filter_map(|hit| {
                    let document = index.get(&hit.id)?;
                    Some(RetrievalResult {
                        id: hit.id,
                        text: document.text.clone(),
                        score: hit.score,
                        metadata: document.metadata.clone(),
                        source: RetrievalSource::Keyword,
                        vector_score: None,
                        keyword_score: Some(hit.score),
                    })
                })
                .collect(),
        )
    }

    /// Existing index for `collection`, or one built from the document
    /// source. `None` when neither is available.
    async fn lexical_index(&self, collection: &str) -> Option<Arc<LexicalIndex>> {
        if let Some(index) = self.lexical.read().await.get(collection) {
            return Some(Arc::clone(index));
        }

        let source = self.source.as_ref()?;
        let documents = match source.load_documents(collection).await {
            Ok(documents) => documents,
            Err(err) => {
                warn!("Failed to load documents for {collection}: {err}");
                return None;
            }
        };
        if documents.is_empty() {
            debug!("Document source has nothing for {collection}");
            return None;
        }

        let mut index = LexicalIndex::new(self.config.bm25_k1, self.config.bm25_b);
        index.index_documents(documents);
        info!("Built lexical index for {collection} ({} documents)", index.len());

        let mut lexical = self.lexical.write().await;
        let entry = lexical
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(index));
        Some(Arc::clone(entry))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lodestar_embeddings::EmbeddingError;
    use lodestar_vector_store::{MemoryBackend, VectorClientConfig, VectorDocument};
    use pretty_assertions::assert_eq;

    const DIM: usize = 8;

    /// Maps known words onto fixed axes so vector similarity is predictable.
    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|text| axis_vector(text)).collect())
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    fn axis_vector(text: &str) -> Vec<f32> {
        const AXES: [&str; DIM] = [
            "order", "user", "product", "amount", "name", "price", "table", "id",
        ];
        let mut vector = vec![0.01; DIM];
        for word in crate::lexical::tokenize(text) {
            if let Some(axis) = AXES.iter().position(|a| word.contains(a)) {
                vector[axis] += 1.0;
            }
        }
        vector
    }

    fn documents() -> Vec<Document> {
        vec![
            Document::new("orders", "order table has order_id and amount"),
            Document::new("users", "user table has user_id and name"),
            Document::new("products", "product table has product_id and price"),
        ]
    }

    async fn retriever(config: RetrievalConfig) -> HybridRetriever {
        let client = VectorBackendClient::connect(
            Arc::new(MemoryBackend::new()),
            VectorClientConfig::default(),
        )
        .await
        .unwrap();
        client.ensure_collection("tables", DIM).await.unwrap();
        let rows: Vec<VectorDocument> = documents()
            .into_iter()
            .map(|d| {
                let vector = axis_vector(&d.text);
                VectorDocument::new(d.id.clone(), d.id, d.text, vector)
            })
            .collect();
        client.insert("tables", &rows).await.unwrap();

        HybridRetriever::new(config, Arc::new(client), Arc::new(AxisEmbedder)).unwrap()
    }

    #[tokio::test]
    async fn test_keyword_method() {
        let retriever = retriever(RetrievalConfig::default()).await;
        retriever.index_documents("tables", documents()).await.unwrap();

        let results = retriever
            .retrieve(
                &RetrievalRequest::new("tables", "order amount")
                    .with_method(RetrievalMethod::Keyword),
            )
            .await
            .unwrap();

        assert_eq!(results.method, RetrievalMethod::Keyword);
        assert_eq!(results.ids(), vec!["orders"]);
        assert_eq!(results.results[0].source, RetrievalSource::Keyword);
        assert!(results.results[0].keyword_score.is_some_and(|s| s > 0.0));
    }

    #[tokio::test]
    async fn test_keyword_falls_back_to_vector() {
        let retriever = retriever(RetrievalConfig::default()).await;

        let results = retriever
            .retrieve(
                &RetrievalRequest::new("tables", "order amount")
                    .with_method(RetrievalMethod::Keyword),
            )
            .await
            .unwrap();

        assert_eq!(results.method, RetrievalMethod::Vector);
        assert!(results.stats.degraded.is_some());
        assert_eq!(results.results[0].id, "orders");
        assert_eq!(results.results[0].source, RetrievalSource::Vector);
        assert_eq!(
            results.results[0].metadata.get(DOC_ID_FIELD),
            Some(&Value::String("orders".to_string()))
        );
    }

    #[tokio::test]
    async fn test_hybrid_fuses_both_legs() {
        let retriever = retriever(RetrievalConfig::default()).await;
        retriever.index_documents("tables", documents()).await.unwrap();

        let results = retriever
            .retrieve(&RetrievalRequest::new("tables", "order amount").with_top_k(3))
            .await
            .unwrap();

        assert_eq!(results.method, RetrievalMethod::Hybrid);
        assert_eq!(results.results[0].id, "orders");
        let top = &results.results[0];
        assert_eq!(top.source, RetrievalSource::Rrf);
        assert_eq!(top.score, 0.7 / 61.0 + 0.3 / 61.0);
        assert!(top.vector_score.is_some());
        assert!(top.keyword_score.is_some());
        assert_eq!(results.stats.vector_count, 3);
        assert_eq!(results.stats.keyword_count, 1);
    }

    #[tokio::test]
    async fn test_index_documents_clears_cache() {
        let retriever = retriever(RetrievalConfig::default()).await;
        retriever.index_documents("tables", documents()).await.unwrap();

        let request = RetrievalRequest::new("tables", "order amount");
        retriever.retrieve(&request).await.unwrap();
        assert!(retriever.retrieve(&request).await.unwrap().stats.cache_hit);

        retriever.index_documents("tables", documents()).await.unwrap();
        assert!(!retriever.retrieve(&request).await.unwrap().stats.cache_hit);
    }

    #[tokio::test]
    async fn test_drop_lexical_index() {
        let retriever = retriever(RetrievalConfig::default()).await;
        retriever.index_documents("tables", documents()).await.unwrap();
        assert!(retriever.has_lexical_index("tables").await);

        assert!(retriever.drop_lexical_index("tables").await);
        assert!(!retriever.has_lexical_index("tables").await);
        assert!(!retriever.drop_lexical_index("tables").await);
    }
}
