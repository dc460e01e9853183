use crate::backend::CollectionDescription;
use crate::backend::Endpoint;
use crate::backend::FieldDescriptor;
use crate::backend::IndexDescriptor;
use crate::backend::VectorBackend;
use crate::config::VectorClientConfig;
use crate::connection::ConnectionManager;
use crate::connection::ConnectionState;
use crate::connection::EndpointHealth;
use crate::document::VectorDocument;
use crate::document::VectorHit;
use crate::error::Result;
use crate::error::VectorStoreError;
use crate::filter::FilterExpr;
use crate::filter::Filters;
use crate::validate::validate_collection_name;
use crate::validate::validate_doc_id;
use lodestar_utils_cache::CacheKeyBuilder;
use lodestar_utils_cache::CacheStats;
use lodestar_utils_cache::TtlCache;
use log::debug;
use log::info;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for [`VectorBackendClient::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchRequest {
    pub collection: String,
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub offset: usize,
    pub filters: Filters,
    pub use_cache: bool,
}

impl VectorSearchRequest {
    pub fn new(collection: impl Into<String>, vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            collection: collection.into(),
            vector,
            top_k,
            offset: 0,
            filters: Filters::new(),
            use_cache: true,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResults {
    pub hits: Vec<VectorHit>,

    /// Whether the hits were served from the search cache
    pub cached: bool,
}

/// Outcome of a (possibly multi-batch) insert. Failed batches are counted,
/// not raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertReport {
    pub inserted: usize,
    pub failed: usize,
    pub batches: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub doc_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteReport {
    /// Ids whose delete succeeded (including ids that matched no rows)
    pub deleted: Vec<String>,
    pub failed: Vec<DeleteFailure>,
    pub rows_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub row_count: u64,
    pub dimension: usize,
    pub fields: Vec<FieldDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    pub loaded: bool,

    /// `row_count * dimension * 4` bytes of raw f32 vectors
    pub estimated_memory_bytes: u64,
}

impl From<CollectionDescription> for CollectionStats {
    fn from(description: CollectionDescription) -> Self {
        let estimated_memory_bytes = description
            .row_count
            .saturating_mul(description.dimension as u64)
            .saturating_mul(4);
        Self {
            name: description.name,
            row_count: description.row_count,
            dimension: description.dimension,
            fields: description.fields,
            indexes: description.indexes,
            loaded: description.loaded,
            estimated_memory_bytes,
        }
    }
}

/// Fault-tolerant client over a [`VectorBackend`].
///
/// Every operation first runs a health check through the
/// [`ConnectionManager`], so a dead endpoint is detected and failed over
/// before the operation is issued. First-page search results are cached;
/// inserts and deletes clear the cache.
pub struct VectorBackendClient {
    backend: Arc<dyn VectorBackend>,
    config: VectorClientConfig,
    connection: ConnectionManager,
    cache: TtlCache<Vec<VectorHit>>,
}

impl VectorBackendClient {
    /// Build a client without connecting. The first operation connects.
    pub fn new(backend: Arc<dyn VectorBackend>, config: VectorClientConfig) -> Result<Self> {
        config.validate().map_err(VectorStoreError::InvalidConfig)?;
        let connection = ConnectionManager::new(Arc::clone(&backend), &config);
        let cache = TtlCache::new(config.cache_size, config.cache_ttl());
        Ok(Self {
            backend,
            config,
            connection,
            cache,
        })
    }

    /// Build a client and connect, failing over across the configured
    /// endpoints.
    pub async fn connect(
        backend: Arc<dyn VectorBackend>,
        config: VectorClientConfig,
    ) -> Result<Self> {
        let client = Self::new(backend, config)?;
        client.connection.connect().await?;
        Ok(client)
    }

    pub fn config(&self) -> &VectorClientConfig {
        &self.config
    }

    pub async fn ensure_connection(&self) -> Result<()> {
        self.connection.ensure_connection().await
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub async fn current_endpoint(&self) -> Option<Endpoint> {
        self.connection.current_endpoint().await
    }

    pub async fn endpoint_health(&self) -> Vec<EndpointHealth> {
        self.connection.endpoint_health().await
    }

    /// Disconnect and drop cached results.
    pub async fn close(&self) {
        self.cache.clear().await;
        self.connection.disconnect().await;
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.ensure_connection().await?;
        self.backend.list_collections().await
    }

    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        validate_collection_name(name)?;
        self.ensure_connection().await?;
        self.backend.has_collection(name).await
    }

    /// Create `name` with the configured index when it does not exist, then
    /// load it. Returns whether the collection was created.
    pub async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<bool> {
        validate_collection_name(name)?;
        if dimension == 0 {
            return Err(VectorStoreError::Validation(
                "dimension must be > 0".to_string(),
            ));
        }
        self.ensure_connection().await?;

        let created = if self.backend.has_collection(name).await? {
            false
        } else {
            self.backend
                .create_collection(name, dimension, &self.config.index)
                .await?;
            info!("created collection {name} (dim {dimension})");
            true
        };
        self.backend.load(name).await?;
        Ok(created)
    }

    /// Insert rows in batches of the configured size.
    pub async fn insert(&self, collection: &str, rows: &[VectorDocument]) -> Result<InsertReport> {
        self.batch_insert(collection, rows, self.config.batch_size)
            .await
    }

    /// Insert rows in fixed-size batches. A failed batch is logged and
    /// counted; later batches still run.
    pub async fn batch_insert(
        &self,
        collection: &str,
        rows: &[VectorDocument],
        batch_size: usize,
    ) -> Result<InsertReport> {
        validate_collection_name(collection)?;
        if batch_size == 0 {
            return Err(VectorStoreError::Validation(
                "batch_size must be > 0".to_string(),
            ));
        }
        for row in rows {
            validate_doc_id(&row.doc_id)?;
        }

        let mut report = InsertReport::default();
        if rows.is_empty() {
            return Ok(report);
        }
        self.ensure_connection().await?;

        for (index, batch) in rows.chunks(batch_size).enumerate() {
            report.batches += 1;
            match self.backend.insert(collection, batch).await {
                Ok(count) => {
                    report.inserted += count;
                    debug!(
                        "inserted batch {index} into {collection}: {count} rows ({} total)",
                        report.inserted
                    );
                }
                Err(err) => {
                    warn!("insert batch {index} into {collection} failed: {err}");
                    report.failed += batch.len();
                    report.errors.push(format!("batch {index}: {err}"));
                }
            }
        }

        if report.inserted > 0
            && let Err(err) = self.backend.flush(collection).await
        {
            warn!("flush of {collection} failed after insert: {err}");
        }
        self.cache.clear().await;

        info!(
            "inserted {}/{} rows into {collection} in {} batches",
            report.inserted,
            rows.len(),
            report.batches
        );
        Ok(report)
    }

    /// Top-k similarity search with offset paging.
    ///
    /// Only first-page requests (`offset == 0`) read or write the cache. The
    /// backend is asked for `top_k + offset` rows and the page is sliced
    /// locally.
    pub async fn search(&self, request: &VectorSearchRequest) -> Result<VectorSearchResults> {
        validate_collection_name(&request.collection)?;
        if request.top_k == 0 {
            return Err(VectorStoreError::Validation(
                "top_k must be >= 1".to_string(),
            ));
        }
        if request.vector.is_empty() {
            return Err(VectorStoreError::Validation(
                "query vector must not be empty".to_string(),
            ));
        }
        let filter = FilterExpr::from_filters(&request.filters)?;

        let cacheable = request.use_cache && request.offset == 0;
        let cache_key = if cacheable {
            Some(self.cache_key(request)?)
        } else {
            None
        };
        if let Some(key) = &cache_key
            && let Some(hits) = self.cache.get(key).await
        {
            debug!("vector search cache hit for {}", request.collection);
            return Ok(VectorSearchResults { hits, cached: true });
        }

        self.ensure_connection().await?;
        let params = self.config.search_params();
        let limit = request.top_k.saturating_add(request.offset);
        let raw = self
            .backend
            .search(
                &request.collection,
                &request.vector,
                limit,
                &params,
                filter.as_ref(),
            )
            .await?;

        let hits: Vec<VectorHit> = raw
            .into_iter()
            .map(|hit| VectorHit {
                score: params.metric.to_score(hit.raw_score),
                distance: f64::from(hit.raw_score),
                id: hit.id,
                doc_id: hit.doc_id,
                text: hit.text,
                metadata: hit.metadata,
            })
            .collect();

        if let Some(key) = cache_key {
            self.cache.insert(key, hits.clone()).await;
        }

        let page = hits
            .into_iter()
            .skip(request.offset)
            .take(request.top_k)
            .collect();
        Ok(VectorSearchResults {
            hits: page,
            cached: false,
        })
    }

    /// Delete every row derived from `doc_id`, returning the number removed.
    pub async fn delete_by_doc_id(&self, collection: &str, doc_id: &str) -> Result<usize> {
        validate_collection_name(collection)?;
        validate_doc_id(doc_id)?;
        self.ensure_connection().await?;

        let removed = self
            .backend
            .delete(collection, &FilterExpr::doc_id_eq(doc_id))
            .await?;
        self.cache.clear().await;
        debug!("deleted {removed} rows for {doc_id} from {collection}");
        Ok(removed)
    }

    /// Delete rows for each id independently. Invalid ids and backend
    /// failures are reported per id.
    pub async fn delete_by_doc_ids<S: AsRef<str>>(
        &self,
        collection: &str,
        doc_ids: &[S],
    ) -> Result<DeleteReport> {
        validate_collection_name(collection)?;
        self.ensure_connection().await?;

        let mut report = DeleteReport::default();
        for doc_id in doc_ids {
            let doc_id = doc_id.as_ref();
            if let Err(err) = validate_doc_id(doc_id) {
                report.failed.push(DeleteFailure {
                    doc_id: doc_id.to_string(),
                    reason: err.to_string(),
                });
                continue;
            }
            match self
                .backend
                .delete(collection, &FilterExpr::doc_id_eq(doc_id))
                .await
            {
                Ok(removed) => {
                    report.rows_removed += removed;
                    report.deleted.push(doc_id.to_string());
                }
                Err(err) => {
                    warn!("delete of {doc_id} from {collection} failed: {err}");
                    report.failed.push(DeleteFailure {
                        doc_id: doc_id.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if !report.deleted.is_empty() {
            self.cache.clear().await;
        }
        Ok(report)
    }

    pub async fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        validate_collection_name(collection)?;
        self.ensure_connection().await?;
        let description = self.backend.describe_collection(collection).await?;
        Ok(description.into())
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    fn cache_key(&self, request: &VectorSearchRequest) -> Result<String> {
        let prefix: Vec<String> = request
            .vector
            .iter()
            .take(self.config.cache_vector_prefix)
            .map(|v| format!("{v:.4}"))
            .collect();
        let filters = serde_json::to_string(&request.filters)?;
        Ok(CacheKeyBuilder::new("vector-search")
            .field("collection", &request.collection)
            .field("top_k", request.top_k.to_string())
            .field("vector", prefix.join(","))
            .field("filters", filters)
            .finish())
    }
}
