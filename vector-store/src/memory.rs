//! In-process [`VectorBackend`] with brute-force search.
//!
//! Used for tests and small corpora. Rows live in memory for the lifetime of
//! the backend; there is no persistence.

use crate::backend::BackendHit;
use crate::backend::CollectionDescription;
use crate::backend::Endpoint;
use crate::backend::FieldDescriptor;
use crate::backend::IndexDescriptor;
use crate::backend::IndexParams;
use crate::backend::MetricType;
use crate::backend::SearchParams;
use crate::backend::VectorBackend;
use crate::document::VectorDocument;
use crate::error::Result;
use crate::error::VectorStoreError;
use crate::filter::FilterExpr;
use async_trait::async_trait;
use lodestar_embeddings::cosine_similarity;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

struct Collection {
    dimension: usize,
    params: IndexParams,
    rows: Vec<VectorDocument>,
    loaded: bool,
}

#[derive(Default)]
pub struct MemoryBackend {
    connected: RwLock<Option<Endpoint>>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint of the active connection, if any.
    pub async fn connected_endpoint(&self) -> Option<Endpoint> {
        self.connected.read().await.clone()
    }

    /// Number of rows currently stored in `collection`.
    pub async fn row_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.rows.len())
    }

    async fn require_connection(&self) -> Result<()> {
        if self.connected.read().await.is_none() {
            return Err(VectorStoreError::Backend("not connected".to_string()));
        }
        Ok(())
    }
}

fn raw_score(metric: MetricType, query: &[f32], row: &[f32]) -> f32 {
    match metric {
        MetricType::Cosine => cosine_similarity(query, row),
        MetricType::InnerProduct => query.iter().zip(row).map(|(a, b)| a * b).sum(),
        MetricType::L2 => query
            .iter()
            .zip(row)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt(),
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn connect(&self, endpoint: &Endpoint, alias: &str, _timeout: Duration) -> Result<()> {
        debug!("memory backend: connect {alias} -> {endpoint}");
        *self.connected.write().await = Some(endpoint.clone());
        Ok(())
    }

    async fn disconnect(&self, alias: &str) {
        debug!("memory backend: disconnect {alias}");
        *self.connected.write().await = None;
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.require_connection().await?;
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        self.require_connection().await?;
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        params: &IndexParams,
    ) -> Result<()> {
        self.require_connection().await?;
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(VectorStoreError::Backend(format!(
                "collection {name} already exists"
            )));
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                params: *params,
                rows: Vec::new(),
                loaded: false,
            },
        );
        Ok(())
    }

    async fn insert(&self, collection: &str, rows: &[VectorDocument]) -> Result<usize> {
        self.require_connection().await?;
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = rows.iter().find(|row| row.dimension() != target.dimension) {
            return Err(VectorStoreError::Backend(format!(
                "row {} has dimension {}, collection {collection} expects {}",
                bad.id,
                bad.dimension(),
                target.dimension
            )));
        }

        for row in rows {
            match target.rows.iter_mut().find(|existing| existing.id == row.id) {
                Some(existing) => *existing = row.clone(),
                None => target.rows.push(row.clone()),
            }
        }
        Ok(rows.len())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        params: &SearchParams,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<BackendHit>> {
        self.require_connection().await?;
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        if vector.len() != target.dimension {
            return Err(VectorStoreError::Backend(format!(
                "query has dimension {}, collection {collection} expects {}",
                vector.len(),
                target.dimension
            )));
        }

        let mut scored: Vec<(&VectorDocument, f32)> = target
            .rows
            .iter()
            .filter(|row| filter.is_none_or(|f| f.matches_document(row)))
            .map(|row| (row, raw_score(params.metric, vector, &row.vector)))
            .collect();

        if params.metric.higher_is_better() {
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        } else {
            scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        }

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(row, raw_score)| BackendHit {
                id: row.id.clone(),
                doc_id: row.doc_id.clone(),
                text: row.text.clone(),
                metadata: row.metadata.clone(),
                raw_score,
            })
            .collect())
    }

    async fn delete(&self, collection: &str, filter: &FilterExpr) -> Result<usize> {
        self.require_connection().await?;
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        let before = target.rows.len();
        target.rows.retain(|row| !filter.matches_document(row));
        Ok(before - target.rows.len())
    }

    async fn flush(&self, collection: &str) -> Result<()> {
        self.require_connection().await?;
        if !self.collections.read().await.contains_key(collection) {
            return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
        }
        Ok(())
    }

    async fn load(&self, collection: &str) -> Result<()> {
        self.require_connection().await?;
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        target.loaded = true;
        Ok(())
    }

    async fn describe_collection(&self, collection: &str) -> Result<CollectionDescription> {
        self.require_connection().await?;
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        let field = |name: &str, data_type: &str, is_primary: bool| FieldDescriptor {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_primary,
        };
        Ok(CollectionDescription {
            name: collection.to_string(),
            dimension: target.dimension,
            row_count: target.rows.len() as u64,
            fields: vec![
                field("id", "VARCHAR", true),
                field("doc_id", "VARCHAR", false),
                field("text", "VARCHAR", false),
                field("metadata", "JSON", false),
                field("vector", &format!("FLOAT_VECTOR({})", target.dimension), false),
            ],
            indexes: vec![IndexDescriptor {
                field: "vector".to_string(),
                params: target.params,
            }],
            loaded: target.loaded,
        })
    }
}
