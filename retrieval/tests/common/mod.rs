#![allow(dead_code)]

use async_trait::async_trait;
use lodestar_embeddings::EmbeddingError;
use lodestar_embeddings::EmbeddingProvider;
use lodestar_retrieval::Document;
use lodestar_retrieval::DocumentSource;
use lodestar_retrieval::HybridRetriever;
use lodestar_retrieval::RetrievalConfig;
use lodestar_retrieval::tokenize;
use lodestar_vector_store::MemoryBackend;
use lodestar_vector_store::Metadata;
use lodestar_vector_store::VectorBackendClient;
use lodestar_vector_store::VectorClientConfig;
use lodestar_vector_store::VectorDocument;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

pub const DIM: usize = 64;
pub const COLLECTION: &str = "schema_docs";

/// Bag-of-words embedder hashing each term into a fixed bucket.
#[derive(Default)]
pub struct HashEmbedder {
    /// Fail any batch larger than one text (query embedding still works).
    pub fail_batches: AtomicBool,
    pub batch_calls: AtomicUsize,
}

pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    for term in tokenize(text) {
        let bucket = term
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(usize::from(b)))
            % DIM;
        vector[bucket] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if texts.len() > 1 && self.fail_batches.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingGeneration(
                "batch endpoint unavailable".to_string(),
            ));
        }
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

/// Document source backed by a fixed map, counting loads.
#[derive(Default)]
pub struct StaticSource {
    pub documents: HashMap<String, Vec<Document>>,
    pub loads: AtomicUsize,
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn load_documents(&self, collection: &str) -> lodestar_retrieval::Result<Vec<Document>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.get(collection).cloned().unwrap_or_default())
    }
}

fn team(name: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("team".to_string(), json!(name));
    metadata
}

pub fn corpus() -> Vec<Document> {
    vec![
        Document::new("orders", "order table has order_id and amount").with_metadata(team("sales")),
        Document::new("order_lines", "order line table has order_id amount and quantity")
            .with_metadata(team("sales")),
        Document::new("users", "user table has user_id and name").with_metadata(team("identity")),
        Document::new("products", "product table has product_id and price")
            .with_metadata(team("catalog")),
        Document::new("purchases", "purchase history keyed by customer").with_metadata(team("sales")),
        Document::new("sessions", "login session tokens with expiry").with_metadata(team("identity")),
    ]
}

pub struct Fixture {
    pub retriever: HybridRetriever,
    pub embedder: Arc<HashEmbedder>,
}

/// Retriever over [`corpus`] with rows in a [`MemoryBackend`]. The lexical
/// index is built only when `index_lexical` is set.
pub async fn fixture(config: RetrievalConfig, index_lexical: bool) -> Fixture {
    let client = VectorBackendClient::connect(
        Arc::new(MemoryBackend::new()),
        VectorClientConfig::default(),
    )
    .await
    .unwrap();
    client.ensure_collection(COLLECTION, DIM).await.unwrap();

    let rows: Vec<VectorDocument> = corpus()
        .into_iter()
        .map(|doc| {
            let vector = hash_embed(&doc.text);
            VectorDocument::new(doc.id.clone(), doc.id, doc.text, vector).with_metadata(doc.metadata)
        })
        .collect();
    client.insert(COLLECTION, &rows).await.unwrap();

    let embedder = Arc::new(HashEmbedder::default());
    let retriever = HybridRetriever::new(config, Arc::new(client), embedder.clone()).unwrap();
    if index_lexical {
        retriever.index_documents(COLLECTION, corpus()).await.unwrap();
    }
    Fixture {
        retriever,
        embedder,
    }
}
