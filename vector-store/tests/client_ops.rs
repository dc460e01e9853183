mod common;

use common::ScriptedBackend;
use lodestar_vector_store::Endpoint;
use lodestar_vector_store::MetricType;
use lodestar_vector_store::VectorBackendClient;
use lodestar_vector_store::VectorClientConfig;
use lodestar_vector_store::VectorDocument;
use lodestar_vector_store::VectorSearchRequest;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const COLLECTION: &str = "chunks";

fn docs(count: usize) -> Vec<VectorDocument> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32;
            VectorDocument::new(
                format!("chunk-{i}"),
                format!("doc-{}", i / 10),
                format!("chunk number {i}"),
                vec![1.0 - angle, angle, 0.5],
            )
        })
        .collect()
}

async fn client_with(config: VectorClientConfig) -> (Arc<ScriptedBackend>, VectorBackendClient) {
    let backend = Arc::new(ScriptedBackend::new());
    let client = VectorBackendClient::connect(backend.clone(), config)
        .await
        .unwrap();
    client.ensure_collection(COLLECTION, 3).await.unwrap();
    (backend, client)
}

async fn client() -> (Arc<ScriptedBackend>, VectorBackendClient) {
    client_with(VectorClientConfig::with_endpoints(vec![Endpoint::new("local", 19530)])).await
}

#[tokio::test]
async fn batch_insert_splits_into_fixed_batches() {
    let (backend, client) = client().await;

    let report = client.insert(COLLECTION, &docs(2500)).await.unwrap();

    assert_eq!(report.batches, 3);
    assert_eq!(report.inserted, 2500);
    assert_eq!(report.failed, 0);
    assert_eq!(backend.insert_calls(), 3);
}

#[tokio::test]
async fn failed_batch_does_not_abort_the_rest() {
    let (backend, client) = client().await;
    backend.fail_insert_call(1);

    let report = client
        .batch_insert(COLLECTION, &docs(250), 100)
        .await
        .unwrap();

    assert_eq!(report.batches, 3);
    assert_eq!(report.inserted, 150);
    assert_eq!(report.failed, 100);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("batch 1:"));
    assert_eq!(client.collection_stats(COLLECTION).await.unwrap().row_count, 150);
}

#[tokio::test]
async fn first_page_results_are_cached() {
    let (backend, client) = client().await;
    client.insert(COLLECTION, &docs(50)).await.unwrap();

    let request = VectorSearchRequest::new(COLLECTION, vec![1.0, 0.0, 0.5], 5);
    let first = client.search(&request).await.unwrap();
    let second = client.search(&request).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.hits, second.hits);
    assert_eq!(backend.search_calls(), 1);

    let uncached = client.search(&request.clone().without_cache()).await.unwrap();
    assert!(!uncached.cached);
    assert_eq!(backend.search_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cached_results_expire_after_ttl() {
    let mut config = VectorClientConfig::with_endpoints(vec![Endpoint::new("local", 19530)]);
    config.cache_ttl_secs = 60;
    let (backend, client) = client_with(config).await;
    client.insert(COLLECTION, &docs(20)).await.unwrap();

    let request = VectorSearchRequest::new(COLLECTION, vec![1.0, 0.0, 0.5], 3);
    client.search(&request).await.unwrap();

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(client.search(&request).await.unwrap().cached);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!client.search(&request).await.unwrap().cached);
    assert_eq!(backend.search_calls(), 2);
}

#[tokio::test]
async fn offset_pages_bypass_the_cache() {
    let (backend, client) = client().await;
    client.insert(COLLECTION, &docs(30)).await.unwrap();

    let query = vec![1.0, 0.0, 0.5];
    let full = client
        .search(&VectorSearchRequest::new(COLLECTION, query.clone(), 10).without_cache())
        .await
        .unwrap();
    let page_two = client
        .search(&VectorSearchRequest::new(COLLECTION, query.clone(), 5).with_offset(5))
        .await
        .unwrap();
    let page_two_again = client
        .search(&VectorSearchRequest::new(COLLECTION, query, 5).with_offset(5))
        .await
        .unwrap();

    assert!(!page_two.cached);
    assert!(!page_two_again.cached);
    assert_eq!(page_two.hits, full.hits[5..10].to_vec());
    assert_eq!(backend.search_calls(), 3);
}

#[tokio::test]
async fn hits_carry_scores_in_descending_order() {
    let (_backend, client) = client().await;
    client.insert(COLLECTION, &docs(40)).await.unwrap();

    let results = client
        .search(&VectorSearchRequest::new(COLLECTION, vec![1.0, 0.0, 0.5], 10))
        .await
        .unwrap();

    assert_eq!(results.hits.len(), 10);
    assert_eq!(results.hits[0].id, "chunk-0");
    assert!(
        results
            .hits
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
    assert_eq!(client.config().index.metric, MetricType::Cosine);
}

#[tokio::test]
async fn delete_reports_per_document_outcomes() {
    let (_backend, client) = client().await;
    client.insert(COLLECTION, &docs(30)).await.unwrap();

    assert_eq!(client.delete_by_doc_id(COLLECTION, "doc-0").await.unwrap(), 10);

    let report = client
        .delete_by_doc_ids(COLLECTION, &["doc-1", "bad\u{0}id", "doc-9", "doc-2"])
        .await
        .unwrap();

    assert_eq!(report.deleted, vec!["doc-1", "doc-9", "doc-2"]);
    assert_eq!(report.rows_removed, 20);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].doc_id, "bad\u{0}id");
    assert_eq!(client.collection_stats(COLLECTION).await.unwrap().row_count, 0);
}

#[tokio::test]
async fn doc_ids_with_quotes_are_matched_literally() {
    let (_backend, client) = client().await;
    client
        .insert(
            COLLECTION,
            &[
                VectorDocument::new("c1", r#"x" or doc_id != "y"#, "", vec![1.0, 0.0, 0.0]),
                VectorDocument::new("c2", "y", "", vec![0.0, 1.0, 0.0]),
            ],
        )
        .await
        .unwrap();

    let removed = client
        .delete_by_doc_id(COLLECTION, r#"x" or doc_id != "y"#)
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(client.collection_stats(COLLECTION).await.unwrap().row_count, 1);
}

#[tokio::test]
async fn collection_stats_estimate_memory() {
    let (_backend, client) = client().await;
    client.insert(COLLECTION, &docs(100)).await.unwrap();

    let stats = client.collection_stats(COLLECTION).await.unwrap();

    assert_eq!(stats.row_count, 100);
    assert_eq!(stats.dimension, 3);
    assert_eq!(stats.estimated_memory_bytes, 100 * 3 * 4);
    assert!(stats.loaded);
    assert_eq!(stats.indexes.len(), 1);
}
