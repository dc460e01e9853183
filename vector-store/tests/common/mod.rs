#![allow(dead_code)]

use async_trait::async_trait;
use lodestar_vector_store::BackendHit;
use lodestar_vector_store::CollectionDescription;
use lodestar_vector_store::Endpoint;
use lodestar_vector_store::FilterExpr;
use lodestar_vector_store::IndexParams;
use lodestar_vector_store::MemoryBackend;
use lodestar_vector_store::Result;
use lodestar_vector_store::SearchParams;
use lodestar_vector_store::VectorBackend;
use lodestar_vector_store::VectorDocument;
use lodestar_vector_store::VectorStoreError;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// [`MemoryBackend`] wrapper with scriptable outages and call counters.
#[derive(Default)]
pub struct ScriptedBackend {
    inner: MemoryBackend,
    down: Mutex<HashSet<String>>,
    connected_host: Mutex<Option<String>>,
    connect_attempts: Mutex<HashMap<String, u32>>,
    insert_calls: AtomicUsize,
    search_calls: AtomicUsize,
    failing_insert_call: Mutex<Option<usize>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_down(&self, host: &str) {
        self.down.lock().unwrap().insert(host.to_string());
    }

    pub fn bring_up(&self, host: &str) {
        self.down.lock().unwrap().remove(host);
    }

    pub fn attempts(&self, host: &str) -> u32 {
        self.connect_attempts
            .lock()
            .unwrap()
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.connect_attempts.lock().unwrap().values().sum()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Make the `call`-th insert (0-based) fail.
    pub fn fail_insert_call(&self, call: usize) {
        *self.failing_insert_call.lock().unwrap() = Some(call);
    }

    fn is_down(&self, host: &str) -> bool {
        self.down.lock().unwrap().contains(host)
    }

    fn check_link(&self) -> Result<()> {
        let host = self.connected_host.lock().unwrap().clone();
        match host {
            Some(host) if !self.is_down(&host) => Ok(()),
            Some(host) => Err(VectorStoreError::Backend(format!("{host} went away"))),
            None => Err(VectorStoreError::Backend("not connected".to_string())),
        }
    }
}

#[async_trait]
impl VectorBackend for ScriptedBackend {
    async fn connect(&self, endpoint: &Endpoint, alias: &str, timeout: Duration) -> Result<()> {
        *self
            .connect_attempts
            .lock()
            .unwrap()
            .entry(endpoint.host.clone())
            .or_default() += 1;
        if self.is_down(&endpoint.host) {
            return Err(VectorStoreError::Backend(format!(
                "connection refused by {endpoint}"
            )));
        }
        *self.connected_host.lock().unwrap() = Some(endpoint.host.clone());
        self.inner.connect(endpoint, alias, timeout).await
    }

    async fn disconnect(&self, alias: &str) {
        *self.connected_host.lock().unwrap() = None;
        self.inner.disconnect(alias).await;
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.check_link()?;
        self.inner.list_collections().await
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        self.check_link()?;
        self.inner.has_collection(name).await
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        params: &IndexParams,
    ) -> Result<()> {
        self.check_link()?;
        self.inner.create_collection(name, dimension, params).await
    }

    async fn insert(&self, collection: &str, rows: &[VectorDocument]) -> Result<usize> {
        self.check_link()?;
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing_insert_call.lock().unwrap() == Some(call) {
            return Err(VectorStoreError::Backend(format!("insert call {call} rejected")));
        }
        self.inner.insert(collection, rows).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        params: &SearchParams,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<BackendHit>> {
        self.check_link()?;
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .search(collection, vector, limit, params, filter)
            .await
    }

    async fn delete(&self, collection: &str, filter: &FilterExpr) -> Result<usize> {
        self.check_link()?;
        self.inner.delete(collection, filter).await
    }

    async fn flush(&self, collection: &str) -> Result<()> {
        self.check_link()?;
        self.inner.flush(collection).await
    }

    async fn load(&self, collection: &str) -> Result<()> {
        self.check_link()?;
        self.inner.load(collection).await
    }

    async fn describe_collection(&self, collection: &str) -> Result<CollectionDescription> {
        self.check_link()?;
        self.inner.describe_collection(collection).await
    }
}

pub fn endpoints(hosts: &[&str]) -> Vec<Endpoint> {
    hosts
        .iter()
        .enumerate()
        .map(|(i, host)| Endpoint::new(*host, 19530 + i as u16))
        .collect()
}
