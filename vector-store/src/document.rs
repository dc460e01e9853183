use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arbitrary per-row metadata. Ordered so serialized forms are stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A row stored in a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorDocument {
    /// Primary key of the row (usually a chunk id)
    pub id: String,

    /// Id of the source document this row was derived from
    pub doc_id: String,

    /// Text the vector was computed from
    pub text: String,

    /// Embedding
    pub vector: Vec<f32>,

    /// Additional metadata, filterable by key
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorDocument {
    pub fn new(
        id: impl Into<String>,
        doc_id: impl Into<String>,
        text: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            doc_id: doc_id.into(),
            text: text.into(),
            vector,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// A formatted search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub doc_id: String,
    pub text: String,

    /// Similarity score, higher is better
    pub score: f64,

    /// Raw value reported by the backend (similarity or distance,
    /// depending on the metric)
    pub distance: f64,

    #[serde(default)]
    pub metadata: Metadata,
}
