use crate::error::Result;
use crate::result::Document;
use async_trait::async_trait;

/// Supplies a collection's documents when the retriever needs to build a
/// lexical index it does not have yet.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// All documents of `collection`. An empty list means the collection
    /// has no lexical index and keyword requests fall back to vector search.
    async fn load_documents(&self, collection: &str) -> Result<Vec<Document>>;
}
