/*!
# Lodestar Retrieval

Hybrid lexical + semantic retrieval:
- **Keyword search** via an in-memory BM25 index per collection
- **Vector search** via an [`EmbeddingProvider`](lodestar_embeddings::EmbeddingProvider)
  and a fault-tolerant [`VectorBackendClient`](lodestar_vector_store::VectorBackendClient)
- **Reciprocal Rank Fusion (RRF)** for combining the two rankings
- **Maximal Marginal Relevance (MMR)** for diversity re-ranking

## Architecture

```text
Query
  ├─> Cache check ──hit──> Results
  ├─> Vector leg (embed query → backend top-k)
  ├─> Keyword leg (expanded terms → BM25 top-k)
  └─> Fusion (weighted RRF)
        └─> MMR (optional)
              └─> Cache write ──> Results
```

## Example

```rust,ignore
use lodestar_retrieval::{HybridRetriever, RetrievalConfig, RetrievalMethod, RetrievalRequest};

let retriever = HybridRetriever::new(RetrievalConfig::default(), client, embedder)?;
retriever.index_documents("tables", documents).await?;

let results = retriever
    .retrieve(&RetrievalRequest::new("tables", "order amount").with_method(RetrievalMethod::Mmr))
    .await?;

for (i, result) in results.top(5).iter().enumerate() {
    println!("{}. {} (score: {:.4})", i + 1, result.id, result.score);
}
```

## Methods

- **Vector**: embedding similarity only
- **Keyword**: BM25 only; falls back to vector search when the collection
  has no lexical index
- **Hybrid** (default): `Σ weight / (rrf_k + rank)` over both rankings
- **Mmr**: hybrid candidates, greedily re-ranked for diversity
*/

mod config;
mod error;
mod expansion;
mod fusion;
mod lexical;
mod rerank;
mod result;
mod retrieval;
mod source;

pub use config::{LodestarConfig, RetrievalConfig};
pub use error::{Result, RetrievalError};
pub use expansion::{QueryExpander, QueryExpansion};
pub use fusion::FusionEngine;
pub use lexical::{LexicalHit, LexicalIndex, query_terms, tokenize};
pub use lodestar_utils_cache::CacheStats;
pub use rerank::MmrReranker;
pub use result::{
    Document, RetrievalMethod, RetrievalRequest, RetrievalResult, RetrievalResults,
    RetrievalSource, RetrievalStats,
};
pub use retrieval::HybridRetriever;
pub use source::DocumentSource;
