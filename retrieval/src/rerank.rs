use crate::result::{RetrievalResult, RetrievalSource};
use lodestar_embeddings::EmbeddingError;
use lodestar_embeddings::EmbeddingProvider;
use lodestar_embeddings::cosine_similarity;
use log::debug;

/// Maximal Marginal Relevance re-ranking.
///
/// Greedily picks the candidate maximising
/// `λ·relevance(d) − (1 − λ)·max_{s ∈ selected} sim(d, s)`, where relevance
/// is the candidate's score divided by the best score in the pool and
/// similarity is the cosine of the candidates' text embeddings.
#[derive(Debug, Clone, Copy)]
pub struct MmrReranker {
    lambda: f64,
}

impl MmrReranker {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda: lambda.clamp(0.0, 1.0),
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Embed the candidates' texts and select up to `top_k` of them.
    pub async fn rerank(
        &self,
        candidates: Vec<RetrievalResult>,
        top_k: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<RetrievalResult>, EmbeddingError> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != candidates.len() {
            return Err(EmbeddingError::EmbeddingGeneration(format!(
                "expected {} embeddings, got {}",
                candidates.len(),
                embeddings.len()
            )));
        }
        Ok(self.select(candidates, &embeddings, top_k))
    }

    /// Greedy selection over precomputed embeddings, one per candidate.
    ///
    /// Candidates are expected in descending relevance order; ties resolve
    /// to the earlier candidate. Selected results keep their score and are
    /// tagged [`RetrievalSource::Mmr`].
    pub fn select(
        &self,
        candidates: Vec<RetrievalResult>,
        embeddings: &[Vec<f32>],
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        let max_score = candidates
            .iter()
            .map(|c| c.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let relevance: Vec<f64> = candidates
            .iter()
            .map(|c| if max_score > 0.0 { c.score / max_score } else { c.score })
            .collect();

        let mut remaining: Vec<usize> = (0..candidates.len()).collect();
        let mut selected: Vec<usize> = Vec::with_capacity(top_k.min(candidates.len()));

        while selected.len() < top_k && !remaining.is_empty() {
            let mut best: Option<(usize, f64)> = None;
            for (slot, &candidate) in remaining.iter().enumerate() {
                let value = if selected.is_empty() {
                    relevance[candidate]
                } else {
                    let max_sim = selected
                        .iter()
                        .map(|&chosen| {
                            f64::from(cosine_similarity(
                                &embeddings[candidate],
                                &embeddings[chosen],
                            ))
                        })
                        .fold(f64::NEG_INFINITY, f64::max);
                    self.lambda * relevance[candidate] - (1.0 - self.lambda) * max_sim
                };
                if best.is_none_or(|(_, best_value)| value > best_value) {
                    best = Some((slot, value));
                }
            }
            let Some((slot, _)) = best else {
                break;
            };
            selected.push(remaining.remove(slot));
        }

        debug!(
            "MMR selected {} of {} candidates (lambda {})",
            selected.len(),
            candidates.len(),
            self.lambda
        );

        let mut slots: Vec<Option<RetrievalResult>> = candidates.into_iter().map(Some).collect();
        selected
            .into_iter()
            .filter_map(|index| slots[index].take())
            .map(|result| RetrievalResult {
                source: RetrievalSource::Mmr,
                ..result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lodestar_vector_store::Metadata;
    use pretty_assertions::assert_eq;

    fn candidate(id: &str, score: f64) -> RetrievalResult {
        RetrievalResult {
            id: id.to_string(),
            text: id.to_string(),
            score,
            metadata: Metadata::new(),
            source: RetrievalSource::Rrf,
            vector_score: None,
            keyword_score: None,
        }
    }

    fn ids(results: &[RetrievalResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    // a1 and a2 are near-duplicates; b points elsewhere.
    fn pool() -> (Vec<RetrievalResult>, Vec<Vec<f32>>) {
        (
            vec![
                candidate("a1", 0.030),
                candidate("a2", 0.029),
                candidate("b", 0.020),
                candidate("c", 0.010),
            ],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.99, 0.01, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        )
    }

    #[test]
    fn test_lambda_one_keeps_relevance_order() {
        let (candidates, embeddings) = pool();
        let selected = MmrReranker::new(1.0).select(candidates.clone(), &embeddings, 3);

        assert_eq!(ids(&selected), vec!["a1", "a2", "b"]);
        for (picked, original) in selected.iter().zip(&candidates) {
            assert_eq!(picked.score, original.score);
            assert_eq!(picked.source, RetrievalSource::Mmr);
        }
    }

    #[test]
    fn test_balanced_lambda_skips_near_duplicate() {
        let (candidates, embeddings) = pool();
        let selected = MmrReranker::new(0.5).select(candidates, &embeddings, 3);

        assert_eq!(ids(&selected), vec!["a1", "b", "c"]);
    }

    #[test]
    fn test_first_pick_is_most_relevant_even_at_lambda_zero() {
        let (candidates, embeddings) = pool();
        let selected = MmrReranker::new(0.0).select(candidates, &embeddings, 1);
        assert_eq!(ids(&selected), vec!["a1"]);
    }

    #[test]
    fn test_never_emits_duplicates_and_stops_when_exhausted() {
        let (candidates, embeddings) = pool();
        let selected = MmrReranker::new(0.3).select(candidates, &embeddings, 10);

        let mut seen = ids(&selected);
        assert_eq!(seen.len(), 4);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| if t.starts_with('a') { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::EmbeddingGeneration("model offline".to_string()))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_rerank_embeds_candidate_texts() {
        let (candidates, _) = pool();
        let selected = MmrReranker::new(0.5)
            .rerank(candidates, 2, &AxisEmbedder)
            .await
            .unwrap();
        assert_eq!(ids(&selected), vec!["a1", "b"]);
    }

    #[tokio::test]
    async fn test_rerank_propagates_embedding_failure() {
        let (candidates, _) = pool();
        let result = MmrReranker::new(0.5)
            .rerank(candidates, 2, &BrokenEmbedder)
            .await;
        assert!(result.is_err());
    }
}
