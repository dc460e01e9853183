use crate::config::RetrievalConfig;
use crate::result::{RetrievalResult, RetrievalSource};
use log::debug;
use std::collections::HashMap;
use std::collections::HashSet;

/// Weighted Reciprocal Rank Fusion of the vector and keyword rankings.
///
/// `score(d) = Σ weight_source / (k + rank_source(d))` with 1-based ranks. A
/// document missing from one ranking contributes nothing from it.
#[derive(Debug, Clone, Copy)]
pub struct FusionEngine {
    rrf_k: f64,
    vector_weight: f64,
    keyword_weight: f64,
}

impl FusionEngine {
    pub fn new(rrf_k: f64, vector_weight: f64, keyword_weight: f64) -> Self {
        Self {
            rrf_k,
            vector_weight,
            keyword_weight,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.rrf_k, config.vector_weight, config.keyword_weight)
    }

    /// Fuse two rankings and keep the best `top_k`.
    ///
    /// Output order is deterministic: fused score descending, ties in order
    /// of first appearance (vector ranking first, then keyword ranking).
    pub fn fuse(
        &self,
        vector_results: Vec<RetrievalResult>,
        keyword_results: Vec<RetrievalResult>,
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        debug!(
            "RRF fusion: {} vector + {} keyword",
            vector_results.len(),
            keyword_results.len()
        );

        let mut fused: Vec<RetrievalResult> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        self.accumulate(&mut fused, &mut positions, vector_results, self.vector_weight);
        self.accumulate(&mut fused, &mut positions, keyword_results, self.keyword_weight);

        fused.sort_by(|a, b| b.score.total_cmp(&a.score));
        fused.truncate(top_k);

        debug!("RRF produced {} results", fused.len());
        fused
    }

    fn accumulate(
        &self,
        fused: &mut Vec<RetrievalResult>,
        positions: &mut HashMap<String, usize>,
        ranking: Vec<RetrievalResult>,
        weight: f64,
    ) {
        let mut seen: HashSet<String> = HashSet::new();
        for (index, result) in ranking.into_iter().enumerate() {
            // A repeated id keeps its best (first) rank.
            if !seen.insert(result.id.clone()) {
                continue;
            }
            let rank = (index + 1) as f64;
            let contribution = weight / (self.rrf_k + rank);

            let (vector_score, keyword_score) = match result.source {
                RetrievalSource::Keyword => (None, Some(result.score)),
                _ => (Some(result.score), None),
            };

            match positions.get(&result.id) {
                Some(&position) => {
                    let entry = &mut fused[position];
                    entry.score += contribution;
                    entry.vector_score = entry.vector_score.or(vector_score);
                    entry.keyword_score = entry.keyword_score.or(keyword_score);
                }
                None => {
                    positions.insert(result.id.clone(), fused.len());
                    fused.push(RetrievalResult {
                        score: contribution,
                        source: RetrievalSource::Rrf,
                        vector_score,
                        keyword_score,
                        ..result
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_vector_store::Metadata;
    use pretty_assertions::assert_eq;

    fn ranked(ids: &[&str], source: RetrievalSource) -> Vec<RetrievalResult> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| RetrievalResult {
                id: id.to_string(),
                text: format!("text of {id}"),
                score: 1.0 - i as f64 * 0.1,
                metadata: Metadata::new(),
                source,
                vector_score: None,
                keyword_score: None,
            })
            .collect()
    }

    fn engine() -> FusionEngine {
        FusionEngine::from_config(&RetrievalConfig::default())
    }

    #[test]
    fn test_rrf_exact_scores() {
        let fused = engine().fuse(
            ranked(&["d1", "d2", "d3"], RetrievalSource::Vector),
            ranked(&["d2", "d1", "d4"], RetrievalSource::Keyword),
            10,
        );

        let ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3", "d4"]);

        assert_eq!(fused[0].score, 0.7 / 61.0 + 0.3 / 62.0);
        assert_eq!(fused[1].score, 0.7 / 62.0 + 0.3 / 61.0);
        assert_eq!(fused[2].score, 0.7 / 63.0);
        assert_eq!(fused[3].score, 0.3 / 63.0);
        assert!(fused.iter().all(|r| r.source == RetrievalSource::Rrf));
    }

    #[test]
    fn test_component_scores_carried() {
        let fused = engine().fuse(
            ranked(&["d1", "d2"], RetrievalSource::Vector),
            ranked(&["d2", "d3"], RetrievalSource::Keyword),
            10,
        );
        let d2 = fused.iter().find(|r| r.id == "d2").unwrap();
        assert_eq!(d2.vector_score, Some(0.9));
        assert_eq!(d2.keyword_score, Some(1.0));

        let d3 = fused.iter().find(|r| r.id == "d3").unwrap();
        assert_eq!(d3.vector_score, None);
        assert_eq!(d3.keyword_score, Some(0.9));
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let run = || {
            engine().fuse(
                ranked(&["a", "b", "c", "d"], RetrievalSource::Vector),
                ranked(&["d", "c", "b", "a"], RetrievalSource::Keyword),
                10,
            )
        };
        let first = run();
        for _ in 0..10 {
            assert_eq!(run(), first);
        }
    }

    #[test]
    fn test_ties_keep_first_appearance() {
        let engine = FusionEngine::new(60.0, 0.5, 0.5);
        let fused = engine.fuse(
            ranked(&["v"], RetrievalSource::Vector),
            ranked(&["k"], RetrievalSource::Keyword),
            10,
        );
        let ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["v", "k"]);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let fused = engine().fuse(
            ranked(&["a", "b", "c"], RetrievalSource::Vector),
            Vec::new(),
            2,
        );
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_repeated_id_uses_best_rank() {
        let fused = engine().fuse(
            ranked(&["a", "a", "b"], RetrievalSource::Vector),
            Vec::new(),
            10,
        );
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].score, 0.7 / 61.0);
        assert_eq!(fused[1].score, 0.7 / 63.0);
    }
}
