//! In-memory BM25 index.
//!
//! The index is rebuilt wholesale by [`LexicalIndex::index_documents`]; there
//! are no incremental updates. Scores follow Okapi BM25:
//!
//! ```text
//! idf(t)      = ln((N - df(t) + 0.5) / (df(t) + 0.5) + 1)
//! score(d, q) = Σ idf(t) · tf(t)·(k1 + 1) / (tf(t) + k1·(1 - b + b·|d| / avgdl))
//! ```

use crate::result::Document;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "if",
    "in", "into", "is", "it", "its", "no", "not", "of", "on", "or", "such", "that", "the",
    "their", "then", "there", "these", "they", "this", "to", "was", "were", "will", "with",
];

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || is_cjk_ideograph(c)
}

/// Split text into index terms.
///
/// Terms are lowercased runs of ASCII word characters or CJK ideographs.
/// Single-character runs and stop words are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_token_char(c))
        .filter(|token| token.chars().count() > 1 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Tokenize a query, keeping the first occurrence of each term.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(query) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct Posting {
    term_freqs: HashMap<String, u32>,
    length: usize,
}

#[derive(Debug, Clone)]
pub struct LexicalIndex {
    k1: f64,
    b: f64,
    documents: Vec<Document>,
    postings: Vec<Posting>,
    positions: HashMap<String, usize>,
    idf: HashMap<String, f64>,
    avg_doc_len: f64,
}

impl LexicalIndex {
    pub fn new(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            documents: Vec::new(),
            postings: Vec::new(),
            positions: HashMap::new(),
            idf: HashMap::new(),
            avg_doc_len: 0.0,
        }
    }

    /// Build an index with the standard parameters (`k1 = 1.2`, `b = 0.75`).
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut index = Self::new(1.2, 0.75);
        index.index_documents(documents);
        index
    }

    /// Replace the whole index. A repeated id overwrites the earlier
    /// document in place.
    pub fn index_documents(&mut self, documents: Vec<Document>) {
        let mut unique: Vec<Document> = Vec::with_capacity(documents.len());
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(documents.len());
        for document in documents {
            match positions.get(&document.id) {
                Some(&position) => unique[position] = document,
                None => {
                    positions.insert(document.id.clone(), unique.len());
                    unique.push(document);
                }
            }
        }

        let postings: Vec<Posting> = unique
            .iter()
            .map(|document| {
                let tokens = tokenize(&document.text);
                let mut term_freqs: HashMap<String, u32> = HashMap::new();
                for token in &tokens {
                    *term_freqs.entry(token.clone()).or_default() += 1;
                }
                Posting {
                    term_freqs,
                    length: tokens.len(),
                }
            })
            .collect();

        let mut doc_freqs: HashMap<&str, usize> = HashMap::new();
        for posting in &postings {
            for term in posting.term_freqs.keys() {
                *doc_freqs.entry(term.as_str()).or_default() += 1;
            }
        }

        let n = postings.len() as f64;
        let idf = doc_freqs
            .into_iter()
            .map(|(term, df)| {
                let df = df as f64;
                (term.to_string(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
            })
            .collect();

        let total_len: usize = postings.iter().map(|p| p.length).sum();
        self.avg_doc_len = if postings.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };
        self.idf = idf;
        self.postings = postings;
        self.positions = positions;
        self.documents = unique;
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.positions.get(id).map(|&position| &self.documents[position])
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// Rank documents for `query`. An empty tokenized query yields no hits.
    pub fn search(&self, query: &str, top_k: usize, min_score: f64) -> Vec<LexicalHit> {
        self.search_terms(&query_terms(query), top_k, min_score)
    }

    pub fn search_terms(&self, terms: &[String], top_k: usize, min_score: f64) -> Vec<LexicalHit> {
        self.search_terms_where(terms, top_k, min_score, |_| true)
    }

    /// Rank documents accepted by `keep`. Only documents containing at least
    /// one term are scored; ties keep indexing order.
    pub fn search_terms_where<F>(
        &self,
        terms: &[String],
        top_k: usize,
        min_score: f64,
        keep: F,
    ) -> Vec<LexicalHit>
    where
        F: Fn(&Document) -> bool,
    {
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .postings
            .iter()
            .enumerate()
            .filter(|(_, posting)| terms.iter().any(|t| posting.term_freqs.contains_key(t)))
            .filter(|(position, _)| keep(&self.documents[*position]))
            .map(|(position, posting)| (position, self.score_posting(terms, posting)))
            .filter(|(_, score)| *score >= min_score)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(top_k)
            .map(|(position, score)| LexicalHit {
                id: self.documents[position].id.clone(),
                score,
            })
            .collect()
    }

    /// BM25 score of document `id` for `query`; `None` if the id is unknown.
    pub fn score_document(&self, query: &str, id: &str) -> Option<f64> {
        let position = *self.positions.get(id)?;
        Some(self.score_posting(&query_terms(query), &self.postings[position]))
    }

    fn score_posting(&self, terms: &[String], posting: &Posting) -> f64 {
        if self.avg_doc_len <= 0.0 {
            return 0.0;
        }
        let length_ratio = posting.length as f64 / self.avg_doc_len;
        let norm = self.k1 * (1.0 - self.b + self.b * length_ratio);

        terms
            .iter()
            .filter_map(|term| {
                let tf = f64::from(*posting.term_freqs.get(term)?);
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                Some(idf * tf * (self.k1 + 1.0) / (tf + norm))
            })
            .sum()
    }
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new(1.2, 0.75)
    }
}
