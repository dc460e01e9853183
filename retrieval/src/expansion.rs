//! Query expansion.
//!
//! Expansion produces alternative phrasings of a query. The keyword leg
//! searches the union of the original and expanded terms; the vector leg
//! always embeds the original query.

use crate::lexical::tokenize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryExpansion {
    /// Use the query as given
    None,
    /// Swap terms for entries from a built-in synonym table
    Synonym,
    /// Reserved for embedding-neighbour expansion; currently yields nothing
    Embedding,
}

/// Related terms for common data and platform vocabulary.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("amount", &["total", "sum", "price"]),
    ("auth", &["authentication", "login", "session"]),
    ("cache", &["caching", "ttl"]),
    ("config", &["configuration", "settings"]),
    ("customer", &["client", "user", "buyer"]),
    ("db", &["database", "sql"]),
    ("delete", &["remove", "drop"]),
    ("doc", &["document"]),
    ("error", &["failure", "exception"]),
    ("id", &["identifier", "key"]),
    ("order", &["purchase", "transaction"]),
    ("price", &["cost", "amount"]),
    ("product", &["item", "sku"]),
    ("query", &["search", "lookup"]),
    ("table", &["relation", "schema"]),
    ("user", &["account", "customer"]),
];

fn synonyms_for(term: &str) -> &'static [&'static str] {
    SYNONYMS
        .iter()
        .find(|(word, _)| *word == term)
        .map(|(_, related)| *related)
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct QueryExpander {
    strategy: QueryExpansion,
    max_expansions: usize,
}

impl QueryExpander {
    pub fn new(strategy: QueryExpansion, max_expansions: usize) -> Self {
        Self {
            strategy,
            max_expansions,
        }
    }

    pub fn strategy(&self) -> QueryExpansion {
        self.strategy
    }

    /// Expanded variants of `query`, excluding the query itself. At most
    /// `max_expansions` are returned.
    pub fn expand(&self, query: &str) -> Vec<String> {
        match self.strategy {
            QueryExpansion::None | QueryExpansion::Embedding => Vec::new(),
            QueryExpansion::Synonym => self.synonym_variants(query),
        }
    }

    /// Each variant replaces exactly one query term with one synonym.
    fn synonym_variants(&self, query: &str) -> Vec<String> {
        if self.max_expansions == 0 {
            return Vec::new();
        }
        let terms = tokenize(query);
        let mut variants: Vec<String> = Vec::new();

        for (position, term) in terms.iter().enumerate() {
            for synonym in synonyms_for(term) {
                if terms.iter().any(|t| t == synonym) {
                    continue;
                }
                let mut replaced = terms.clone();
                replaced[position] = (*synonym).to_string();
                let variant = replaced.join(" ");
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
                if variants.len() >= self.max_expansions {
                    return variants;
                }
            }
        }
        variants
    }
}
