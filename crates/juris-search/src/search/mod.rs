//! Filtered full-text retrieval against the document store.
//!
//! The executor owns query construction (filters + full-text disjunction)
//! and highlight extraction; the store behind the `DocumentStore` trait
//! owns indexing and matching. One page of candidates and the total count
//! come from the same predicate, with no locking between them — an
//! approximate total under concurrent writes is acceptable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ExecutorConfig;
use crate::types::{DateRange, SearchFilters, SortMode, StoredDocument};

/// Fields covered by the full-text disjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Title,
    Body,
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextQuery {
    pub terms: Vec<String>,
    pub fields: Vec<TextField>,
}

/// The predicate handed to the document store. Only active documents are
/// ever matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreQuery {
    pub full_text: Option<FullTextQuery>,
    pub categories: Vec<String>,
    pub jurisdictions: Vec<String>,
    pub tags: Vec<String>,
    pub date_range: Option<DateRange>,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortMode,
}

/// One page plus the (approximate) total for the same predicate.
#[derive(Debug, Clone)]
pub struct StorePage {
    pub documents: Vec<StoredDocument>,
    pub total_count: usize,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, query: &StoreQuery) -> anyhow::Result<StorePage>;
}

pub struct SearchExecutor {
    store: Arc<dyn DocumentStore>,
    config: ExecutorConfig,
}

impl SearchExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    /// Run a filtered search for one page of candidates.
    pub async fn execute(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
        sort_by: SortMode,
    ) -> anyhow::Result<StorePage> {
        let store_query = self.build_store_query(query_text, filters, limit, offset, sort_by);
        self.store.query(&store_query).await
    }

    pub fn build_store_query(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
        sort_by: SortMode,
    ) -> StoreQuery {
        let terms = query_terms(query_text);
        let full_text = if terms.is_empty() {
            None
        } else {
            Some(FullTextQuery {
                terms,
                fields: vec![TextField::Title, TextField::Body, TextField::Summary],
            })
        };

        StoreQuery {
            full_text,
            categories: filters.categories.clone(),
            jurisdictions: filters.jurisdictions.clone(),
            tags: filters.tags.clone(),
            date_range: filters.date_range.clone(),
            limit: limit.min(self.config.max_limit),
            offset,
            sort_by,
        }
    }

    /// Up to `highlight_fragments` sentence fragments containing a query
    /// term. The first matching term wins per sentence.
    pub fn highlights(&self, content: &str, query_text: &str) -> Vec<String> {
        let terms = query_terms(query_text);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut fragments = Vec::new();
        for sentence in split_sentences(content) {
            let lower = sentence.to_lowercase();
            if terms.iter().any(|t| lower.contains(t.as_str())) {
                fragments.push(sentence.trim().to_string());
                if fragments.len() >= self.config.highlight_fragments {
                    break;
                }
            }
        }
        fragments
    }
}

/// Lowercased terms of length > 1; single characters match everything and
/// only add noise to the disjunction.
fn query_terms(query_text: &str) -> Vec<String> {
    query_text
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| t.chars().count() > 1)
        .collect()
}

fn split_sentences(content: &str) -> impl Iterator<Item = &str> {
    content
        .split(|c| matches!(c, '.' | '?' | '!' | '\n'))
        .filter(|s| !s.trim().is_empty())
}

/// Shorten a document body to an excerpt for the response payload.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let cut: String = content.chars().take(max_chars).collect();
    // Break at the last word boundary so we never emit a half word.
    match cut.rfind(char::is_whitespace) {
        Some(idx) => format!("{}…", &cut[..idx]),
        None => format!("{}…", cut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchFilters;

    struct CapturingStore;

    #[async_trait]
    impl DocumentStore for CapturingStore {
        async fn query(&self, query: &StoreQuery) -> anyhow::Result<StorePage> {
            // Echo the predicate back through the total so tests can see it.
            Ok(StorePage {
                documents: Vec::new(),
                total_count: query.limit,
            })
        }
    }

    fn executor() -> SearchExecutor {
        SearchExecutor::new(
            Arc::new(CapturingStore),
            ExecutorConfig {
                max_limit: 50,
                highlight_fragments: 3,
            },
        )
    }

    #[test]
    fn full_text_covers_title_body_and_summary() {
        let query = executor().build_store_query(
            "pensión de vejez",
            &SearchFilters::default(),
            10,
            0,
            SortMode::Relevance,
        );
        let full_text = query.full_text.expect("full text present");
        assert_eq!(full_text.terms, vec!["pensión", "de", "vejez"]);
        assert_eq!(
            full_text.fields,
            vec![TextField::Title, TextField::Body, TextField::Summary]
        );
    }

    #[test]
    fn blank_query_builds_filter_only_predicate() {
        let mut filters = SearchFilters::default();
        filters.categories.push("laboral".into());
        let query =
            executor().build_store_query("", &filters, 10, 0, SortMode::Date);
        assert!(query.full_text.is_none());
        assert_eq!(query.categories, vec!["laboral"]);
    }

    #[tokio::test]
    async fn limit_is_clamped_to_the_configured_max() {
        let page = executor()
            .execute("tutela", &SearchFilters::default(), 500, 0, SortMode::Relevance)
            .await
            .unwrap();
        assert_eq!(page.total_count, 50);
    }

    #[test]
    fn highlights_cap_at_three_fragments() {
        let content = "La tutela procede. La tutela es residual. \
                       Sin relación. La tutela exige inmediatez. La tutela caduca.";
        let fragments = executor().highlights(content, "tutela");

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], "La tutela procede");
    }

    #[test]
    fn first_matching_term_wins_per_sentence() {
        let content = "La pensión y la tutela comparten juez.";
        let fragments = executor().highlights(content, "tutela pensión");

        // One fragment for the sentence, not one per term.
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn no_terms_means_no_highlights() {
        let fragments = executor().highlights("Cualquier contenido.", "a 1");
        assert!(fragments.is_empty());
    }

    #[test]
    fn excerpt_breaks_on_word_boundary() {
        let text = "palabra ".repeat(100);
        let short = excerpt(&text, 50);
        assert!(short.chars().count() <= 51);
        assert!(short.ends_with('…'));
        assert!(!short.contains("palabr…"));
    }
}
