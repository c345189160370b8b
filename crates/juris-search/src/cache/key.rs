//! Deterministic cache keys.
//!
//! A key is a pure function of (normalized query, filters, pagination):
//! equal inputs always hash to the same key, and any differing input
//! changes the key with overwhelming probability.

use unicode_normalization::UnicodeNormalization;

use crate::types::SearchQuery;

/// Casefold, NFC-normalize and collapse whitespace so trivially different
/// spellings of the same query share a cache entry.
pub fn normalize_query_text(query: &str) -> String {
    query
        .nfc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the cache key for a search request.
///
/// Filters are serialized through their canonical serde representation;
/// field order is fixed by the struct definition, so the serialization is
/// deterministic. Sort mode participates because it changes the payload.
pub fn cache_key(query: &SearchQuery) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalize_query_text(&query.query).as_bytes());
    hasher.update(b"|");
    if let Some(filters) = &query.filters {
        // Canonicalize list order so {a,b} and {b,a} hit the same entry.
        let mut canonical = filters.clone();
        canonical.categories.sort();
        canonical.jurisdictions.sort();
        canonical.tags.sort();
        let encoded = serde_json::to_string(&canonical).unwrap_or_default();
        hasher.update(encoded.as_bytes());
    }
    hasher.update(b"|");
    hasher.update(&(query.limit as u64).to_le_bytes());
    hasher.update(&(query.offset as u64).to_le_bytes());
    hasher.update(format!("{:?}", query.sort_by).as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchFilters, SearchQuery};

    #[test]
    fn equal_inputs_share_a_key() {
        let a = SearchQuery::new("Ley 100 de 1993").with_page(10, 0);
        let b = SearchQuery::new("ley  100 de 1993").with_page(10, 0);
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn filter_order_is_canonical() {
        let mut fa = SearchFilters::default();
        fa.categories = vec!["laboral".into(), "tributario".into()];
        let mut fb = SearchFilters::default();
        fb.categories = vec!["tributario".into(), "laboral".into()];

        let a = SearchQuery::new("pensiones").with_filters(fa);
        let b = SearchQuery::new("pensiones").with_filters(fb);
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn pagination_changes_the_key() {
        let a = SearchQuery::new("tutela").with_page(10, 0);
        let b = SearchQuery::new("tutela").with_page(10, 10);
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn different_queries_differ() {
        let a = SearchQuery::new("decreto 1072");
        let b = SearchQuery::new("decreto 1073");
        assert_ne!(cache_key(&a), cache_key(&b));
    }
}
