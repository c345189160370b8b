use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Sort modes accepted at the query boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Relevance,
    Date,
    Popularity,
    Authority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<chrono::NaiveDate>,
    pub end: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub categories: Vec<String>,
    pub jurisdictions: Vec<String>,
    pub tags: Vec<String>,
    pub date_range: Option<DateRange>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.jurisdictions.is_empty()
            && self.tags.is_empty()
            && self.date_range.is_none()
    }
}

/// A submitted search request. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub filters: Option<SearchFilters>,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortMode,
    pub user_id: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: None,
            limit: 10,
            offset: 0,
            sort_by: SortMode::Relevance,
            user_id: None,
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Entity extracted from the natural-language query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEntity {
    pub entity_type: String,
    pub value: String,
}

/// Filter fields the generative service may fill in.
/// Mirrors the output contract named in the transformation prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlpFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub norm_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<NlpDateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geographic_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuing_entities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlpDateRange {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_type: Option<String>,
}

/// Result of transforming a raw query into structured search inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTransformation {
    pub intent: String,
    pub entities: Vec<QueryEntity>,
    pub filters: NlpFilters,
    pub refined_query: String,
}

impl QueryTransformation {
    /// The fallback produced when the generative service is unavailable
    /// or returns unusable output.
    pub fn degraded(original_query: &str) -> Self {
        Self {
            intent: "search".to_string(),
            entities: Vec::new(),
            filters: NlpFilters::default(),
            refined_query: original_query.to_string(),
        }
    }
}

/// A candidate document as returned by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub jurisdiction: Option<String>,
    pub legal_hierarchy: Option<String>,
    pub tags: Vec<String>,
    pub authority_score: f32,
    pub click_through_rate: f32,
    pub average_rating: Option<f32>,
    pub publication_date: Option<chrono::NaiveDate>,
    pub metadata: HashMap<String, String>,
}

/// Per-candidate ranking breakdown. Every component is finite and the
/// signal weights sum to 1 before the hierarchy multiplier is applied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RankingSignals {
    pub semantic: f32,
    pub authority: f32,
    pub feedback: f32,
    pub recency: f32,
    pub hierarchy_boost: f32,
    pub final_score: f32,
}

/// One ranked result in the response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub category: Option<String>,
    pub relevance_score: f32,
    pub metadata: HashMap<String, String>,
    pub highlights: Vec<String>,
}

/// NLP metadata attached to a response for explainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpProcessing {
    pub intent: String,
    pub entities: Vec<QueryEntity>,
    pub refined_query: String,
}

impl From<&QueryTransformation> for NlpProcessing {
    fn from(t: &QueryTransformation) -> Self {
        Self {
            intent: t.intent.clone(),
            entities: t.entities.clone(),
            refined_query: t.refined_query.clone(),
        }
    }
}

/// The response contract returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub nlp: Option<NlpProcessing>,
    pub cache_hit: bool,
    pub cache_tier: Option<crate::cache::CacheTier>,
    pub response_time_ms: u64,
}
