//! The query resolution pipeline.
//!
//! One entry point, `SearchPipeline::search`, walks a fixed sequence:
//! cache probe, spell check, query transformation, filter merge, store
//! execution, reranking, cache store, usage tracking. Collaborators are
//! injected behind traits so every stage can be swapped or mocked.
//!
//! Degradation is the design center: the only error a caller ever sees is
//! `MalformedInput`. Everything downstream of validation recovers — a
//! failed transformation searches the original query, a failed store
//! yields an empty successful response, cache and telemetry trouble never
//! surface at all.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{cache_key, CacheManager};
use crate::config::SearchConfig;
use crate::error::PipelineError;
use crate::ranking::{RankingProfile, Reranker};
use crate::search::{excerpt, SearchExecutor, StorePage};
use crate::spell::SpellChecker;
use crate::telemetry::{self, QueryHistoryRecord, SuggestionRecord, TelemetrySink};
use crate::transform::QueryTransformer;
use crate::types::{
    DateRange, NlpProcessing, QueryTransformation, SearchFilters, SearchQuery, SearchResponse,
    SearchResult, SortMode,
};

const EXCERPT_CHARS: usize = 240;

pub struct SearchPipeline {
    cache: Arc<CacheManager>,
    spell: Arc<SpellChecker>,
    transformer: Arc<QueryTransformer>,
    executor: Arc<SearchExecutor>,
    reranker: Arc<Reranker>,
    telemetry: Arc<dyn TelemetrySink>,
    config: SearchConfig,
}

impl SearchPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<CacheManager>,
        spell: Arc<SpellChecker>,
        transformer: Arc<QueryTransformer>,
        executor: Arc<SearchExecutor>,
        reranker: Arc<Reranker>,
        telemetry: Arc<dyn TelemetrySink>,
        config: SearchConfig,
    ) -> Self {
        Self {
            cache,
            spell,
            transformer,
            executor,
            reranker,
            telemetry,
            config,
        }
    }

    /// Resolve a search request end to end.
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse, PipelineError> {
        let query = validate(query, self.config.executor.max_limit)?;
        let started = Instant::now();
        let key = cache_key(&query);

        if let Some(hit) = self.cache.get(&key).await {
            match serde_json::from_str::<SearchResponse>(&hit.value) {
                Ok(mut response) => {
                    response.cache_hit = true;
                    response.cache_tier = Some(hit.tier);
                    response.response_time_ms = started.elapsed().as_millis() as u64;
                    self.track(&query, &response);
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "cached payload did not deserialize, recomputing");
                }
            }
        }

        let mut response = self.resolve_miss(&query).await;
        response.response_time_ms = started.elapsed().as_millis() as u64;

        self.store_in_cache(&key, &response);
        self.track(&query, &response);
        Ok(response)
    }

    /// The cache-miss path. Infallible: every stage degrades internally.
    async fn resolve_miss(&self, query: &SearchQuery) -> SearchResponse {
        let spelling = self.spell.check_spelling(&query.query);
        if let Some(suggestion) = self.spell.generate_suggestion(&spelling) {
            telemetry::track_suggestion(
                Arc::clone(&self.telemetry),
                SuggestionRecord {
                    id: uuid::Uuid::new_v4(),
                    user_id: query.user_id.clone(),
                    original_query: spelling.original_query.clone(),
                    suggested_query: suggestion,
                    confidence: spelling.confidence,
                    recorded_at: chrono::Utc::now(),
                },
            );
        }

        let transformation = self.transformer.transform(&spelling.corrected_query).await;
        let user_filters = query.filters.clone().unwrap_or_default();
        let filters = merge_filters(&user_filters, &transformation);

        let page = match self
            .executor
            .execute(
                &transformation.refined_query,
                &filters,
                query.limit,
                query.offset,
                query.sort_by,
            )
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(query = %query.query, error = %e, "store query failed, retrying without NLP filters");
                return self.fallback_search(query, &user_filters, &transformation).await;
            }
        };

        self.build_response(query, &transformation, page).await
    }

    /// Plain search on the original query and the user's own filters. A
    /// store that fails here too produces an empty successful response.
    async fn fallback_search(
        &self,
        query: &SearchQuery,
        user_filters: &SearchFilters,
        transformation: &QueryTransformation,
    ) -> SearchResponse {
        let degraded = QueryTransformation::degraded(&query.query);
        let page = match self
            .executor
            .execute(
                &query.query,
                user_filters,
                query.limit,
                query.offset,
                query.sort_by,
            )
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(query = %query.query, error = %e, "document store unavailable, returning empty result set");
                return SearchResponse {
                    results: Vec::new(),
                    total_count: 0,
                    nlp: Some(NlpProcessing::from(transformation)),
                    cache_hit: false,
                    cache_tier: None,
                    response_time_ms: 0,
                };
            }
        };

        self.build_response(query, &degraded, page).await
    }

    async fn build_response(
        &self,
        query: &SearchQuery,
        transformation: &QueryTransformation,
        page: StorePage,
    ) -> SearchResponse {
        let total_count = page.total_count;
        let ranked = self
            .reranker
            .rerank(
                &transformation.refined_query,
                page.documents,
                profile_for(query.sort_by),
            )
            .await;

        let results = ranked
            .into_iter()
            .map(|r| {
                let highlights = self
                    .executor
                    .highlights(&r.document.content, &transformation.refined_query);
                SearchResult {
                    id: r.document.id,
                    title: r.document.title,
                    excerpt: r
                        .document
                        .summary
                        .unwrap_or_else(|| excerpt(&r.document.content, EXCERPT_CHARS)),
                    category: r.document.category,
                    relevance_score: r.signals.final_score,
                    metadata: r.document.metadata,
                    highlights,
                }
            })
            .collect();

        SearchResponse {
            results,
            total_count,
            nlp: Some(NlpProcessing::from(transformation)),
            cache_hit: false,
            cache_tier: None,
            response_time_ms: 0,
        }
    }

    /// Serialize and store off the request path.
    fn store_in_cache(&self, key: &str, response: &SearchResponse) {
        let payload = match serde_json::to_string(response) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "response failed to serialize for caching");
                return;
            }
        };
        let cache = Arc::clone(&self.cache);
        let key = key.to_string();
        tokio::spawn(async move {
            cache.set(&key, &payload).await;
        });
    }

    fn track(&self, query: &SearchQuery, response: &SearchResponse) {
        let (intent, refined_query) = match &response.nlp {
            Some(nlp) => (nlp.intent.clone(), nlp.refined_query.clone()),
            None => ("search".to_string(), query.query.clone()),
        };
        telemetry::track_query(
            Arc::clone(&self.telemetry),
            QueryHistoryRecord {
                id: uuid::Uuid::new_v4(),
                user_id: query.user_id.clone(),
                query: query.query.clone(),
                refined_query,
                intent,
                result_count: response.results.len(),
                cache_hit: response.cache_hit,
                response_time_ms: response.response_time_ms,
                recorded_at: chrono::Utc::now(),
            },
        );
    }
}

/// Boundary validation. Blank queries are rejected; an oversized page size
/// is clamped rather than rejected.
fn validate(mut query: SearchQuery, max_limit: usize) -> Result<SearchQuery, PipelineError> {
    if query.query.trim().is_empty() {
        return Err(PipelineError::MalformedInput(
            "query must not be empty".into(),
        ));
    }
    if query.limit == 0 {
        return Err(PipelineError::MalformedInput("limit must be > 0".into()));
    }
    query.limit = query.limit.min(max_limit);
    Ok(query)
}

/// Merge user-supplied filters with NLP-derived ones. The user always
/// wins; NLP output only fills fields the user left empty.
fn merge_filters(user: &SearchFilters, transformation: &QueryTransformation) -> SearchFilters {
    let nlp = &transformation.filters;
    let mut merged = user.clone();

    if merged.categories.is_empty() {
        if let Some(norm_type) = &nlp.norm_type {
            merged.categories.push(norm_type.clone());
        }
    }
    if merged.jurisdictions.is_empty() {
        if let Some(jurisdiction) = &nlp.jurisdiction {
            merged.jurisdictions.push(jurisdiction.clone());
        }
    }
    if merged.tags.is_empty() {
        merged.tags.extend(nlp.topics.iter().cloned());
        merged.tags.extend(nlp.keywords.iter().cloned());
    }
    if merged.date_range.is_none() {
        if let Some(range) = &nlp.date_range {
            let start = range.from.as_deref().and_then(parse_date);
            let end = range.to.as_deref().and_then(parse_date);
            if start.is_some() || end.is_some() {
                merged.date_range = Some(DateRange { start, end });
            }
        }
    }
    merged
}

fn parse_date(raw: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn profile_for(sort_by: SortMode) -> Option<RankingProfile> {
    match sort_by {
        SortMode::Relevance => None,
        SortMode::Date => Some(RankingProfile::Recent),
        SortMode::Authority => Some(RankingProfile::Authoritative),
        SortMode::Popularity => Some(RankingProfile::Popular),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NlpDateRange, NlpFilters};

    fn transformation_with(filters: NlpFilters) -> QueryTransformation {
        QueryTransformation {
            intent: "search".into(),
            entities: Vec::new(),
            filters,
            refined_query: "q".into(),
        }
    }

    #[test]
    fn blank_query_is_rejected() {
        let err = validate(SearchQuery::new("   "), 50).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn oversized_limit_is_clamped_not_rejected() {
        let query = validate(SearchQuery::new("tutela").with_page(500, 0), 50).unwrap();
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn user_filters_beat_nlp_filters() {
        let mut user = SearchFilters::default();
        user.categories.push("DECRETO".into());
        let t = transformation_with(NlpFilters {
            norm_type: Some("LEY".into()),
            jurisdiction: Some("nacional".into()),
            ..NlpFilters::default()
        });

        let merged = merge_filters(&user, &t);
        assert_eq!(merged.categories, vec!["DECRETO"]);
        // NLP still fills the fields the user left empty.
        assert_eq!(merged.jurisdictions, vec!["nacional"]);
    }

    #[test]
    fn nlp_topics_and_keywords_become_tags() {
        let t = transformation_with(NlpFilters {
            topics: vec!["pensiones".into()],
            keywords: vec!["régimen pensional".into()],
            ..NlpFilters::default()
        });

        let merged = merge_filters(&SearchFilters::default(), &t);
        assert_eq!(merged.tags, vec!["pensiones", "régimen pensional"]);
    }

    #[test]
    fn nlp_date_range_is_parsed() {
        let t = transformation_with(NlpFilters {
            date_range: Some(NlpDateRange {
                from: Some("2010-01-01".into()),
                to: None,
                date_type: Some("promulgacion".into()),
            }),
            ..NlpFilters::default()
        });

        let merged = merge_filters(&SearchFilters::default(), &t);
        let range = merged.date_range.expect("range set");
        assert_eq!(
            range.start,
            chrono::NaiveDate::from_ymd_opt(2010, 1, 1)
        );
        assert_eq!(range.end, None);
    }

    #[test]
    fn unparseable_nlp_dates_are_dropped() {
        let t = transformation_with(NlpFilters {
            date_range: Some(NlpDateRange {
                from: Some("hace dos años".into()),
                to: None,
                date_type: None,
            }),
            ..NlpFilters::default()
        });

        let merged = merge_filters(&SearchFilters::default(), &t);
        assert!(merged.date_range.is_none());
    }

    #[test]
    fn sort_modes_map_to_ranking_profiles() {
        assert_eq!(profile_for(SortMode::Relevance), None);
        assert_eq!(profile_for(SortMode::Date), Some(RankingProfile::Recent));
        assert_eq!(
            profile_for(SortMode::Authority),
            Some(RankingProfile::Authoritative)
        );
        assert_eq!(
            profile_for(SortMode::Popularity),
            Some(RankingProfile::Popular)
        );
    }
}
