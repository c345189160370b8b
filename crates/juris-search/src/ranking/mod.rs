//! Multi-signal reranking of search candidates.
//!
//! Four normalized signals (semantic similarity, authority, user feedback,
//! recency) are combined with configurable weights, then scaled by a
//! hierarchy boost derived from the document's place in the legal order.
//! When the embedding service is slow or unavailable the semantic signal
//! falls back to synthetic scores that preserve the store's ordering, so a
//! reranked response is always produced.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RankingConfig;
use crate::types::{RankingSignals, StoredDocument};

/// Embedding collaborator. One call embeds the query and every candidate
/// in a single batch; the result must be index-aligned with the input.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Named weight presets callers can select per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingProfile {
    Recent,
    Authoritative,
    Popular,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub semantic: f32,
    pub authority: f32,
    pub feedback: f32,
    pub recency: f32,
}

impl RankingWeights {
    pub fn from_config(config: &RankingConfig) -> Self {
        Self {
            semantic: config.semantic_weight,
            authority: config.authority_weight,
            feedback: config.feedback_weight,
            recency: config.recency_weight,
        }
    }

    /// Apply a profile: the boosted signal gets a fixed weight and the
    /// remaining three are rescaled proportionally so the total stays 1.
    pub fn with_profile(self, profile: RankingProfile) -> Self {
        match profile {
            RankingProfile::Recent => self.boost_recency(0.4),
            RankingProfile::Authoritative => self.boost_authority(0.5),
            RankingProfile::Popular => self.boost_feedback(0.4),
        }
    }

    fn boost_recency(self, weight: f32) -> Self {
        let rest = self.semantic + self.authority + self.feedback;
        let (scale, fill) = rescale(weight, rest);
        Self {
            semantic: self.semantic * scale + fill,
            authority: self.authority * scale + fill,
            feedback: self.feedback * scale + fill,
            recency: weight,
        }
    }

    fn boost_authority(self, weight: f32) -> Self {
        let rest = self.semantic + self.feedback + self.recency;
        let (scale, fill) = rescale(weight, rest);
        Self {
            semantic: self.semantic * scale + fill,
            authority: weight,
            feedback: self.feedback * scale + fill,
            recency: self.recency * scale + fill,
        }
    }

    fn boost_feedback(self, weight: f32) -> Self {
        let rest = self.semantic + self.authority + self.recency;
        let (scale, fill) = rescale(weight, rest);
        Self {
            semantic: self.semantic * scale + fill,
            authority: self.authority * scale + fill,
            feedback: weight,
            recency: self.recency * scale + fill,
        }
    }
}

/// Rescaling factors for the non-boosted weights: a multiplicative scale
/// when they carry any mass, an even additive share when they are all zero
/// (the remainder has nothing to scale against, so it is split equally).
fn rescale(boosted: f32, rest: f32) -> (f32, f32) {
    if rest == 0.0 {
        (0.0, (1.0 - boosted) / 3.0)
    } else {
        ((1.0 - boosted) / rest, 0.0)
    }
}

/// A candidate with its score breakdown, after reranking.
#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub document: StoredDocument,
    pub signals: RankingSignals,
}

pub struct Reranker {
    embeddings: Arc<dyn EmbeddingService>,
    config: RankingConfig,
}

impl Reranker {
    pub fn new(embeddings: Arc<dyn EmbeddingService>, config: RankingConfig) -> Self {
        Self { embeddings, config }
    }

    /// Rerank candidates for a query, highest final score first. The sort
    /// is stable, so ties keep the store's order.
    pub async fn rerank(
        &self,
        query: &str,
        documents: Vec<StoredDocument>,
        profile: Option<RankingProfile>,
    ) -> Vec<RankedDocument> {
        if documents.is_empty() {
            return Vec::new();
        }

        let mut weights = RankingWeights::from_config(&self.config);
        if let Some(profile) = profile {
            weights = weights.with_profile(profile);
        }

        let semantic_scores = self.semantic_scores(query, &documents).await;
        let today = chrono::Utc::now().date_naive();

        let mut ranked: Vec<RankedDocument> = documents
            .into_iter()
            .zip(semantic_scores)
            .map(|(document, semantic)| {
                let authority =
                    (document.authority_score / self.config.max_expected_authority).clamp(0.0, 1.0);
                let feedback =
                    feedback_score(document.click_through_rate, document.average_rating);
                let recency = recency_score(
                    document.publication_date,
                    today,
                    self.config.recency_decay_rate,
                );
                let hierarchy_boost = hierarchy_boost(document.legal_hierarchy.as_deref());

                let weighted = weights.semantic * semantic
                    + weights.authority * authority
                    + weights.feedback * feedback
                    + weights.recency * recency;
                let signals = RankingSignals {
                    semantic,
                    authority,
                    feedback,
                    recency,
                    hierarchy_boost,
                    final_score: weighted * hierarchy_boost,
                };
                RankedDocument { document, signals }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.signals
                .final_score
                .partial_cmp(&a.signals.final_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }

    /// Semantic similarity per candidate, or the synthetic fallback when
    /// embeddings are not available in time.
    async fn semantic_scores(&self, query: &str, documents: &[StoredDocument]) -> Vec<f32> {
        let mut texts = Vec::with_capacity(documents.len() + 1);
        texts.push(query.to_string());
        texts.extend(documents.iter().map(embedding_text));

        let timeout = Duration::from_secs(self.config.embedding_timeout_secs);
        let vectors = match tokio::time::timeout(timeout, self.embeddings.embed(&texts)).await {
            Ok(Ok(vectors)) if vectors.len() == texts.len() => vectors,
            Ok(Ok(vectors)) => {
                tracing::warn!(
                    expected = texts.len(),
                    got = vectors.len(),
                    "embedding batch size mismatch, using synthetic semantic scores"
                );
                return synthetic_scores(documents.len());
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "embedding service failed, using synthetic semantic scores");
                return synthetic_scores(documents.len());
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.embedding_timeout_secs,
                    "embedding service timed out, using synthetic semantic scores"
                );
                return synthetic_scores(documents.len());
            }
        };

        let query_vector = &vectors[0];
        vectors[1..]
            .iter()
            .map(|v| cosine_similarity(query_vector, v))
            .collect()
    }
}

/// What gets embedded per document: the title plus the summary when one
/// exists, otherwise a content prefix.
fn embedding_text(document: &StoredDocument) -> String {
    match &document.summary {
        Some(summary) => format!("{}\n{}", document.title, summary),
        None => {
            let prefix: String = document.content.chars().take(500).collect();
            format!("{}\n{}", document.title, prefix)
        }
    }
}

/// Linearly descending placeholder scores that keep the store's ordering
/// when no real semantic signal exists.
fn synthetic_scores(count: usize) -> Vec<f32> {
    (0..count).map(|i| 1.0 - i as f32 / count as f32).collect()
}

/// Cosine similarity, defined as 0 when either vector has zero norm or the
/// dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Engagement signal: click-through dominates, the star rating (1..=5,
/// mapped onto [0, 1]) fills in the rest. An unrated document only earns
/// the click-through part.
pub fn feedback_score(click_through_rate: f32, average_rating: Option<f32>) -> f32 {
    let ctr = click_through_rate.clamp(0.0, 1.0);
    let rating = average_rating
        .map(|r| ((r - 1.0) / 4.0).clamp(0.0, 1.0))
        .unwrap_or(0.0);
    0.6 * ctr + 0.4 * rating
}

/// Exponential decay over document age in years, floored at 0.1 so old but
/// still-binding norms never vanish. Undated documents score a neutral 0.5.
pub fn recency_score(
    publication_date: Option<chrono::NaiveDate>,
    today: chrono::NaiveDate,
    decay_rate: f32,
) -> f32 {
    let Some(date) = publication_date else {
        return 0.5;
    };
    let age_days = (today - date).num_days().max(0) as f32;
    let age_years = age_days / 365.25;
    (-decay_rate * age_years).exp().max(0.1)
}

/// Boost multiplier by position in the legal hierarchy. Unknown or missing
/// levels stay neutral.
pub fn hierarchy_boost(level: Option<&str>) -> f32 {
    match level {
        Some("CONSTITUCION") => 1.5,
        Some("LEYES_ORGANICAS") | Some("LEYES_ESTATUTARIAS") => 1.3,
        Some("JURISPRUDENCIA_VINCULANTE") => 1.25,
        Some("LEYES_ORDINARIAS") => 1.2,
        Some("DECRETOS") => 1.1,
        Some("RESOLUCIONES") => 0.9,
        Some("ORDENANZAS") => 0.85,
        Some("CONCEPTOS") => 0.8,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn document(title: &str) -> StoredDocument {
        StoredDocument {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: String::new(),
            summary: Some(format!("resumen de {}", title)),
            category: None,
            jurisdiction: None,
            legal_hierarchy: None,
            tags: Vec::new(),
            authority_score: 50.0,
            click_through_rate: 0.2,
            average_rating: Some(3.0),
            publication_date: NaiveDate::from_ymd_opt(2020, 6, 1),
            metadata: HashMap::new(),
        }
    }

    fn config() -> RankingConfig {
        RankingConfig {
            semantic_weight: 0.4,
            authority_weight: 0.3,
            feedback_weight: 0.2,
            recency_weight: 0.1,
            max_expected_authority: 100.0,
            recency_decay_rate: 0.1,
            embedding_timeout_secs: 5,
        }
    }

    /// Returns a fixed vector per input, query first.
    struct ScriptedEmbeddings {
        vectors: Vec<Vec<f32>>,
    }

    #[async_trait]
    impl EmbeddingService for ScriptedEmbeddings {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            assert_eq!(texts.len(), self.vectors.len());
            Ok(self.vectors.clone())
        }
    }

    struct FailingEmbeddings;

    #[async_trait]
    impl EmbeddingService for FailingEmbeddings {
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Err(anyhow::anyhow!("embedding backend unreachable"))
        }
    }

    #[test]
    fn cosine_is_zero_on_zero_norm_and_dim_mismatch() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn feedback_combines_clicks_and_rating() {
        let score = feedback_score(0.5, Some(5.0));
        assert!((score - (0.6 * 0.5 + 0.4 * 1.0)).abs() < 1e-6);
        // Unrated documents only earn the click-through part.
        assert!((feedback_score(0.5, None) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn recency_is_floored_and_neutral_when_undated() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let ancient = NaiveDate::from_ymd_opt(1900, 1, 1);
        assert!((recency_score(ancient, today, 0.1) - 0.1).abs() < 1e-6);
        assert!((recency_score(None, today, 0.1) - 0.5).abs() < 1e-6);
        // Published today decays to ~1.
        assert!(recency_score(Some(today), today, 0.1) > 0.99);
    }

    #[test]
    fn profile_weights_still_sum_to_one() {
        let base = RankingWeights::from_config(&config());
        for profile in [
            RankingProfile::Recent,
            RankingProfile::Authoritative,
            RankingProfile::Popular,
        ] {
            let w = base.with_profile(profile);
            let sum = w.semantic + w.authority + w.feedback + w.recency;
            assert!((sum - 1.0).abs() < 1e-5, "{:?} sums to {}", profile, sum);
        }
        assert!((base.with_profile(RankingProfile::Recent).recency - 0.4).abs() < 1e-6);
        assert!((base.with_profile(RankingProfile::Authoritative).authority - 0.5).abs() < 1e-6);
        assert!((base.with_profile(RankingProfile::Popular).feedback - 0.4).abs() < 1e-6);
    }

    #[test]
    fn profiles_stay_finite_when_other_weights_are_zero() {
        // All mass on the boosted signal already; nothing left to rescale.
        let base = RankingWeights {
            semantic: 0.0,
            authority: 0.0,
            feedback: 0.0,
            recency: 1.0,
        };
        for profile in [
            RankingProfile::Recent,
            RankingProfile::Authoritative,
            RankingProfile::Popular,
        ] {
            let w = base.with_profile(profile);
            for weight in [w.semantic, w.authority, w.feedback, w.recency] {
                assert!(weight.is_finite(), "{:?} produced {}", profile, weight);
            }
            let sum = w.semantic + w.authority + w.feedback + w.recency;
            assert!((sum - 1.0).abs() < 1e-5, "{:?} sums to {}", profile, sum);
        }
    }

    #[tokio::test]
    async fn semantic_similarity_orders_results() {
        let embeddings = Arc::new(ScriptedEmbeddings {
            // Query, then a weak match, then a strong match.
            vectors: vec![vec![1.0, 0.0], vec![0.1, 0.995], vec![0.9, 0.436]],
        });
        let reranker = Reranker::new(embeddings, config());
        let ranked = reranker
            .rerank(
                "tutela",
                vec![document("lejano"), document("cercano")],
                None,
            )
            .await;

        assert_eq!(ranked[0].document.title, "cercano");
        assert!(ranked[0].signals.semantic > ranked[1].signals.semantic);
    }

    #[tokio::test]
    async fn hierarchy_boost_outranks_equal_signals() {
        let embeddings = Arc::new(ScriptedEmbeddings {
            vectors: vec![vec![1.0], vec![1.0], vec![1.0]],
        });
        let mut constitucion = document("constitución");
        constitucion.legal_hierarchy = Some("CONSTITUCION".to_string());
        let mut resolucion = document("resolución");
        resolucion.legal_hierarchy = Some("RESOLUCIONES".to_string());

        let reranker = Reranker::new(embeddings, config());
        let ranked = reranker
            .rerank("derechos", vec![resolucion, constitucion], None)
            .await;

        assert_eq!(ranked[0].document.title, "constitución");
        assert!((ranked[0].signals.hierarchy_boost - 1.5).abs() < 1e-6);
        assert!((ranked[1].signals.hierarchy_boost - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn embedding_failure_falls_back_to_synthetic_scores() {
        let reranker = Reranker::new(Arc::new(FailingEmbeddings), config());
        let ranked = reranker
            .rerank(
                "tutela",
                vec![document("primero"), document("segundo"), document("tercero")],
                None,
            )
            .await;

        // Synthetic scores descend in store order, so the order survives.
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].document.title, "primero");
        assert!(ranked[0].signals.semantic > ranked[1].signals.semantic);
        assert!(ranked[1].signals.semantic > ranked[2].signals.semantic);
    }

    #[tokio::test]
    async fn empty_candidates_short_circuit() {
        let reranker = Reranker::new(Arc::new(FailingEmbeddings), config());
        assert!(reranker.rerank("tutela", Vec::new(), None).await.is_empty());
    }
}
