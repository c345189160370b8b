use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::CacheTier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub cache: CacheConfig,
    pub prompt: PromptConfig,
    pub ranking: RankingConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL in seconds for entries written to (or promoted into) the fast tier.
    pub fast_ttl_secs: u64,
    pub medium_ttl_secs: u64,
    pub slow_ttl_secs: u64,
    /// Tier that receives the initial write after a cache miss.
    /// Promotion alone populates faster tiers.
    pub store_tier: CacheTier,
    pub max_entries_per_tier: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Estimated-token ceiling for the transformation prompt. Above it the
    /// builder drops examples, then context, then hard-truncates.
    pub max_prompt_tokens: usize,
    /// How many few-shot examples to include (capped at the built-in set).
    pub example_count: usize,
    /// Upper bound on the generative call before the degraded fallback kicks in.
    pub generation_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub semantic_weight: f32,
    pub authority_weight: f32,
    pub feedback_weight: f32,
    pub recency_weight: f32,
    /// Raw authority scores are normalized against this expected maximum.
    pub max_expected_authority: f32,
    /// Exponential decay rate per year of document age.
    pub recency_decay_rate: f32,
    pub embedding_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub max_limit: usize,
    pub highlight_fragments: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig {
                fast_ttl_secs: 300,
                medium_ttl_secs: 1_800,
                slow_ttl_secs: 7_200,
                store_tier: CacheTier::Medium,
                max_entries_per_tier: 5_000,
            },
            prompt: PromptConfig {
                max_prompt_tokens: 1_500,
                example_count: 4,
                generation_timeout_secs: 10,
            },
            ranking: RankingConfig {
                semantic_weight: 0.4,
                authority_weight: 0.3,
                feedback_weight: 0.2,
                recency_weight: 0.1,
                max_expected_authority: 100.0,
                recency_decay_rate: 0.1,
                embedding_timeout_secs: 5,
            },
            executor: ExecutorConfig {
                max_limit: 50,
                highlight_fragments: 3,
            },
        }
    }
}

impl SearchConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.max_entries_per_tier == 0 {
            return Err("cache.max_entries_per_tier must be > 0".into());
        }
        if self.prompt.max_prompt_tokens < 100 {
            return Err("prompt.max_prompt_tokens must be >= 100".into());
        }
        if self.executor.max_limit == 0 {
            return Err("executor.max_limit must be > 0".into());
        }
        let weight_sum = self.ranking.semantic_weight
            + self.ranking.authority_weight
            + self.ranking.feedback_weight
            + self.ranking.recency_weight;
        if (weight_sum - 1.0).abs() > 1e-3 {
            return Err(format!(
                "ranking weights must sum to 1.0 (got {:.3})",
                weight_sum
            ));
        }
        if self.ranking.max_expected_authority <= 0.0 {
            return Err("ranking.max_expected_authority must be > 0".into());
        }
        if self.ranking.recency_decay_rate < 0.0 {
            return Err("ranking.recency_decay_rate must be >= 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unbalanced_ranking_weights() {
        let mut config = SearchConfig::default();
        config.ranking.semantic_weight = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.contains("sum to 1.0"));
    }
}
