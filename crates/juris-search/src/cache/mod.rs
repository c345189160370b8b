//! Tiered result cache with fastest-first probing and async promotion.
//!
//! A lookup walks the tiers from fastest to slowest. A hit on a non-fast
//! tier schedules a promotion write into the fast tier with a fresh TTL;
//! the response is never delayed by the promotion. A failing backend is a
//! miss for that tier, logged and skipped — cache trouble must never fail
//! the calling request.

pub mod key;
pub mod memory;

pub use key::{cache_key, normalize_query_text};
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::CacheConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    Fast,
    Medium,
    Slow,
}

impl CacheTier {
    pub fn label(&self) -> &'static str {
        match self {
            CacheTier::Fast => "fast",
            CacheTier::Medium => "medium",
            CacheTier::Slow => "slow",
        }
    }
}

/// Storage behind one cache tier. Implementations must be safe for
/// concurrent use; TTLs are seconds from the time of the write.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
}

/// A successful lookup: the payload plus the tier it was served from.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub value: String,
    pub tier: CacheTier,
}

pub struct CacheManager {
    tiers: Vec<(CacheTier, Arc<dyn CacheBackend>)>,
    config: CacheConfig,
}

impl CacheManager {
    /// Tiers must be supplied fastest-first.
    pub fn new(tiers: Vec<(CacheTier, Arc<dyn CacheBackend>)>, config: CacheConfig) -> Self {
        Self { tiers, config }
    }

    /// Build a manager with three in-memory tiers. Production deployments
    /// swap the medium/slow backends for shared ones behind `CacheBackend`.
    pub fn in_memory(config: CacheConfig) -> Self {
        let max = config.max_entries_per_tier;
        Self::new(
            vec![
                (CacheTier::Fast, Arc::new(MemoryBackend::new(max)) as Arc<dyn CacheBackend>),
                (CacheTier::Medium, Arc::new(MemoryBackend::new(max))),
                (CacheTier::Slow, Arc::new(MemoryBackend::new(max))),
            ],
            config,
        )
    }

    fn ttl_for(&self, tier: CacheTier) -> u64 {
        match tier {
            CacheTier::Fast => self.config.fast_ttl_secs,
            CacheTier::Medium => self.config.medium_ttl_secs,
            CacheTier::Slow => self.config.slow_ttl_secs,
        }
    }

    fn backend_for(&self, tier: CacheTier) -> Option<Arc<dyn CacheBackend>> {
        self.tiers
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, b)| Arc::clone(b))
    }

    /// Probe tiers fastest-to-slowest. A hit below the fast tier triggers
    /// an asynchronous promotion into the fast tier with a fresh TTL.
    pub async fn get(&self, key: &str) -> Option<CacheHit> {
        for (tier, backend) in &self.tiers {
            match backend.get(key).await {
                Ok(Some(value)) => {
                    if *tier != CacheTier::Fast {
                        self.promote(key, &value);
                    }
                    tracing::debug!(key = %key, tier = tier.label(), "cache hit");
                    return Some(CacheHit { value, tier: *tier });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %key, tier = tier.label(), error = %e, "cache backend unavailable, treating as miss");
                }
            }
        }
        None
    }

    /// Write the value to the configured target tier only. Failures are
    /// logged and swallowed.
    pub async fn set(&self, key: &str, value: &str) {
        let tier = self.config.store_tier;
        let Some(backend) = self.backend_for(tier) else {
            tracing::warn!(tier = tier.label(), "no backend registered for store tier");
            return;
        };
        if let Err(e) = backend.set(key, value, self.ttl_for(tier)).await {
            tracing::warn!(key = %key, tier = tier.label(), error = %e, "cache store failed");
        }
    }

    fn promote(&self, key: &str, value: &str) {
        let Some(fast) = self.backend_for(CacheTier::Fast) else {
            return;
        };
        let key = key.to_string();
        let value = value.to_string();
        let ttl = self.ttl_for(CacheTier::Fast);
        tokio::spawn(async move {
            if let Err(e) = fast.set(&key, &value, ttl).await {
                tracing::warn!(key = %key, error = %e, "cache promotion failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("backend down")
        }
        async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> anyhow::Result<()> {
            anyhow::bail!("backend down")
        }
    }

    fn test_config() -> CacheConfig {
        CacheConfig {
            fast_ttl_secs: 60,
            medium_ttl_secs: 120,
            slow_ttl_secs: 240,
            store_tier: CacheTier::Medium,
            max_entries_per_tier: 100,
        }
    }

    #[tokio::test]
    async fn miss_then_store_hits_target_tier_only() {
        let manager = CacheManager::in_memory(test_config());
        assert!(manager.get("k").await.is_none());

        manager.set("k", "payload").await;
        let hit = manager.get("k").await.expect("stored entry");
        assert_eq!(hit.tier, CacheTier::Medium);
    }

    #[tokio::test]
    async fn slow_hit_promotes_to_fast() {
        let mut config = test_config();
        config.store_tier = CacheTier::Slow;
        let manager = CacheManager::in_memory(config);

        manager.set("k", "payload").await;
        let first = manager.get("k").await.expect("slow hit");
        assert_eq!(first.tier, CacheTier::Slow);

        // Promotion is spawned; give it a beat to land.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let second = manager.get("k").await.expect("promoted hit");
        assert_eq!(second.tier, CacheTier::Fast);
    }

    #[tokio::test]
    async fn failing_backend_is_a_miss_not_an_error() {
        let config = test_config();
        let manager = CacheManager::new(
            vec![
                (CacheTier::Fast, Arc::new(FailingBackend) as Arc<dyn CacheBackend>),
                (
                    CacheTier::Medium,
                    Arc::new(MemoryBackend::new(100)) as Arc<dyn CacheBackend>,
                ),
            ],
            config,
        );

        manager.set("k", "payload").await;
        let hit = manager.get("k").await.expect("medium tier still serves");
        assert_eq!(hit.tier, CacheTier::Medium);
    }
}
