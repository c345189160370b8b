//! In-memory cache backend with TTL expiry and a capacity sweep.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::CacheBackend;

#[derive(Debug, Clone)]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
    hit_count: u64,
    last_hit: DateTime<Utc>,
}

/// DashMap-backed cache tier. Expired entries are dropped lazily on read
/// and swept when the map grows past capacity.
pub struct MemoryBackend {
    entries: Arc<DashMap<String, StoredEntry>>,
    max_entries: usize,
}

impl MemoryBackend {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, then least-recently-hit entries until the map
    /// is back under capacity.
    fn sweep(&self) {
        let now = Utc::now();
        self.entries.retain(|_, e| e.expires_at > now);

        if self.entries.len() <= self.max_entries {
            return;
        }
        let overflow = self.entries.len() - self.max_entries;
        let mut by_last_hit: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().last_hit))
            .collect();
        by_last_hit.sort_by_key(|(_, last_hit)| *last_hit);
        for (key, _) in by_last_hit.into_iter().take(overflow) {
            self.entries.remove(&key);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Utc::now();
        let expired = {
            match self.entries.get_mut(key) {
                Some(mut entry) if entry.expires_at > now => {
                    entry.hit_count += 1;
                    entry.last_hit = now;
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let now = Utc::now();
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at: now + Duration::seconds(ttl_secs as i64),
                hit_count: 0,
                last_hit: now,
            },
        );
        if self.entries.len() > self.max_entries {
            self.sweep();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let backend = MemoryBackend::new(10);
        backend.set("k", "v", 60).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let backend = MemoryBackend::new(10);
        backend.set("k", "v", 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sweep_bounds_capacity() {
        let backend = MemoryBackend::new(4);
        for i in 0..10 {
            backend.set(&format!("k{}", i), "v", 60).await.unwrap();
        }
        assert!(backend.len() <= 4);
    }
}
