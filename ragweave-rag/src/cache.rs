//! Two-tier cache
//!
//! L1 is an in-process, fixed-capacity ring per cache type with TTLs;
//! stale entries are skipped on read. L2 is a remote key-value store
//! behind an async trait with a longer TTL. Reads go L1 → L2 (promoting
//! hits) → miss; invalidation cascades along a declared dependency graph.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use ragweave_config::CacheConfig;
use ragweave_core::error::Result;

/// Closed set of cache namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// Retriever search results
    Search,
    /// Synthesized answers keyed by query
    Answer,
    /// Query analyses
    Analysis,
    /// Tool listings and other slow-moving descriptors
    ToolInfo,
}

impl CacheType {
    /// Stable string form used to namespace keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Answer => "answer",
            Self::Analysis => "analysis",
            Self::ToolInfo => "tool_info",
        }
    }

    /// All cache types
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Search, Self::Answer, Self::Analysis, Self::ToolInfo]
    }
}

struct L1Entry {
    value: Value,
    inserted: Instant,
}

/// Fixed-capacity keyed ring: insertion evicts the oldest entry when full
struct RingCache {
    map: HashMap<String, L1Entry>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RingCache {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, key: String, value: Value) {
        if self.map.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }
        self.order.push_back(key.clone());
        self.map.insert(
            key,
            L1Entry {
                value,
                inserted: Instant::now(),
            },
        );
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
    }

    fn get(&mut self, key: &str, ttl: Duration) -> Option<Value> {
        let stale = match self.map.get(key) {
            Some(entry) => entry.inserted.elapsed() > ttl,
            None => return None,
        };
        if stale {
            self.map.remove(key);
            self.order.retain(|k| k != key);
            return None;
        }
        self.map.get(key).map(|e| e.value.clone())
    }

    fn remove(&mut self, key: &str) {
        if self.map.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

/// Remote key-value store contract for the L2 tier
#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// Look up a key
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    /// Store a key with a TTL
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;
    /// Remove a key
    async fn delete(&self, key: &str) -> Result<()>;
    /// Remove every key with the given prefix; returns how many
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}

/// In-process stand-in for a remote key-value store
///
/// Volatile by design, like the store it stands in for.
#[derive(Debug)]
pub struct InMemoryRemoteCache {
    entries: DashMap<String, (Value, Instant, Duration)>,
    max_size: usize,
}

impl InMemoryRemoteCache {
    /// Create a store bounded to `max_size` entries
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_size: max_size.max(1),
        }
    }
}

#[async_trait]
impl RemoteCache for InMemoryRemoteCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(entry) = self.entries.get(key) {
            let (value, inserted, ttl) = entry.value();
            if inserted.elapsed() <= *ttl {
                return Ok(Some(value.clone()));
            }
        }
        self.entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if self.entries.len() >= self.max_size && !self.entries.contains_key(key) {
            // Evict the oldest entry to stay within bounds
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().1)
                .map(|e| e.key().clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries
            .insert(key.to_string(), (value, Instant::now(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        let count = keys.len();
        for key in keys {
            self.entries.remove(&key);
        }
        Ok(count)
    }
}

/// Per-tier hit/miss counters
#[derive(Debug, Default)]
pub struct CacheMetrics {
    l1_hits: AtomicU64,
    l1_misses: AtomicU64,
    l2_hits: AtomicU64,
    l2_misses: AtomicU64,
}

/// Snapshot of the cache counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheMetricsSnapshot {
    /// L1 hits
    pub l1_hits: u64,
    /// L1 misses
    pub l1_misses: u64,
    /// L2 hits
    pub l2_hits: u64,
    /// L2 misses
    pub l2_misses: u64,
}

impl CacheMetrics {
    fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l1_misses: self.l1_misses.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            l2_misses: self.l2_misses.load(Ordering::Relaxed),
        }
    }
}

/// Two-tier read-through cache
pub struct TieredCache {
    l1: Mutex<HashMap<CacheType, RingCache>>,
    l2: Arc<dyn RemoteCache>,
    l1_ttl: Duration,
    l2_ttl: Duration,
    dependents: HashMap<CacheType, Vec<CacheType>>,
    metrics: CacheMetrics,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("l1_ttl", &self.l1_ttl)
            .field("l2_ttl", &self.l2_ttl)
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    /// Create a cache with the default dependency graph: answers depend on
    /// search results, which depend on tool info
    pub fn new(config: &CacheConfig, l2: Arc<dyn RemoteCache>) -> Self {
        let mut dependents = HashMap::new();
        dependents.insert(CacheType::Search, vec![CacheType::Answer]);
        dependents.insert(CacheType::ToolInfo, vec![CacheType::Search]);

        let l1 = CacheType::all()
            .into_iter()
            .map(|t| (t, RingCache::new(config.l1_capacity)))
            .collect();

        Self {
            l1: Mutex::new(l1),
            l2,
            l1_ttl: Duration::from_secs(config.l1_ttl_s),
            l2_ttl: Duration::from_secs(config.l2_ttl_s),
            dependents,
            metrics: CacheMetrics::default(),
        }
    }

    fn namespaced(cache_type: CacheType, key: &str) -> String {
        format!("{}:{key}", cache_type.as_str())
    }

    /// Read through L1 then L2, promoting L2 hits into L1
    pub async fn get(&self, cache_type: CacheType, key: &str) -> Option<Value> {
        if let Some(value) = self
            .l1
            .lock()
            .get_mut(&cache_type)
            .and_then(|ring| ring.get(key, self.l1_ttl))
        {
            self.metrics.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }
        self.metrics.l1_misses.fetch_add(1, Ordering::Relaxed);

        match self.l2.get(&Self::namespaced(cache_type, key)).await {
            Ok(Some(value)) => {
                self.metrics.l2_hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = cache_type.as_str(), key, "promoting L2 hit into L1");
                if let Some(ring) = self.l1.lock().get_mut(&cache_type) {
                    ring.insert(key.to_string(), value.clone());
                }
                Some(value)
            }
            Ok(None) => {
                self.metrics.l2_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.metrics.l2_misses.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "L2 cache read failed");
                None
            }
        }
    }

    /// Write both tiers
    pub async fn set(&self, cache_type: CacheType, key: &str, value: Value) {
        if let Some(ring) = self.l1.lock().get_mut(&cache_type) {
            ring.insert(key.to_string(), value.clone());
        }
        if let Err(e) = self
            .l2
            .set(&Self::namespaced(cache_type, key), value, self.l2_ttl)
            .await
        {
            warn!(error = %e, "L2 cache write failed");
        }
    }

    /// Invalidate a key (or a whole cache type) and cascade to dependents
    ///
    /// Dependent types are cleared wholesale: a changed search result
    /// invalidates every derived answer.
    pub async fn invalidate(&self, cache_type: CacheType, id: Option<&str>) {
        match id {
            Some(id) => {
                if let Some(ring) = self.l1.lock().get_mut(&cache_type) {
                    ring.remove(id);
                }
                if let Err(e) = self.l2.delete(&Self::namespaced(cache_type, id)).await {
                    warn!(error = %e, "L2 cache delete failed");
                }
            }
            None => self.clear_type(cache_type).await,
        }

        // Cascade: walk the dependency graph breadth-first
        let mut queue: VecDeque<CacheType> = self
            .dependents
            .get(&cache_type)
            .cloned()
            .unwrap_or_default()
            .into();
        let mut visited = vec![cache_type];
        while let Some(dependent) = queue.pop_front() {
            if visited.contains(&dependent) {
                continue;
            }
            visited.push(dependent);
            debug!(
                from = cache_type.as_str(),
                to = dependent.as_str(),
                "cascading cache invalidation"
            );
            self.clear_type(dependent).await;
            if let Some(next) = self.dependents.get(&dependent) {
                queue.extend(next.iter().copied());
            }
        }
    }

    async fn clear_type(&self, cache_type: CacheType) {
        if let Some(ring) = self.l1.lock().get_mut(&cache_type) {
            ring.clear();
        }
        let prefix = format!("{}:", cache_type.as_str());
        if let Err(e) = self.l2.delete_prefix(&prefix).await {
            warn!(error = %e, "L2 cache prefix delete failed");
        }
    }

    /// Counter snapshot for the monitor
    #[must_use]
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache_with(l1_ttl_s: u64, l1_capacity: usize) -> TieredCache {
        let config = CacheConfig {
            l1_ttl_s,
            l1_capacity,
            l2_ttl_s: l1_ttl_s.max(1) * 10,
            l2_max_size: 100,
        };
        TieredCache::new(&config, Arc::new(InMemoryRemoteCache::new(100)))
    }

    #[tokio::test]
    async fn test_read_through_nearest_tier() {
        let cache = cache_with(300, 16);
        cache.set(CacheType::Search, "q1", json!(["r1"])).await;

        let value = cache.get(CacheType::Search, "q1").await.unwrap();
        assert_eq!(value, json!(["r1"]));
        let metrics = cache.metrics();
        assert_eq!(metrics.l1_hits, 1);
    }

    #[tokio::test]
    async fn test_l2_hit_promotes_to_l1() {
        let cache = cache_with(300, 16);
        cache.set(CacheType::Search, "q1", json!(["r1"])).await;

        // Drop only L1 (simulate restart of the in-process tier)
        cache.l1.lock().get_mut(&CacheType::Search).unwrap().clear();

        let value = cache.get(CacheType::Search, "q1").await.unwrap();
        assert_eq!(value, json!(["r1"]));
        assert_eq!(cache.metrics().l2_hits, 1);

        // Second read hits L1 after promotion
        cache.get(CacheType::Search, "q1").await.unwrap();
        assert_eq!(cache.metrics().l1_hits, 1);
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let cache = cache_with(300, 16);
        assert!(cache.get(CacheType::Answer, "absent").await.is_none());
        let metrics = cache.metrics();
        assert_eq!(metrics.l1_misses, 1);
        assert_eq!(metrics.l2_misses, 1);
    }

    #[tokio::test]
    async fn test_stale_l1_entries_are_skipped() {
        let cache = cache_with(0, 16);
        cache.set(CacheType::Search, "q1", json!(1)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        // L1 TTL of zero means the entry is stale immediately; the value
        // still comes back from L2 (longer TTL)... unless L2 also expired
        let l1_only = cache
            .l1
            .lock()
            .get_mut(&CacheType::Search)
            .unwrap()
            .get("q1", Duration::from_secs(0));
        assert!(l1_only.is_none());
    }

    #[tokio::test]
    async fn test_ring_capacity_evicts_oldest() {
        let cache = cache_with(300, 2);
        cache.set(CacheType::Search, "a", json!(1)).await;
        cache.set(CacheType::Search, "b", json!(2)).await;
        cache.set(CacheType::Search, "c", json!(3)).await;

        let mut l1 = cache.l1.lock();
        let ring = l1.get_mut(&CacheType::Search).unwrap();
        assert!(ring.get("a", Duration::from_secs(300)).is_none());
        assert!(ring.get("b", Duration::from_secs(300)).is_some());
        assert!(ring.get("c", Duration::from_secs(300)).is_some());
    }

    #[tokio::test]
    async fn test_invalidation_cascades_to_dependents() {
        let cache = cache_with(300, 16);
        cache.set(CacheType::Search, "q1", json!(["r1"])).await;
        cache.set(CacheType::Answer, "q1", json!("answer")).await;

        cache.invalidate(CacheType::Search, Some("q1")).await;

        assert!(cache.get(CacheType::Search, "q1").await.is_none());
        // Answers derive from search results, so they are gone too
        assert!(cache.get(CacheType::Answer, "q1").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidation_does_not_cascade_upward() {
        let cache = cache_with(300, 16);
        cache.set(CacheType::Search, "q1", json!(["r1"])).await;
        cache.set(CacheType::Answer, "q1", json!("answer")).await;

        cache.invalidate(CacheType::Answer, Some("q1")).await;

        assert!(cache.get(CacheType::Answer, "q1").await.is_none());
        assert!(cache.get(CacheType::Search, "q1").await.is_some());
    }

    #[tokio::test]
    async fn test_tool_info_invalidation_clears_search_and_answers() {
        let cache = cache_with(300, 16);
        cache.set(CacheType::ToolInfo, "server", json!(["t"])).await;
        cache.set(CacheType::Search, "q1", json!(["r1"])).await;
        cache.set(CacheType::Answer, "q1", json!("answer")).await;

        cache.invalidate(CacheType::ToolInfo, None).await;

        assert!(cache.get(CacheType::Search, "q1").await.is_none());
        assert!(cache.get(CacheType::Answer, "q1").await.is_none());
    }
}
