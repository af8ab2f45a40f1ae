//! In-memory query result cache
//!
//! Successful GraphQL responses are kept in a size-bounded LRU map with a
//! per-entry TTL. Every operation, including the optional background sweep,
//! runs inside a single critical section of one mutex, so concurrent requests
//! observe each operation as atomic.

mod key;

use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub use key::CacheKey;

use crate::errors::{CacheConfigError, CacheError};

/// Cache configuration
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses (default: 100). Zero disables caching.
    pub capacity: usize,

    /// How long a response stays fresh when a request does not override it (default: 5m)
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub default_ttl: Duration,

    /// How often expired responses are swept out. Expired responses are always
    /// dropped when looked up, so the sweep is off unless set.
    #[serde(with = "humantime_serde")]
    #[schemars(with = "Option<String>")]
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            default_ttl: Duration::from_secs(300),
            sweep_interval: None,
        }
    }
}

/// A point-in-time view of the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries, including expired entries not yet removed
    pub size: usize,
    pub capacity: usize,
    /// Number of stored entries that are past their TTL
    pub expired_count: usize,
    /// Default TTL in seconds
    pub default_ttl: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.stored_at
            .checked_add(self.ttl)
            .is_none_or(|expires_at| now < expires_at)
    }
}

#[derive(Debug)]
struct Entries {
    lru: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// An LRU cache of GraphQL responses with TTL expiry
#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    default_ttl: Duration,
    entries: Mutex<Entries>,
}

impl QueryCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Result<Self, CacheConfigError> {
        if default_ttl.is_zero() {
            return Err(CacheConfigError::ZeroDefaultTtl);
        }
        Ok(Self {
            capacity,
            default_ttl,
            entries: Mutex::new(Entries {
                lru: LruCache::unbounded(),
                hits: 0,
                misses: 0,
            }),
        })
    }

    /// Build a cache from configuration, validating every setting
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheConfigError> {
        if config.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(CacheConfigError::ZeroSweepInterval);
        }
        Self::new(config.capacity, config.default_ttl)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a fresh response, marking it as most recently used.
    ///
    /// An expired entry is removed and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        let entries = &mut *entries;
        let now = Instant::now();

        match entries.lru.peek(key).map(|entry| entry.is_fresh(now)) {
            Some(true) => {
                entries.hits += 1;
                trace!(%key, "cache hit");
                entries.lru.get(key).map(|entry| entry.value.clone())
            }
            Some(false) => {
                entries.misses += 1;
                entries.lru.pop(key);
                debug!(%key, "cache entry expired");
                None
            }
            None => {
                entries.misses += 1;
                trace!(%key, "cache miss");
                None
            }
        }
    }

    /// Store a response, evicting least recently used entries beyond capacity.
    ///
    /// Storing under an existing key replaces its value, restarts its TTL and
    /// marks it as most recently used.
    pub async fn put(
        &self,
        key: CacheKey,
        value: Value,
        ttl_override: Option<Duration>,
    ) -> Result<(), CacheError> {
        let ttl = match ttl_override {
            Some(ttl) if ttl.is_zero() => return Err(CacheError::InvalidTtl),
            Some(ttl) => ttl,
            None => self.default_ttl,
        };

        let mut entries = self.entries.lock().await;
        entries.lru.put(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
        while entries.lru.len() > self.capacity {
            if let Some((evicted, _)) = entries.lru.pop_lru() {
                debug!(key = %evicted, "evicted least recently used cache entry");
            }
        }
        Ok(())
    }

    /// Remove a single entry, returning whether it was present
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.lock().await.lru.pop(key).is_some()
    }

    /// Remove every entry
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        let cleared = entries.lru.len();
        entries.lru.clear();
        debug!(cleared, "cache cleared");
    }

    /// Inspect the cache without changing entries or their recency
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        CacheStats {
            size: entries.lru.len(),
            capacity: self.capacity,
            expired_count: entries
                .lru
                .iter()
                .filter(|(_, entry)| !entry.is_fresh(now))
                .count(),
            default_ttl: self.default_ttl.as_secs(),
            hits: entries.hits,
            misses: entries.misses,
        }
    }

    /// Remove every expired entry, returning how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let expired: Vec<CacheKey> = entries
            .lru
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.lru.pop(key);
        }
        expired.len()
    }

    /// Periodically sweep expired entries until the token is cancelled
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        debug!("cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let swept = self.sweep_expired().await;
                        if swept > 0 {
                            debug!(swept, "swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{Map, Value, json};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    use super::{CacheConfig, CacheKey, QueryCache};
    use crate::endpoint::Endpoint;
    use crate::errors::{CacheConfigError, CacheError};

    const TTL: Duration = Duration::from_secs(300);

    fn key(query: &str) -> CacheKey {
        CacheKey::new(
            query,
            &Map::new(),
            &Endpoint::parse("https://open.cdash.org").unwrap(),
        )
        .unwrap()
    }

    fn response(name: &str) -> Value {
        json!({ "data": { "project": { "name": name } } })
    }

    #[test]
    fn zero_default_ttl_is_rejected() {
        assert_eq!(
            QueryCache::new(10, Duration::ZERO).unwrap_err(),
            CacheConfigError::ZeroDefaultTtl
        );
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let config = CacheConfig {
            sweep_interval: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(
            QueryCache::from_config(&config).unwrap_err(),
            CacheConfigError::ZeroSweepInterval
        );
    }

    #[test]
    fn default_config_matches_documented_values() {
        let cache = QueryCache::from_config(&CacheConfig::default()).unwrap();
        assert_eq!(cache.capacity(), 100);
        assert_eq!(cache.default_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn config_parses_humantime_durations() {
        let config: CacheConfig = serde_json::from_value(json!({
            "capacity": 5,
            "default_ttl": "90s",
            "sweep_interval": "1m",
        }))
        .unwrap();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.default_ttl, Duration::from_secs(90));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn stores_and_returns_values() {
        let cache = QueryCache::new(10, TTL).unwrap();
        cache.put(key("{ a }"), response("a"), None).await.unwrap();

        assert_eq!(cache.get(&key("{ a }")).await, Some(response("a")));
        assert_eq!(cache.get(&key("{ b }")).await, None);
    }

    #[tokio::test]
    async fn zero_ttl_override_is_rejected() {
        let cache = QueryCache::new(10, TTL).unwrap();
        assert_eq!(
            cache
                .put(key("{ a }"), response("a"), Some(Duration::ZERO))
                .await,
            Err(CacheError::InvalidTtl)
        );
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let cache = QueryCache::new(10, Duration::from_secs(10)).unwrap();
        cache.put(key("{ a }"), response("a"), None).await.unwrap();

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(cache.get(&key("{ a }")).await, Some(response("a")));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&key("{ a }")).await, None);
        assert_eq!(cache.stats().await.size, 0, "expired entry is removed");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_override_applies_to_a_single_entry() {
        let cache = QueryCache::new(10, Duration::from_secs(300)).unwrap();
        cache
            .put(key("{ a }"), response("a"), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        cache.put(key("{ b }"), response("b"), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.get(&key("{ a }")).await, None);
        assert_eq!(cache.get(&key("{ b }")).await, Some(response("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn overwriting_restarts_the_ttl() {
        let cache = QueryCache::new(10, Duration::from_secs(10)).unwrap();
        cache.put(key("{ a }"), response("old"), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put(key("{ a }"), response("new"), None).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get(&key("{ a }")).await, Some(response("new")));
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn inserting_past_capacity_evicts_the_oldest_entry() {
        let cache = QueryCache::new(3, TTL).unwrap();
        for name in ["k1", "k2", "k3", "k4"] {
            cache
                .put(key(&format!("{{ {name} }}")), response(name), None)
                .await
                .unwrap();
        }

        assert_eq!(cache.stats().await.size, 3);
        assert_eq!(cache.get(&key("{ k1 }")).await, None);
        for name in ["k2", "k3", "k4"] {
            assert_eq!(
                cache.get(&key(&format!("{{ {name} }}"))).await,
                Some(response(name))
            );
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn eviction_is_logged() {
        let cache = QueryCache::new(1, TTL).unwrap();
        cache.put(key("{ a }"), response("a"), None).await.unwrap();
        cache.put(key("{ b }"), response("b"), None).await.unwrap();

        assert!(logs_contain("evicted least recently used cache entry"));
    }

    #[tokio::test]
    async fn reads_protect_entries_from_eviction() {
        let cache = QueryCache::new(3, TTL).unwrap();
        for name in ["k1", "k2", "k3"] {
            cache
                .put(key(&format!("{{ {name} }}")), response(name), None)
                .await
                .unwrap();
        }

        assert!(cache.get(&key("{ k1 }")).await.is_some());
        cache.put(key("{ k4 }"), response("k4"), None).await.unwrap();

        assert_eq!(cache.get(&key("{ k2 }")).await, None);
        assert_eq!(cache.get(&key("{ k1 }")).await, Some(response("k1")));
    }

    #[tokio::test]
    async fn overwrites_count_as_access() {
        let cache = QueryCache::new(2, TTL).unwrap();
        cache.put(key("{ k1 }"), response("k1"), None).await.unwrap();
        cache.put(key("{ k2 }"), response("k2"), None).await.unwrap();
        cache.put(key("{ k1 }"), response("k1'"), None).await.unwrap();
        cache.put(key("{ k3 }"), response("k3"), None).await.unwrap();

        assert_eq!(cache.get(&key("{ k2 }")).await, None);
        assert_eq!(cache.get(&key("{ k1 }")).await, Some(response("k1'")));
    }

    #[tokio::test]
    async fn zero_capacity_stores_nothing() {
        let cache = QueryCache::new(0, TTL).unwrap();
        cache.put(key("{ a }"), response("a"), None).await.unwrap();

        assert_eq!(cache.get(&key("{ a }")).await, None);
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = QueryCache::new(10, TTL).unwrap();
        cache.put(key("{ a }"), response("a"), None).await.unwrap();
        cache.put(key("{ b }"), response("b"), None).await.unwrap();

        cache.clear().await;

        assert_eq!(cache.stats().await.size, 0);
        assert_eq!(cache.get(&key("{ a }")).await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_a_single_entry() {
        let cache = QueryCache::new(10, TTL).unwrap();
        cache.put(key("{ a }"), response("a"), None).await.unwrap();
        cache.put(key("{ b }"), response("b"), None).await.unwrap();

        assert!(cache.invalidate(&key("{ a }")).await);
        assert!(!cache.invalidate(&key("{ a }")).await);
        assert_eq!(cache.get(&key("{ b }")).await, Some(response("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_report_expired_entries_without_removing_them() {
        let cache = QueryCache::new(10, Duration::from_secs(10)).unwrap();
        cache
            .put(key("{ a }"), response("a"), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.put(key("{ b }"), response("b"), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        let first = cache.stats().await;
        let second = cache.stats().await;
        assert_eq!(first, second);
        assert_eq!(first.size, 2);
        assert_eq!(first.expired_count, 1);
        assert_eq!(first.capacity, 10);
        assert_eq!(first.default_ttl, 10);
    }

    #[tokio::test]
    async fn stats_do_not_change_recency() {
        let cache = QueryCache::new(2, TTL).unwrap();
        cache.put(key("{ k1 }"), response("k1"), None).await.unwrap();
        cache.put(key("{ k2 }"), response("k2"), None).await.unwrap();

        cache.stats().await;
        cache.put(key("{ k3 }"), response("k3"), None).await.unwrap();

        assert_eq!(cache.get(&key("{ k1 }")).await, None);
    }

    #[tokio::test]
    async fn hits_and_misses_are_counted() {
        let cache = QueryCache::new(10, TTL).unwrap();
        cache.get(&key("{ a }")).await;
        cache.put(key("{ a }"), response("a"), None).await.unwrap();
        cache.get(&key("{ a }")).await;
        cache.get(&key("{ a }")).await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let cache = QueryCache::new(10, Duration::from_secs(60)).unwrap();
        cache
            .put(key("{ a }"), response("a"), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.put(key("{ b }"), response("b"), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.sweep_expired().await, 1);
        let stats = cache.stats().await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.expired_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_until_cancelled() {
        let cache = Arc::new(QueryCache::new(10, Duration::from_secs(60)).unwrap());
        let token = CancellationToken::new();
        let sweeper = cache
            .clone()
            .spawn_sweeper(Duration::from_secs(30), token.clone());

        cache
            .put(key("{ a }"), response("a"), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(cache.stats().await.size, 0);

        token.cancel();
        sweeper.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_keep_the_entry_count_bounded() {
        let cache = Arc::new(QueryCache::new(16, TTL).unwrap());
        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .put(key(&format!("{{ k{i} }}")), response("k"), None)
                        .await
                        .unwrap();
                    cache.get(&key(&format!("{{ k{i} }}"))).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.stats().await.size, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn clear_racing_a_put_leaves_a_consistent_cache() {
        for _ in 0..32 {
            let cache = Arc::new(QueryCache::new(4, TTL).unwrap());
            let put = {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.put(key("{ a }"), response("a"), None).await.unwrap();
                })
            };
            let clear = {
                let cache = cache.clone();
                tokio::spawn(async move { cache.clear().await })
            };
            put.await.unwrap();
            clear.await.unwrap();

            let size = cache.stats().await.size;
            assert!(size == 0 || size == 1);
            if size == 1 {
                assert_eq!(cache.get(&key("{ a }")).await, Some(response("a")));
            }
        }
    }
}
