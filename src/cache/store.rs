//! TTL Cache Module
//!
//! Partitioned key-value cache combining per-partition LRU bounds with TTL
//! expiration. Expired entries are never served: they are purged lazily on
//! access and periodically by the cleanup task.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{
    CacheStats, Lookup, Partition, PartitionPolicy, Payload, MAX_ID_LENGTH, MAX_PARTITION_LENGTH,
    MAX_PAYLOAD_SIZE,
};
use crate::clock::SharedClock;
use crate::error::{Result, SyncError};

// == Cache Settings ==
/// TTL and bound configuration for a [`TtlCache`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// TTL for partitions without an override
    pub default_ttl_ms: u64,
    /// Per-partition size bound
    pub size_bound: usize,
    /// TTL overrides keyed by partition name
    pub partition_ttls: HashMap<String, u64>,
}

impl CacheSettings {
    /// Policy a partition is created with.
    pub fn policy_for(&self, partition: &str) -> PartitionPolicy {
        PartitionPolicy {
            ttl_ms: self
                .partition_ttls
                .get(partition)
                .copied()
                .unwrap_or(self.default_ttl_ms),
            bound: self.size_bound,
        }
    }
}

// == TTL Cache ==
/// Partitioned cache with TTL expiry and LRU eviction.
#[derive(Debug)]
pub struct TtlCache {
    partitions: HashMap<String, Partition>,
    settings: CacheSettings,
    stats: CacheStats,
    clock: SharedClock,
}

impl TtlCache {
    // == Constructor ==
    pub fn new(settings: CacheSettings, clock: SharedClock) -> Self {
        Self {
            partitions: HashMap::new(),
            settings,
            stats: CacheStats::new(),
            clock,
        }
    }

    // == Get ==
    /// Returns the cached value if present and unexpired.
    ///
    /// A stale entry is purged as a side effect and reported as absent.
    pub fn get(&mut self, partition: &str, id: &str) -> Option<Payload> {
        let now = self.clock.now_ms();
        let lookup = match self.partitions.get_mut(partition) {
            Some(part) => part.lookup(id, now),
            None => Lookup::Absent,
        };

        match lookup {
            Lookup::Hit(value) => {
                self.stats.record_hit();
                Some(value)
            }
            Lookup::Expired => {
                debug!(partition, id, "cache entry expired");
                self.stats.record_expirations(1);
                self.stats.record_miss();
                self.drop_if_empty(partition);
                None
            }
            Lookup::Absent => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Inserts or overwrites a value.
    ///
    /// `ttl_ms = None` applies the partition's configured TTL. A new id in a
    /// full partition first purges stale entries, then evicts the least
    /// recently used one. Eviction is silent.
    pub fn set(&mut self, partition: &str, id: &str, value: Payload, ttl_ms: Option<u64>) -> Result<()> {
        validate_key(partition, id)?;
        validate_payload(&value)?;

        let now = self.clock.now_ms();
        let policy = self.settings.policy_for(partition);
        let ttl = ttl_ms.unwrap_or(policy.ttl_ms);

        let part = self
            .partitions
            .entry(partition.to_string())
            .or_insert_with(|| Partition::new(partition, policy));

        if let Some(admission) = part.insert(id, value, now, ttl) {
            self.stats.record_expirations(admission.expired);
            if admission.evicted.is_some() {
                self.stats.record_eviction();
            }
        }
        self.drop_if_empty(partition);
        Ok(())
    }

    // == Invalidate ==
    /// Removes one entry so the next read goes to the source of truth.
    pub fn invalidate(&mut self, partition: &str, id: &str) -> bool {
        let removed = self
            .partitions
            .get_mut(partition)
            .map(|part| part.remove(id))
            .unwrap_or(false);

        if removed {
            debug!(partition, id, "cache entry invalidated");
            self.stats.record_invalidations(1);
            self.drop_if_empty(partition);
        }
        removed
    }

    /// Removes every entry of a partition.
    pub fn invalidate_partition(&mut self, partition: &str) -> usize {
        let removed = self
            .partitions
            .remove(partition)
            .map(|mut part| part.clear())
            .unwrap_or(0);
        self.stats.record_invalidations(removed);
        removed
    }

    // == Purge Expired ==
    /// Removes all expired entries across partitions.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let removed: usize = self
            .partitions
            .values_mut()
            .map(|part| part.purge_expired(now))
            .sum();

        self.partitions.retain(|_, part| !part.is_empty());
        self.stats.record_expirations(removed);
        removed
    }

    /// Empties the cache. Counters are kept.
    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    /// Entries currently held by `partition`, including not-yet-purged stale ones.
    pub fn partition_len(&self, partition: &str) -> usize {
        self.partitions.get(partition).map(Partition::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(Partition::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.len();
        stats.partitions = self.partitions.len();
        stats
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn drop_if_empty(&mut self, partition: &str) {
        if self.partitions.get(partition).is_some_and(Partition::is_empty) {
            self.partitions.remove(partition);
        }
    }
}

// == Validation ==
/// Checks partition and id lengths.
pub fn validate_key(partition: &str, id: &str) -> Result<()> {
    if partition.is_empty() || id.is_empty() {
        return Err(SyncError::InvalidRequest(
            "Partition and id cannot be empty".to_string(),
        ));
    }
    if partition.len() > MAX_PARTITION_LENGTH {
        return Err(SyncError::InvalidRequest(format!(
            "Partition exceeds maximum length of {} bytes",
            MAX_PARTITION_LENGTH
        )));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(SyncError::InvalidRequest(format!(
            "Id exceeds maximum length of {} bytes",
            MAX_ID_LENGTH
        )));
    }
    Ok(())
}

/// Checks the serialized payload size.
pub fn validate_payload(value: &Payload) -> Result<()> {
    let size = serde_json::to_vec(value)
        .map_err(|e| SyncError::InvalidRequest(format!("Unserializable payload: {}", e)))?
        .len();
    if size > MAX_PAYLOAD_SIZE {
        return Err(SyncError::InvalidRequest(format!(
            "Payload exceeds maximum size of {} bytes",
            MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::sync::Arc;

    fn cache_with(bound: usize, default_ttl_ms: u64) -> (TtlCache, ManualClock) {
        let clock = ManualClock::new(0);
        let settings = CacheSettings {
            default_ttl_ms,
            size_bound: bound,
            partition_ttls: HashMap::from([("users".to_string(), 300_000)]),
        };
        (TtlCache::new(settings, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_set_and_get() {
        let (mut cache, _) = cache_with(10, 1_000);

        cache.set("posts", "p1", json!({"title": "Rice"}), None).unwrap();

        assert_eq!(cache.get("posts", "p1"), Some(json!({"title": "Rice"})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_unknown_partition() {
        let (mut cache, _) = cache_with(10, 1_000);
        assert_eq!(cache.get("nowhere", "x"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_ttl_scenario_at_50_and_150_ms() {
        let (mut cache, clock) = cache_with(10, 100);

        cache.set("p", "x", json!("v"), None).unwrap();

        clock.set(50);
        assert_eq!(cache.get("p", "x"), Some(json!("v")));

        clock.set(150);
        assert_eq!(cache.get("p", "x"), None);
        assert_eq!(cache.partition_len("p"), 0);
    }

    #[test]
    fn test_partition_ttl_override() {
        let (mut cache, clock) = cache_with(10, 100);

        cache.set("users", "u1", json!(1), None).unwrap();
        cache.set("posts", "p1", json!(2), None).unwrap();

        clock.advance(1_000);
        assert_eq!(cache.get("users", "u1"), Some(json!(1)));
        assert_eq!(cache.get("posts", "p1"), None);
    }

    #[test]
    fn test_explicit_ttl_wins() {
        let (mut cache, clock) = cache_with(10, 100_000);

        cache.set("posts", "p1", json!(1), Some(10)).unwrap();
        clock.advance(10);

        assert_eq!(cache.get("posts", "p1"), None);
    }

    #[test]
    fn test_lru_eviction_per_partition() {
        let (mut cache, _) = cache_with(2, 1_000);

        cache.set("posts", "a", json!(1), None).unwrap();
        cache.set("posts", "b", json!(2), None).unwrap();
        cache.set("users", "u", json!(3), None).unwrap();
        cache.get("posts", "a");
        cache.set("posts", "c", json!(4), None).unwrap();

        assert_eq!(cache.partition_len("posts"), 2);
        assert_eq!(cache.get("posts", "b"), None);
        assert!(cache.get("posts", "a").is_some());
        assert!(cache.get("users", "u").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_invalidate() {
        let (mut cache, _) = cache_with(10, 1_000);

        cache.set("users", "u1", json!(1), None).unwrap();

        assert!(cache.invalidate("users", "u1"));
        assert!(!cache.invalidate("users", "u1"));
        assert_eq!(cache.get("users", "u1"), None);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_invalidate_partition() {
        let (mut cache, _) = cache_with(10, 1_000);

        cache.set("posts", "a", json!(1), None).unwrap();
        cache.set("posts", "b", json!(2), None).unwrap();
        cache.set("users", "u", json!(3), None).unwrap();

        assert_eq!(cache.invalidate_partition("posts"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let (mut cache, clock) = cache_with(10, 100);

        cache.set("posts", "short", json!(1), Some(10)).unwrap();
        cache.set("posts", "long", json!(2), Some(1_000)).unwrap();
        clock.advance(50);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_stats_counts() {
        let (mut cache, _) = cache_with(10, 1_000);

        cache.set("posts", "a", json!(1), None).unwrap();
        cache.get("posts", "a");
        cache.get("posts", "zzz");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.partitions, 1);
    }

    #[test]
    fn test_validation() {
        let (mut cache, _) = cache_with(10, 1_000);

        let long_id = "x".repeat(MAX_ID_LENGTH + 1);
        assert!(matches!(
            cache.set("posts", &long_id, json!(1), None),
            Err(SyncError::InvalidRequest(_))
        ));
        assert!(matches!(
            cache.set("", "a", json!(1), None),
            Err(SyncError::InvalidRequest(_))
        ));

        let huge = json!("x".repeat(MAX_PAYLOAD_SIZE + 1));
        assert!(matches!(
            cache.set("posts", "a", huge, None),
            Err(SyncError::InvalidRequest(_))
        ));
    }
}
