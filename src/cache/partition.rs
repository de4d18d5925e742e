//! Partition Module
//!
//! One named group of cached documents, bounded by an LRU policy.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheEntry, LruTracker, Payload};

// == Partition Policy ==
/// Per-partition TTL and size bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPolicy {
    /// TTL applied when `set` is called without one
    pub ttl_ms: u64,
    /// Maximum number of live entries
    pub bound: usize,
}

// == Admission ==
/// What happened to make room for a new entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Expired entries purged to make room
    pub expired: usize,
    /// Id evicted by the LRU bound, if any
    pub evicted: Option<String>,
}

// == Partition ==
#[derive(Debug)]
pub struct Partition {
    name: String,
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    policy: PartitionPolicy,
}

impl Partition {
    pub fn new(name: impl Into<String>, policy: PartitionPolicy) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            lru: LruTracker::new(),
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    // == Lookup ==
    /// Returns the live value for `id`, touching it in LRU order.
    ///
    /// A stale entry is removed and reported as `Lookup::Expired`.
    pub fn lookup(&mut self, id: &str, now_ms: u64) -> Lookup {
        let expired = match self.entries.get(id) {
            None => return Lookup::Absent,
            Some(entry) => entry.is_expired(now_ms),
        };

        if expired {
            self.remove(id);
            return Lookup::Expired;
        }

        self.lru.touch(id);
        match self.entries.get(id) {
            Some(entry) => Lookup::Hit(entry.value.clone()),
            None => Lookup::Absent,
        }
    }

    // == Insert ==
    /// Inserts or overwrites `id`, making room first if the partition is full.
    ///
    /// Returns `None` when the bound is zero and nothing was stored.
    pub fn insert(&mut self, id: &str, value: Payload, now_ms: u64, ttl_ms: u64) -> Option<Admission> {
        if self.policy.bound == 0 {
            return None;
        }

        let mut admission = Admission::default();
        if !self.entries.contains_key(id) && self.entries.len() >= self.policy.bound {
            admission.expired = self.purge_expired(now_ms);

            while self.entries.len() >= self.policy.bound {
                let Some(victim) = self.lru.evict_oldest() else {
                    break;
                };
                self.entries.remove(&victim);
                debug!(partition = %self.name, id = %victim, "evicted least recently used entry");
                admission.evicted = Some(victim);
            }
        }

        self.entries
            .insert(id.to_string(), CacheEntry::new(id, value, now_ms, ttl_ms));
        self.lru.touch(id);
        Some(admission)
    }

    /// Removes `id`; returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        self.lru.remove(id);
        self.entries.remove(id).is_some()
    }

    /// Removes every entry stale at `now_ms`, returning how many went.
    pub fn purge_expired(&mut self, now_ms: u64) -> usize {
        let stale: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now_ms))
            .map(|entry| entry.id.clone())
            .collect();

        for id in &stale {
            self.remove(id);
        }
        stale.len()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entry access for inspection; does not touch LRU order.
    pub fn peek(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.get(id)
    }
}

// == Lookup Result ==
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(Payload),
    Expired,
    Absent,
}
