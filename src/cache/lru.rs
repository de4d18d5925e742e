//! LRU Tracker Module
//!
//! Access-order bookkeeping for one partition.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access recency for LRU eviction.
///
/// Every touch stamps the id with a fresh tick. `order` maps tick -> id, so
/// its first entry is always the least recently used id.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Latest tick per tracked id
    ticks: HashMap<String, u64>,
    /// Ids ordered by tick, oldest first
    order: BTreeMap<u64, String>,
    /// Next tick to hand out
    next_tick: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks an id as most recently used, inserting it if new.
    pub fn touch(&mut self, id: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;

        match self.ticks.get_mut(id) {
            Some(previous) => {
                self.order.remove(previous);
                *previous = tick;
            }
            None => {
                self.ticks.insert(id.to_string(), tick);
            }
        }
        self.order.insert(tick, id.to_string());
    }

    // == Remove ==
    /// Stops tracking an id. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) {
        if let Some(tick) = self.ticks.remove(id) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used id.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, id) = self.order.pop_first()?;
        self.ticks.remove(&id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ticks.contains_key(id)
    }

    /// Drops all tracking state.
    pub fn clear(&mut self) {
        self.ticks.clear();
        self.order.clear();
    }
}
