//! Cache Entry Module
//!
//! Defines a single cached document with its expiry timestamp.

use crate::cache::Payload;

// == Cache Entry ==
/// A cached document owned by one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Document id within the partition
    pub id: String,
    /// The cached payload
    pub value: Payload,
    /// Insertion timestamp (clock milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (clock milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped at `now_ms` that lives for `ttl_ms`.
    pub fn new(id: impl Into<String>, value: Payload, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            id: id.into(),
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// Checks whether the entry is stale at `now_ms`.
    ///
    /// An entry is expired once `now_ms >= expires_at`, so a TTL of zero
    /// produces an entry that is never served.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Remaining lifetime in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}
