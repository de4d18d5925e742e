//! Cache Module
//!
//! Partitioned in-memory cache with TTL expiration and per-partition LRU
//! eviction.

mod entry;
mod lru;
mod partition;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use partition::{Admission, Lookup, Partition, PartitionPolicy};
pub use stats::CacheStats;
pub use store::{validate_key, validate_payload, CacheSettings, TtlCache};

/// Opaque document payload.
pub type Payload = serde_json::Value;

// == Public Constants ==
/// Maximum allowed partition name length in bytes
pub const MAX_PARTITION_LENGTH: usize = 128;

/// Maximum allowed document id length in bytes
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum serialized payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 2 * 1024 * 1024; // 2 MB
