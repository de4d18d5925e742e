//! Configuration Module
//!
//! Handles loading sync layer and server configuration from environment variables.

use std::collections::HashMap;
use std::env;

use crate::cache::CacheSettings;
use crate::queue::QueueSettings;
use crate::sync::{DegradedModes, FailurePolicy};

const USER_PROFILE_TTL_MS: u64 = 5 * 60 * 1000;
const POSTS_TTL_MS: u64 = 2 * 60 * 1000;
const MESSAGES_TTL_MS: u64 = 30 * 60 * 1000;

/// Sync layer and server configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// TTL in milliseconds for partitions without an override
    pub cache_ttl_default_ms: u64,
    /// Maximum entries per cache partition
    pub cache_size_bound: usize,
    /// Per-partition TTL overrides in milliseconds
    pub partition_ttls: HashMap<String, u64>,
    /// Maximum pending offline actions
    pub queue_capacity: usize,
    /// Failed replays tolerated before an action is abandoned
    pub max_retry_count: u32,
    /// Initial connectivity state
    pub start_online: bool,
    /// Let writes through when content moderation is unreachable
    pub moderation_fail_open: bool,
    /// Let writes through when encryption preparation fails
    pub encryption_fail_open: bool,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_DEFAULT_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_SIZE_BOUND` - Entries per partition (default: 100)
    /// - `PARTITION_TTLS` - Overrides as `name=ms,...`, merged over the built-in ones
    /// - `QUEUE_CAPACITY` - Pending action limit (default: 5000)
    /// - `MAX_RETRY_COUNT` - Replay attempts before abandoning (default: 5)
    /// - `START_ONLINE` - Initial connectivity (default: true)
    /// - `MODERATION_FAIL_OPEN` / `ENCRYPTION_FAIL_OPEN` - Degraded policies (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut partition_ttls = defaults.partition_ttls;
        if let Ok(raw) = env::var("PARTITION_TTLS") {
            partition_ttls.extend(parse_partition_ttls(&raw));
        }

        Self {
            cache_ttl_default_ms: env_or("CACHE_TTL_DEFAULT_MS", defaults.cache_ttl_default_ms),
            cache_size_bound: env_or("CACHE_SIZE_BOUND", defaults.cache_size_bound),
            partition_ttls,
            queue_capacity: env_or("QUEUE_CAPACITY", defaults.queue_capacity),
            max_retry_count: env_or("MAX_RETRY_COUNT", defaults.max_retry_count),
            start_online: env_or("START_ONLINE", defaults.start_online),
            moderation_fail_open: env_or("MODERATION_FAIL_OPEN", defaults.moderation_fail_open),
            encryption_fail_open: env_or("ENCRYPTION_FAIL_OPEN", defaults.encryption_fail_open),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            default_ttl_ms: self.cache_ttl_default_ms,
            size_bound: self.cache_size_bound,
            partition_ttls: self.partition_ttls.clone(),
        }
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            capacity: self.queue_capacity,
            max_retry_count: self.max_retry_count,
        }
    }

    pub fn degraded_modes(&self) -> DegradedModes {
        DegradedModes {
            moderation: FailurePolicy::from_fail_open(self.moderation_fail_open),
            encryption: FailurePolicy::from_fail_open(self.encryption_fail_open),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let partition_ttls = HashMap::from([
            ("users".to_string(), USER_PROFILE_TTL_MS),
            ("posts".to_string(), POSTS_TTL_MS),
            ("messages".to_string(), MESSAGES_TTL_MS),
        ]);

        Self {
            cache_ttl_default_ms: USER_PROFILE_TTL_MS,
            cache_size_bound: 100,
            partition_ttls,
            queue_capacity: 5000,
            max_retry_count: 5,
            start_online: true,
            moderation_fail_open: true,
            encryption_fail_open: true,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `name=ms,name=ms`. Malformed pairs are skipped.
pub fn parse_partition_ttls(raw: &str) -> HashMap<String, u64> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, ms) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), ms.trim().parse().ok()?))
        })
        .collect()
}
