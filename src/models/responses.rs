//! Response DTOs for the sync server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, Payload};
use crate::queue::{DrainReport, QueuedAction};
use crate::sync::{SyncPhase, WriteOutcome};

/// Response body for GET /cache/:partition/:id
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub partition: String,
    pub id: String,
    pub value: Payload,
}

impl DocumentResponse {
    pub fn new(partition: impl Into<String>, id: impl Into<String>, value: Payload) -> Self {
        Self {
            partition: partition.into(),
            id: id.into(),
            value,
        }
    }
}

/// Response body for PUT and DELETE on /cache/:partition/:id
#[derive(Debug, Clone, Serialize)]
pub struct WriteResponse {
    pub partition: String,
    pub id: String,
    /// `applied`, or `queued` with the pending count
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

impl WriteResponse {
    pub fn new(partition: impl Into<String>, id: impl Into<String>, outcome: WriteOutcome) -> Self {
        Self {
            partition: partition.into(),
            id: id.into(),
            outcome,
        }
    }
}

/// Response body for POST /cache/:partition/:id/invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub partition: String,
    pub id: String,
    /// Whether an entry was cached
    pub invalidated: bool,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Actions waiting for connectivity
    pub pending: usize,
    pub online: bool,
    pub phase: SyncPhase,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, pending: usize, online: bool, phase: SyncPhase) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            pending,
            online,
            phase,
        }
    }
}

/// Response body for GET /sync/pending
#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    /// Total pending, regardless of the listing limit
    pub count: usize,
    pub actions: Vec<QueuedAction>,
}

/// Response body for POST /sync/now and POST /sync/connectivity
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub online: bool,
    pub phase: SyncPhase,
    pub pending: usize,
    /// Present when a replay ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DrainReport>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_response_flattens_outcome() {
        let resp = WriteResponse::new("posts", "p1", WriteOutcome::Queued { pending: 2 });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["pending"], 2);
        assert_eq!(json["id"], "p1");
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let cache = CacheStats {
            hits: 80,
            misses: 20,
            ..CacheStats::default()
        };
        let resp = StatsResponse::new(cache, 3, true, SyncPhase::Connected);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["hits"], 80);
        assert_eq!(json["phase"], "connected");
    }

    #[test]
    fn test_document_response_serialize() {
        let resp = DocumentResponse::new("users", "u1", json!({"name": "Ana"}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("Ana"));
    }

    #[test]
    fn test_sync_response_omits_missing_report() {
        let resp = SyncResponse {
            online: false,
            phase: SyncPhase::Disconnected,
            pending: 0,
            report: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("report").is_none());
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
