//! API Handlers
//!
//! HTTP request handlers exposing the coordinator's UI contract.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::relay::RelayHub;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::{
    ConnectivityRequest, DocumentResponse, HealthResponse, InvalidateResponse, PendingQuery,
    PendingResponse, StatsResponse, SyncResponse, WriteRequest, WriteResponse,
};
use crate::queue::{DrainReport, Mutation};
use crate::sync::{Backend, SyncCoordinator};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session coordinator (cheap to clone)
    pub coordinator: SyncCoordinator,
    /// WebSocket fan-out
    pub relay: RelayHub,
}

impl AppState {
    pub fn new(coordinator: SyncCoordinator) -> Self {
        Self {
            coordinator,
            relay: RelayHub::new(),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config, backend: Arc<dyn Backend>) -> Self {
        Self::new(SyncCoordinator::init(config, backend))
    }

    async fn sync_response(&self, report: Option<DrainReport>) -> SyncResponse {
        SyncResponse {
            online: self.coordinator.is_online(),
            phase: self.coordinator.phase(),
            pending: self.coordinator.pending_count().await,
            report,
        }
    }
}

/// Handler for GET /cache/:partition/:id
///
/// Cached value, else the backend's document while online.
pub async fn get_handler(
    State(state): State<AppState>,
    Path((partition, id)): Path<(String, String)>,
) -> Result<Json<DocumentResponse>> {
    match state.coordinator.get(&partition, &id).await? {
        Some(value) => Ok(Json(DocumentResponse::new(partition, id, value))),
        None => Err(SyncError::NotFound(format!("{}/{}", partition, id))),
    }
}

/// Handler for PUT /cache/:partition/:id
///
/// Applies the write now, or queues it while offline.
pub async fn put_handler(
    State(state): State<AppState>,
    Path((partition, id)): Path<(String, String)>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<WriteResponse>> {
    let outcome = state
        .coordinator
        .submit(&partition, &id, req.into_mutation())
        .await?;

    Ok(Json(WriteResponse::new(partition, id, outcome)))
}

/// Handler for DELETE /cache/:partition/:id
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((partition, id)): Path<(String, String)>,
) -> Result<Json<WriteResponse>> {
    let outcome = state
        .coordinator
        .submit(&partition, &id, Mutation::Delete)
        .await?;

    Ok(Json(WriteResponse::new(partition, id, outcome)))
}

/// Handler for POST /cache/:partition/:id/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path((partition, id)): Path<(String, String)>,
) -> Json<InvalidateResponse> {
    let invalidated = state.coordinator.invalidate(&partition, &id).await;
    Json(InvalidateResponse {
        partition,
        id,
        invalidated,
    })
}

/// Handler for GET /sync/pending
///
/// With `?partition=` the count and listing cover that partition only.
pub async fn pending_handler(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Json<PendingResponse> {
    let limit = query.limit();
    let response = match &query.partition {
        Some(partition) => {
            let mut actions = state.coordinator.pending_for(partition).await;
            let count = actions.len();
            actions.truncate(limit);
            PendingResponse { count, actions }
        }
        None => PendingResponse {
            count: state.coordinator.pending_count().await,
            actions: state.coordinator.pending(limit).await,
        },
    };
    Json(response)
}

/// Handler for POST /sync/connectivity
///
/// Feeds the connectivity signal; going online replays the queue before
/// responding.
pub async fn connectivity_handler(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> Json<SyncResponse> {
    let report = state.coordinator.set_online(req.online).await;
    Json(state.sync_response(report).await)
}

/// Handler for POST /sync/now
pub async fn sync_now_handler(State(state): State<AppState>) -> Result<Json<SyncResponse>> {
    if !state.coordinator.is_online() {
        return Err(SyncError::Offline("sync queue".to_string()));
    }
    let report = state.coordinator.sync_now().await;
    Ok(Json(state.sync_response(Some(report)).await))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let coordinator = &state.coordinator;
    Json(StatsResponse::new(
        coordinator.stats().await,
        coordinator.pending_count().await,
        coordinator.is_online(),
        coordinator.phase(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
