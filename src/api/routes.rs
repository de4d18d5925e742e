//! API Routes
//!
//! Configures the Axum router with all sync server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    connectivity_handler, delete_handler, get_handler, health_handler, invalidate_handler,
    pending_handler, put_handler, stats_handler, sync_now_handler, AppState,
};
use super::relay::ws_handler;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET|PUT|DELETE /cache/:partition/:id` - Read, write or delete a document
/// - `POST /cache/:partition/:id/invalidate` - Drop a cached entry
/// - `GET /sync/pending` - List pending offline actions
/// - `POST /sync/connectivity` - Feed the connectivity signal
/// - `POST /sync/now` - Replay the offline queue
/// - `GET /stats` - Cache and queue statistics
/// - `GET /health` - Health check endpoint
/// - `GET /ws` - WebSocket relay
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/cache/:partition/:id",
            get(get_handler).put(put_handler).delete(delete_handler),
        )
        .route("/cache/:partition/:id/invalidate", post(invalidate_handler))
        .route("/sync/pending", get(pending_handler))
        .route("/sync/connectivity", post(connectivity_handler))
        .route("/sync/now", post(sync_now_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sync::MemoryBackend;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::from_config(&Config::default(), Arc::new(MemoryBackend::new()));
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cache/posts/p1")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"payload":{"title":"Rice"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cache/posts/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
