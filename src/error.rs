//! Error types for the sync layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::sync::{BackendError, GuardedCheck};

// == Sync Error Enum ==
/// Unified error type for cache, queue and coordinator operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Document does not exist at the source of truth
    #[error("Not found: {0}")]
    NotFound(String),

    /// A read missed the cache while connectivity is down
    #[error("Offline: {0} is not cached")]
    Offline(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The backend rejected or failed the operation
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A guarded check failed under a fail-closed policy
    #[error("{check} check failed: {reason}")]
    CheckFailed { check: GuardedCheck, reason: String },
}

// == IntoResponse Implementation ==
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Offline(_) => StatusCode::SERVICE_UNAVAILABLE,
            SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SyncError::Backend(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
            SyncError::Backend(BackendError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::Backend(BackendError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            SyncError::CheckFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the sync layer.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (SyncError::NotFound("users/a".into()), StatusCode::NOT_FOUND),
            (SyncError::Offline("users/a".into()), StatusCode::SERVICE_UNAVAILABLE),
            (SyncError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (
                SyncError::Backend(BackendError::Unavailable("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SyncError::Backend(BackendError::Rejected("rules".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SyncError::CheckFailed {
                    check: GuardedCheck::ContentModeration,
                    reason: "timeout".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = SyncError::Offline("posts/p1".into()).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let message = json["error"].as_str().unwrap();
        assert!(message.contains("posts/p1"));
    }
}
