//! Backend Capability
//!
//! The managed document store as seen by the sync layer: read, write and
//! delete by (partition, id). The wire protocol behind it is opaque.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::Payload;
use crate::queue::Mutation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Document does not exist
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The store refused the operation (rules, validation)
    #[error("Rejected: {0}")]
    Rejected(String),
    /// Transport or service failure
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// How a write combines with an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Overwrite the whole document
    Replace,
    /// Merge top-level fields into the existing document
    Merge,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn read(&self, partition: &str, id: &str) -> Result<Option<Payload>, BackendError>;

    async fn write(
        &self,
        partition: &str,
        id: &str,
        payload: Payload,
        mode: WriteMode,
    ) -> Result<(), BackendError>;

    async fn delete(&self, partition: &str, id: &str) -> Result<(), BackendError>;
}

/// Applies one mutation through the backend.
pub async fn apply_mutation(
    backend: &dyn Backend,
    partition: &str,
    id: &str,
    mutation: &Mutation,
) -> Result<(), BackendError> {
    match mutation {
        Mutation::Create { payload } => {
            backend
                .write(partition, id, payload.clone(), WriteMode::Replace)
                .await
        }
        Mutation::Update { patch } => {
            backend
                .write(partition, id, patch.clone(), WriteMode::Merge)
                .await
        }
        Mutation::Delete => backend.delete(partition, id).await,
    }
}
