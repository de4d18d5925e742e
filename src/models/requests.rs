//! Request DTOs for the sync server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::Payload;
use crate::queue::Mutation;

/// How `PUT /cache/:partition/:id` applies its payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    /// Replace the whole document
    #[default]
    Create,
    /// Merge fields into the existing document
    Update,
}

/// Request body for PUT /cache/:partition/:id
#[derive(Debug, Clone, Deserialize)]
pub struct WriteRequest {
    /// Document body or patch
    pub payload: Payload,
    /// Defaults to `create`
    #[serde(default)]
    pub mode: WriteKind,
}

impl WriteRequest {
    pub fn into_mutation(self) -> Mutation {
        match self.mode {
            WriteKind::Create => Mutation::Create {
                payload: self.payload,
            },
            WriteKind::Update => Mutation::Update {
                patch: self.payload,
            },
        }
    }
}

/// Request body for POST /sync/connectivity
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

/// Query string for GET /sync/pending
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingQuery {
    /// Maximum actions listed (default: 50)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Only list actions for this partition
    #[serde(default)]
    pub partition: Option<String>,
}

impl PendingQuery {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}
