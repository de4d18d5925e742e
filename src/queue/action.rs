//! Queued Action Module
//!
//! Typed mutations recorded while disconnected.

use serde::{Deserialize, Serialize};

use crate::cache::Payload;

// == Mutation ==
/// A write against one document, carrying only what its kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    /// Write a full document, replacing any existing one
    Create { payload: Payload },
    /// Merge fields into an existing document
    Update { patch: Payload },
    /// Remove the document
    Delete,
}

impl Mutation {
    pub fn kind(&self) -> ActionKind {
        match self {
            Mutation::Create { .. } => ActionKind::Create,
            Mutation::Update { .. } => ActionKind::Update,
            Mutation::Delete => ActionKind::Delete,
        }
    }

    /// Body sent to the backend, if the kind has one.
    pub fn body(&self) -> Option<&Payload> {
        match self {
            Mutation::Create { payload } => Some(payload),
            Mutation::Update { patch } => Some(patch),
            Mutation::Delete => None,
        }
    }
}

/// Discriminant of a [`Mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

// == Queued Action ==
/// A pending mutation waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Submission sequence number, unique per queue
    pub seq: u64,
    /// Target partition
    pub partition: String,
    /// Target document id
    pub id: String,
    /// What to apply
    pub mutation: Mutation,
    /// Enqueue timestamp (clock milliseconds)
    pub enqueued_at: u64,
    /// Failed replay attempts so far
    pub retry_count: u32,
}

impl QueuedAction {
    pub fn kind(&self) -> ActionKind {
        self.mutation.kind()
    }
}
