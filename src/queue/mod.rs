//! Queue Module
//!
//! Offline action queue: mutations recorded while disconnected and replayed
//! in submission order once connectivity returns.

mod action;
mod offline_queue;


pub use action::{ActionKind, Mutation, QueuedAction};
pub use offline_queue::{DrainReport, EnqueueOutcome, FailureOutcome, OfflineQueue, QueueSettings};
