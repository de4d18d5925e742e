//! Community Sync - client-side caching and offline sync layer
//!
//! TTL cache with per-partition LRU bounds, an offline action queue replayed
//! on reconnect, and a coordinator tying both to a connectivity signal.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod sync;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{Result, SyncError};
pub use sync::{SyncCoordinator, SyncEvent, SyncPhase, WriteOutcome};
pub use tasks::spawn_cleanup_task;
