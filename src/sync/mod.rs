//! Sync Module
//!
//! Connectivity-aware coordination between the cache, the offline queue and
//! the backend capability.
//!
//! # Components
//! - `backend`: capability trait the coordinator writes through
//! - `memory_backend`: in-process backend with failure injection
//! - `connectivity`: online/offline signal
//! - `events`: notification bus and subscription disposers
//! - `degraded`: fail-open / fail-closed policies for guarded checks
//! - `coordinator`: the session object the UI layer talks to

mod backend;
mod connectivity;
mod coordinator;
mod degraded;
mod events;
mod memory_backend;

pub use backend::{apply_mutation, Backend, BackendError, WriteMode};
pub use connectivity::{wait_until_offline, ConnectivityMonitor};
pub use coordinator::{SyncContext, SyncCoordinator, SyncPhase, WriteOutcome};
pub use degraded::{
    run_guarded, CheckOutcome, ContentModerator, DegradedModes, FailurePolicy, GuardedCheck,
};
pub use events::{EventBus, Subscription, SyncEvent};
pub use memory_backend::{AppliedOp, MemoryBackend};
