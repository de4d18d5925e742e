//! Sync Coordinator
//!
//! Bridges the connectivity signal to the cache and the offline queue.
//!
//! Reads are served from the cache and fall through to the backend while
//! online. Writes go straight to the backend while online and are queued
//! while offline. Reconnecting replays the queue in submission order. Once
//! an action fails, the rest of its partition waits for the next pass so a
//! partition is never replayed out of order.
//!
//! # Locking
//! - `context` (cache + queue) is only held between awaits, never across a
//!   backend call.
//! - `drain_gate`: a replay holds it exclusively; online reads and writes
//!   hold it shared, so they wait behind a running replay instead of
//!   interleaving with it.
//! - Partition locks serialize backend calls per partition. Different
//!   partitions proceed concurrently.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{validate_key, validate_payload, CacheStats, Payload, TtlCache};
use crate::clock::{system_clock, SharedClock};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::queue::{DrainReport, FailureOutcome, Mutation, OfflineQueue, QueuedAction};
use crate::sync::{
    apply_mutation, run_guarded, wait_until_offline, Backend, BackendError, CheckOutcome,
    ConnectivityMonitor, ContentModerator, DegradedModes, EventBus, GuardedCheck, SyncEvent,
};

// == Phase ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Disconnected,
    Connected,
    Syncing,
}

// == Write Outcome ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Confirmed by the backend
    Applied,
    /// Held in the offline queue
    Queued { pending: usize },
}

// == Sync Context ==
/// Session-scoped state owned by one coordinator.
#[derive(Debug)]
pub struct SyncContext {
    pub cache: TtlCache,
    pub queue: OfflineQueue,
}

impl SyncContext {
    pub fn new(config: &Config, clock: SharedClock, events: EventBus) -> Self {
        Self {
            cache: TtlCache::new(config.cache_settings(), clock.clone()),
            queue: OfflineQueue::new(config.queue_settings(), clock, events),
        }
    }
}

// == Partition Locks ==
#[derive(Debug, Default)]
struct PartitionLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PartitionLocks {
    async fn acquire(&self, partition: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Only the map holds an idle lock.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(partition.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    fn clear(&self) {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

struct Inner {
    context: Mutex<SyncContext>,
    backend: Arc<dyn Backend>,
    connectivity: ConnectivityMonitor,
    phase: watch::Sender<SyncPhase>,
    events: EventBus,
    degraded: DegradedModes,
    partition_locks: PartitionLocks,
    drain_gate: RwLock<()>,
}

// == Sync Coordinator ==
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    // == Lifecycle ==
    pub fn init(config: &Config, backend: Arc<dyn Backend>) -> Self {
        Self::init_with_clock(config, backend, system_clock())
    }

    pub fn init_with_clock(config: &Config, backend: Arc<dyn Backend>, clock: SharedClock) -> Self {
        let events = EventBus::new();
        let online = config.start_online;
        let initial = if online {
            SyncPhase::Connected
        } else {
            SyncPhase::Disconnected
        };
        let (phase, _) = watch::channel(initial);

        info!(
            online,
            queue_capacity = config.queue_capacity,
            cache_size_bound = config.cache_size_bound,
            "sync coordinator initialized"
        );

        Self {
            inner: Arc::new(Inner {
                context: Mutex::new(SyncContext::new(config, clock, events.clone())),
                backend,
                connectivity: ConnectivityMonitor::new(online),
                phase,
                events,
                degraded: config.degraded_modes(),
                partition_locks: PartitionLocks::default(),
                drain_gate: RwLock::new(()),
            }),
        }
    }

    /// Ends the session: drops cached data, pending actions and listeners.
    ///
    /// Waits for a running replay to finish first.
    pub async fn teardown(&self) {
        let _gate = self.inner.drain_gate.write().await;
        let dropped = {
            let mut ctx = self.inner.context.lock().await;
            ctx.cache.clear();
            ctx.queue.clear()
        };
        self.inner.events.clear_listeners();
        self.inner.partition_locks.clear();
        self.inner.connectivity.set_online(false);
        self.set_phase(SyncPhase::Disconnected);
        info!(dropped_actions = dropped, "sync session torn down");
    }

    // == Reads ==
    /// Cached value, else the backend's document while online.
    ///
    /// A cache miss while offline is [`SyncError::Offline`]. Failed reads are
    /// returned to the caller and never cached.
    pub async fn get(&self, partition: &str, id: &str) -> Result<Option<Payload>> {
        validate_key(partition, id)?;

        if let Some(value) = self.inner.context.lock().await.cache.get(partition, id) {
            return Ok(Some(value));
        }
        if !self.is_online() {
            return Err(SyncError::Offline(format!("{}/{}", partition, id)));
        }

        let _gate = self.inner.drain_gate.read().await;
        let _partition = self.inner.partition_locks.acquire(partition).await;

        let document = self.inner.backend.read(partition, id).await?;
        if let Some(value) = &document {
            let mut ctx = self.inner.context.lock().await;
            if let Err(e) = ctx.cache.set(partition, id, value.clone(), None) {
                debug!(partition, id, error = %e, "document not cached");
            }
        }
        Ok(document)
    }

    // == Writes ==
    /// Applies a mutation now, or queues it when offline.
    ///
    /// Online failures are returned to the caller and never queued.
    pub async fn submit(&self, partition: &str, id: &str, mutation: Mutation) -> Result<WriteOutcome> {
        validate_key(partition, id)?;
        if let Some(body) = mutation.body() {
            validate_payload(body)?;
        }

        if !self.is_online() {
            return Ok(self.enqueue(partition, id, mutation).await);
        }

        let _gate = self.inner.drain_gate.read().await;
        // Connectivity may have dropped while a replay held the gate.
        if !self.is_online() {
            return Ok(self.enqueue(partition, id, mutation).await);
        }

        let _partition = self.inner.partition_locks.acquire(partition).await;
        apply_mutation(self.inner.backend.as_ref(), partition, id, &mutation).await?;

        self.inner.context.lock().await.cache.invalidate(partition, id);
        debug!(partition, id, kind = %mutation.kind(), "write applied");
        Ok(WriteOutcome::Applied)
    }

    pub async fn create(&self, partition: &str, id: &str, payload: Payload) -> Result<WriteOutcome> {
        self.submit(partition, id, Mutation::Create { payload }).await
    }

    pub async fn update(&self, partition: &str, id: &str, patch: Payload) -> Result<WriteOutcome> {
        self.submit(partition, id, Mutation::Update { patch }).await
    }

    pub async fn delete(&self, partition: &str, id: &str) -> Result<WriteOutcome> {
        self.submit(partition, id, Mutation::Delete).await
    }

    async fn enqueue(&self, partition: &str, id: &str, mutation: Mutation) -> WriteOutcome {
        let mut ctx = self.inner.context.lock().await;
        ctx.queue.enqueue(partition, id, mutation);
        WriteOutcome::Queued {
            pending: ctx.queue.len(),
        }
    }

    // == Cache Control ==
    pub async fn invalidate(&self, partition: &str, id: &str) -> bool {
        self.inner.context.lock().await.cache.invalidate(partition, id)
    }

    pub async fn purge_expired(&self) -> usize {
        self.inner.context.lock().await.cache.purge_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.context.lock().await.cache.stats()
    }

    // == Queue Inspection ==
    pub async fn pending_count(&self) -> usize {
        self.inner.context.lock().await.queue.len()
    }

    /// Up to `limit` oldest pending actions.
    pub async fn pending(&self, limit: usize) -> Vec<QueuedAction> {
        self.inner.context.lock().await.queue.pending(limit)
    }

    /// Pending actions for one partition, oldest first.
    pub async fn pending_for(&self, partition: &str) -> Vec<QueuedAction> {
        self.inner.context.lock().await.queue.pending_for(partition)
    }

    // == Connectivity ==
    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    /// Feeds the connectivity signal.
    ///
    /// Going online replays the queue and returns its report. Going offline
    /// interrupts a running replay. Repeating the current state does nothing.
    pub async fn set_online(&self, online: bool) -> Option<DrainReport> {
        if !self.inner.connectivity.set_online(online) {
            return None;
        }
        self.inner.events.emit(SyncEvent::ConnectivityChanged { online });

        if !online {
            self.set_phase(SyncPhase::Disconnected);
            return None;
        }

        self.set_phase(SyncPhase::Connected);
        Some(self.drain().await)
    }

    /// Replays the queue now. Offline, nothing is attempted and the report
    /// is marked interrupted.
    pub async fn sync_now(&self) -> DrainReport {
        if !self.is_online() {
            debug!("manual sync skipped while offline");
            return DrainReport {
                interrupted: true,
                ..DrainReport::default()
            };
        }
        self.drain().await
    }

    // == Replay ==
    async fn drain(&self) -> DrainReport {
        let _gate = self.inner.drain_gate.write().await;

        let snapshot = self.inner.context.lock().await.queue.snapshot();
        if snapshot.is_empty() {
            if self.is_online() {
                self.set_phase(SyncPhase::Connected);
            }
            return DrainReport::default();
        }

        self.set_phase(SyncPhase::Syncing);
        info!(pending = snapshot.len(), "replaying offline queue");

        let mut offline = self.inner.connectivity.subscribe();
        let mut report = DrainReport::default();
        let mut retained = Vec::new();
        // Partitions with a failure this pass; their later actions wait.
        let mut blocked: HashSet<String> = HashSet::new();

        for action in snapshot {
            if !*offline.borrow() {
                report.interrupted = true;
                break;
            }
            if blocked.contains(&action.partition) {
                debug!(seq = action.seq, partition = %action.partition, "held behind failed action");
                retained.push(action.seq);
                continue;
            }

            let applied = tokio::select! {
                biased;
                result = apply_mutation(
                    self.inner.backend.as_ref(),
                    &action.partition,
                    &action.id,
                    &action.mutation,
                ) => Some(result),
                _ = wait_until_offline(&mut offline) => None,
            };

            let mut ctx = self.inner.context.lock().await;
            match applied {
                // In flight when the connection dropped; stays queued untouched.
                None => {
                    report.interrupted = true;
                    break;
                }
                Some(Ok(())) => {
                    ctx.cache.invalidate(&action.partition, &action.id);
                    if let Some(done) = ctx.queue.acknowledge(action.seq) {
                        report.succeeded.push(done);
                    }
                }
                Some(Err(e)) => {
                    blocked.insert(action.partition.clone());
                    match ctx.queue.record_failure(action.seq, &e.to_string()) {
                        FailureOutcome::Retained(_) => retained.push(action.seq),
                        FailureOutcome::Abandoned(lost) => report.abandoned.push(lost),
                        FailureOutcome::Unknown => {}
                    }
                }
            }
        }

        report.failed = self.inner.context.lock().await.queue.still_queued(&retained);

        if report.interrupted || !self.is_online() {
            report.interrupted = true;
            self.set_phase(SyncPhase::Disconnected);
        } else {
            self.set_phase(SyncPhase::Connected);
        }
        self.announce(&report);
        report
    }

    fn announce(&self, report: &DrainReport) {
        let applied = report.succeeded.len();
        if report.is_clean() {
            info!(applied, "offline queue replayed");
            self.inner.events.emit(SyncEvent::SyncCompleted { applied });
        } else {
            warn!(
                applied,
                failed = report.failed.len(),
                abandoned = report.abandoned.len(),
                interrupted = report.interrupted,
                "offline queue replay incomplete"
            );
            self.inner.events.emit(SyncEvent::SyncFailed {
                applied,
                failed: report.failed.len(),
                abandoned: report.abandoned.len(),
                interrupted: report.interrupted,
            });
        }
    }

    // == Phase ==
    pub fn phase(&self) -> SyncPhase {
        *self.inner.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SyncPhase> {
        self.inner.phase.subscribe()
    }

    fn set_phase(&self, next: SyncPhase) {
        let previous = self.inner.phase.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "sync phase changed");
        }
    }

    // == Notifications ==
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    // == Degraded Modes ==
    pub fn degraded_modes(&self) -> DegradedModes {
        self.inner.degraded
    }

    /// Runs a guarded check under its configured failure policy.
    pub async fn run_guarded<Fut>(&self, check: GuardedCheck, future: Fut) -> Result<CheckOutcome>
    where
        Fut: Future<Output = std::result::Result<std::result::Result<(), String>, BackendError>>,
    {
        let policy = self.inner.degraded.policy_for(check);
        run_guarded(check, policy, &self.inner.events, future).await
    }

    /// Screens `text` with `moderator`; unsafe content is `Rejected`.
    pub async fn moderate(&self, moderator: &dyn ContentModerator, text: &str) -> Result<CheckOutcome> {
        self.run_guarded(GuardedCheck::ContentModeration, async {
            let verdict = if moderator.is_safe(text).await? {
                Ok(())
            } else {
                Err("content flagged by moderation".to_string())
            };
            Ok::<_, BackendError>(verdict)
        })
        .await
    }

    /// Runs key preparation ahead of an encrypted write.
    ///
    /// A failed preparation is `Degraded` under fail-open and
    /// [`SyncError::CheckFailed`] under fail-closed.
    pub async fn prepare_encryption<Fut>(&self, preparation: Fut) -> Result<CheckOutcome>
    where
        Fut: Future<Output = std::result::Result<(), BackendError>>,
    {
        self.run_guarded(GuardedCheck::EncryptionPreparation, async move {
            preparation.await.map(Ok)
        })
        .await
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("online", &self.is_online())
            .field("phase", &self.phase())
            .finish()
    }
}
