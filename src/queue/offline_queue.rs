//! Offline Queue Module
//!
//! FIFO list of pending mutations, held until a replay confirms them.

use std::collections::{HashSet, VecDeque};
use std::fmt::Display;
use std::future::Future;

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::queue::{Mutation, QueuedAction};
use crate::sync::{EventBus, SyncEvent};

// == Queue Settings ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Maximum pending actions; the oldest is dropped beyond this
    pub capacity: usize,
    /// Failed replays tolerated before an action is abandoned
    pub max_retry_count: u32,
}

// == Enqueue Outcome ==
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOutcome {
    /// Sequence number assigned to the new action
    pub seq: u64,
    /// Oldest action dropped to make room, if the queue was full
    pub dropped: Option<QueuedAction>,
}

// == Failure Outcome ==
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Still queued, with its retry count bumped
    Retained(QueuedAction),
    /// Retry budget exhausted; removed from the queue
    Abandoned(QueuedAction),
    /// The seq was no longer queued
    Unknown,
}

// == Drain Report ==
/// Result of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrainReport {
    /// Applied and removed, in replay order
    pub succeeded: Vec<QueuedAction>,
    /// Not applied and still queued, in queue order
    pub failed: Vec<QueuedAction>,
    /// Failed past the retry budget and dropped
    pub abandoned: Vec<QueuedAction>,
    /// Stopped early because connectivity was lost
    pub interrupted: bool,
}

impl DrainReport {
    /// True when everything attempted was applied.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.abandoned.is_empty() && !self.interrupted
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty() && self.abandoned.is_empty()
    }
}

// == Offline Queue ==
#[derive(Debug)]
pub struct OfflineQueue {
    actions: VecDeque<QueuedAction>,
    next_seq: u64,
    settings: QueueSettings,
    clock: SharedClock,
    events: EventBus,
}

impl OfflineQueue {
    // == Constructor ==
    /// Creates an empty queue. A capacity of zero is treated as one.
    pub fn new(settings: QueueSettings, clock: SharedClock, events: EventBus) -> Self {
        let settings = QueueSettings {
            capacity: settings.capacity.max(1),
            ..settings
        };
        Self {
            actions: VecDeque::new(),
            next_seq: 0,
            settings,
            clock,
            events,
        }
    }

    // == Enqueue ==
    /// Appends a mutation, dropping the oldest pending action when full.
    ///
    /// Every drop emits one [`SyncEvent::QueueOverflow`].
    pub fn enqueue(&mut self, partition: &str, id: &str, mutation: Mutation) -> EnqueueOutcome {
        let dropped = if self.actions.len() >= self.settings.capacity {
            self.actions.pop_front()
        } else {
            None
        };

        if let Some(lost) = &dropped {
            warn!(
                partition = %lost.partition,
                id = %lost.id,
                capacity = self.settings.capacity,
                "offline queue full, dropped oldest action"
            );
            self.events.emit(SyncEvent::QueueOverflow {
                dropped: lost.clone(),
                capacity: self.settings.capacity,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.actions.push_back(QueuedAction {
            seq,
            partition: partition.to_string(),
            id: id.to_string(),
            mutation,
            enqueued_at: self.clock.now_ms(),
            retry_count: 0,
        });
        debug!(seq, partition, id, pending = self.actions.len(), "action queued");

        EnqueueOutcome { seq, dropped }
    }

    // == Inspection ==
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Oldest pending action.
    pub fn peek(&self) -> Option<&QueuedAction> {
        self.actions.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedAction> {
        self.actions.iter()
    }

    /// Up to `limit` oldest pending actions.
    pub fn pending(&self, limit: usize) -> Vec<QueuedAction> {
        self.actions.iter().take(limit).cloned().collect()
    }

    /// Pending actions targeting one partition, oldest first.
    pub fn pending_for(&self, partition: &str) -> Vec<QueuedAction> {
        self.actions
            .iter()
            .filter(|action| action.partition == partition)
            .cloned()
            .collect()
    }

    pub fn settings(&self) -> QueueSettings {
        self.settings
    }

    // == Replay Primitives ==
    /// Copy of the queue in FIFO order, taken at the start of a replay.
    pub fn snapshot(&self) -> Vec<QueuedAction> {
        self.actions.iter().cloned().collect()
    }

    /// Removes a confirmed action.
    pub fn acknowledge(&mut self, seq: u64) -> Option<QueuedAction> {
        let index = self.position(seq)?;
        self.actions.remove(index)
    }

    /// Records a failed replay of `seq`, abandoning it once the retry
    /// budget is spent.
    pub fn record_failure(&mut self, seq: u64, reason: &str) -> FailureOutcome {
        let Some(index) = self.position(seq) else {
            return FailureOutcome::Unknown;
        };

        let retries = {
            let action = &mut self.actions[index];
            action.retry_count += 1;
            action.retry_count
        };

        if retries <= self.settings.max_retry_count {
            debug!(seq, retries, reason, "replay failed, action retained");
            return FailureOutcome::Retained(self.actions[index].clone());
        }

        match self.actions.remove(index) {
            Some(action) => {
                warn!(
                    seq,
                    partition = %action.partition,
                    id = %action.id,
                    retries,
                    reason,
                    "retry budget exhausted, action abandoned"
                );
                self.events.emit(SyncEvent::SyncAbandoned {
                    action: action.clone(),
                    reason: reason.to_string(),
                });
                FailureOutcome::Abandoned(action)
            }
            None => FailureOutcome::Unknown,
        }
    }

    /// Drops every pending action.
    pub fn clear(&mut self) -> usize {
        let count = self.actions.len();
        self.actions.clear();
        count
    }

    // == Drain ==
    /// Replays the queue in FIFO order through `apply`.
    ///
    /// Successful actions are removed; failed ones stay in their original
    /// relative order for the next drain. After a failure the rest of that
    /// partition is left queued without being attempted. Draining an empty
    /// queue is a no-op.
    pub async fn drain<F, Fut, E>(&mut self, mut apply: F) -> DrainReport
    where
        F: FnMut(QueuedAction) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let mut report = DrainReport::default();
        let mut retained = Vec::new();
        let mut blocked = HashSet::new();

        for action in self.snapshot() {
            let seq = action.seq;
            if blocked.contains(&action.partition) {
                retained.push(seq);
                continue;
            }
            let partition = action.partition.clone();
            match apply(action).await {
                Ok(()) => {
                    if let Some(done) = self.acknowledge(seq) {
                        report.succeeded.push(done);
                    }
                }
                Err(e) => {
                    blocked.insert(partition);
                    match self.record_failure(seq, &e.to_string()) {
                        FailureOutcome::Retained(_) => retained.push(seq),
                        FailureOutcome::Abandoned(action) => report.abandoned.push(action),
                        FailureOutcome::Unknown => {}
                    }
                }
            }
        }

        report.failed = self.still_queued(&retained);
        report
    }

    /// Queued actions whose seq is in `seqs`, in queue order.
    pub fn still_queued(&self, seqs: &[u64]) -> Vec<QueuedAction> {
        self.actions
            .iter()
            .filter(|action| seqs.contains(&action.seq))
            .cloned()
            .collect()
    }

    fn position(&self, seq: u64) -> Option<usize> {
        self.actions.iter().position(|action| action.seq == seq)
    }
}
