//! Sync Events
//!
//! Notifications for the UI layer: sync outcomes, queue overflow, abandoned
//! actions, connectivity changes and degraded checks.
//!
//! Two ways to listen: a broadcast receiver for async consumers (the
//! WebSocket relay) and synchronous callbacks registered with
//! [`EventBus::listen`], each returning a [`Subscription`] disposer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::queue::QueuedAction;
use crate::sync::GuardedCheck;

/// Buffered events per broadcast receiver before it starts lagging.
const EVENT_BUFFER: usize = 1000;

// == Sync Event ==
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The connectivity signal flipped
    ConnectivityChanged { online: bool },
    /// A replay pass applied everything it attempted
    SyncCompleted { applied: usize },
    /// A replay pass left work behind or was interrupted
    SyncFailed {
        applied: usize,
        failed: usize,
        abandoned: usize,
        interrupted: bool,
    },
    /// An action exhausted its retries and was dropped
    SyncAbandoned { action: QueuedAction, reason: String },
    /// The queue was full and its oldest action was dropped
    QueueOverflow { dropped: QueuedAction, capacity: usize },
    /// A guarded check failed and the fail-open policy let it pass
    DegradedMode { check: GuardedCheck, reason: String },
}

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;
type ListenerMap = Mutex<HashMap<u64, Listener>>;

// == Event Bus ==
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
    listeners: Arc<ListenerMap>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            sender,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Delivers an event to every listener and broadcast receiver.
    pub fn emit(&self, event: SyncEvent) {
        // Callbacks run outside the lock so they may dispose themselves.
        let listeners: Vec<Listener> = lock(&self.listeners).values().cloned().collect();
        for listener in listeners {
            listener(&event);
        }
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    /// Async receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Registers a synchronous callback.
    pub fn listen<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, Arc::new(callback));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
            active: AtomicBool::new(true),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Drops every registered callback.
    pub fn clear_listeners(&self) {
        lock(&self.listeners).clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

// == Subscription ==
/// Disposer for a callback registered with [`EventBus::listen`].
///
/// Disposing twice is harmless, and dropping the subscription disposes it.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerMap>,
    active: AtomicBool,
}

impl Subscription {
    pub fn dispose(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A listener that panicked leaves the map usable.
fn lock(listeners: &ListenerMap) -> MutexGuard<'_, HashMap<u64, Listener>> {
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
