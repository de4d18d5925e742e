//! Connectivity Signal
//!
//! Online/offline flag shared between the platform signal and the
//! coordinator. Backed by a watch channel so a running replay can await a
//! disconnect.

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self { state }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Records the signal; returns true when the state actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                info!("connectivity restored");
            } else {
                warn!("connection lost, working offline");
            }
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

/// Resolves once `rx` reports offline (immediately if already offline).
pub async fn wait_until_offline(rx: &mut watch::Receiver<bool>) {
    // A closed channel means the monitor is gone; treat that as offline.
    let _ = rx.wait_for(|online| !*online).await;
}
