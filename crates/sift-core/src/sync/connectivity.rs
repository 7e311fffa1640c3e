//! Connectivity monitor
//!
//! A cloneable handle over the platform's best-effort reachability signal.
//! A positive reading does not guarantee the gateway is reachable, only that
//! the transport is up; the engine treats it as a gate, not a promise.

use std::sync::Arc;

use tokio::sync::watch;

/// Current connectivity state plus transition notifications.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial state.
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Point-in-time, non-blocking connectivity check.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Feed a reading from the embedding layer.
    ///
    /// Only actual transitions are broadcast, so rapid duplicate readings do
    /// not wake subscribers.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|state| {
            if *state == online {
                false
            } else {
                *state = online;
                true
            }
        });
        if changed {
            tracing::debug!(
                "connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
    }

    /// Subscribe to transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    /// Starts offline; the embedding layer reports the first real reading.
    fn default() -> Self {
        Self::new(false)
    }
}
