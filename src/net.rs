//! Connectivity signal relay.

use tokio::sync::watch;

/// Process-wide online/offline monitor.
///
/// A pure signal relay: platform glue feeds transitions in through
/// [`ConnectivityMonitor::set_online`], and subscribers are woken exactly
/// once per transition, never on repeated sets of the same value. The
/// monitor starts online — falsely treating a connected client as offline
/// would silently defer every write, so an unavailable platform signal
/// fails open.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor in the online state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx }
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a platform transition. Setting the current state again
    /// notifies nobody.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|cur| {
            if *cur == online {
                false
            } else {
                *cur = online;
                true
            }
        });
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
