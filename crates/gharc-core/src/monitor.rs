//! Connection state observer.
//!
//! A `ConnectionMonitor` is created once by the application and shared by
//! `Arc` with whoever reports or watches connectivity. The archive service
//! flips it offline on transport failures and back online on any answer from
//! the remote; listeners hear about changes only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Handle returned by [`ConnectionMonitor::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

pub struct ConnectionMonitor {
    online: AtomicBool,
    next_id: AtomicU64,
    listeners: RwLock<HashMap<ListenerId, Listener>>,
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectionMonitor {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Registers `listener`; it is called with the new state on every change.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        id
    }

    /// Returns true if the listener was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Records the current state and notifies listeners if it changed.
    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return;
        }
        tracing::info!(online, "connection state changed");
        // Snapshot so listeners may (un)register without deadlocking.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(online);
        }
    }
}
