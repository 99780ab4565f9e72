//! Distributed Object Listener Hub
//!
//! Fans registry events out to application listeners. Every callback runs inside its
//! own isolation boundary: a listener that returns `Err` or panics is logged and skipped,
//! and the remaining listeners still see the event.

use super::types::{DistributedObjectEvent, ListenerId};

use anyhow::Result;
use dashmap::DashMap;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe callback invoked for every create/destroy event.
pub type ObjectListenerFn = Arc<dyn Fn(&DistributedObjectEvent) -> Result<()> + Send + Sync>;

pub struct ProxyListenerHub {
    listeners: DashMap<ListenerId, ObjectListenerFn>,
    count: AtomicUsize,
}

impl ProxyListenerHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: DashMap::new(),
            count: AtomicUsize::new(0),
        })
    }

    /// Registers a listener for future events. Past events are not replayed.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&DistributedObjectEvent) -> Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.count.fetch_add(1, Ordering::SeqCst);
        self.listeners.insert(id.clone(), Arc::new(listener));

        tracing::debug!("Registered distributed object listener {}", id);
        id
    }

    /// Returns `true` if the registration existed.
    pub fn remove_listener(&self, id: &ListenerId) -> bool {
        let removed = self.listeners.remove(id).is_some();
        if removed {
            self.count.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("Removed distributed object listener {}", id);
        }
        removed
    }

    /// Delivers `event` to every listener registered at the time of the call.
    ///
    /// The registrations are snapshotted before any callback runs, so callbacks may
    /// add or remove listeners without deadlocking the hub.
    pub fn publish(&self, event: &DistributedObjectEvent) {
        let snapshot: Vec<(ListenerId, ObjectListenerFn)> = self
            .listeners
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        tracing::trace!(
            "Publishing {:?} for {} to {} listeners",
            event.kind,
            event.key,
            snapshot.len()
        );

        for (id, listener) in snapshot {
            invoke_isolated(&id, || listener(event));
        }
    }

    /// Lock-free count of registrations.
    pub fn listener_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Drops every registration. Used when the instance shuts down.
    pub fn clear(&self) {
        self.listeners.retain(|_, _| {
            self.count.fetch_sub(1, Ordering::SeqCst);
            false
        });
    }
}

/// Runs one listener callback, logging instead of propagating any failure.
pub(crate) fn invoke_isolated<F>(id: &ListenerId, call: F)
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("Listener {} failed: {}", id, e);
        }
        Err(panic) => {
            tracing::error!("Listener {} panicked: {}", id, panic_message(&*panic));
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
