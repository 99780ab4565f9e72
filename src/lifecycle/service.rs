//! Lifecycle Service
//!
//! Owns the canonical `LifecycleState` of one instance and drives the shutdown sequence.
//!
//! ## Responsibilities
//! - **Transitions**: validated against a `TransitionTable`; illegal ones are rejected
//!   before any state change or listener call.
//! - **Notification**: listeners run synchronously, in registration order, on the thread
//!   that fired the event. Transitions are serialized, so every listener observes them in
//!   the same order. Listeners must not fire transitions themselves.
//! - **Shutdown**: runs at most once; concurrent callers wait for the first sequence.

use super::types::{LifecycleState, TransitionTable};
use crate::error::{GridError, Result};
use crate::health::monitor::HealthMonitor;
use crate::instance::node::ClusterNode;
use crate::proxy::listeners::invoke_isolated;
use crate::proxy::registry::ProxyRegistry;
use crate::proxy::types::ListenerId;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;

/// Thread-safe callback invoked for every lifecycle transition.
pub type LifecycleListenerFn = Arc<dyn Fn(LifecycleState) -> anyhow::Result<()> + Send + Sync>;

pub struct LifecycleService {
    table: TransitionTable,
    /// Serializes transitions together with their listener fan-out.
    transition: Mutex<()>,
    state: watch::Sender<LifecycleState>,
    listeners: RwLock<Vec<(ListenerId, LifecycleListenerFn)>>,
    shutdown_once: OnceCell<()>,
    registry: Arc<ProxyRegistry>,
    health: Arc<HealthMonitor>,
    node: Arc<dyn ClusterNode>,
}

impl LifecycleService {
    /// Creates the service in `Starting`.
    pub fn new(
        table: TransitionTable,
        registry: Arc<ProxyRegistry>,
        health: Arc<HealthMonitor>,
        node: Arc<dyn ClusterNode>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(LifecycleState::Starting);

        Arc::new(Self {
            table,
            transition: Mutex::new(()),
            state,
            listeners: RwLock::new(Vec::new()),
            shutdown_once: OnceCell::new(),
            registry,
            health,
            node,
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Receiver that observes every state published after subscription.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn transition_table(&self) -> &TransitionTable {
        &self.table
    }

    /// Moves to `next` and notifies every listener before returning.
    ///
    /// # Arguments
    /// * `next` - The target state; checked against the transition table.
    ///
    /// # Returns
    /// * `Ok(())` once the state is updated and every listener has been called.
    /// * `Err(IllegalTransition)` if the table forbids the edge. This is a programming
    ///   error: it is logged and leaves the state and listeners untouched.
    pub fn fire_lifecycle_event(&self, next: LifecycleState) -> Result<()> {
        let _guard = self.transition.lock();
        let current = self.state();

        if !self.table.permits(current, next) {
            tracing::error!("Illegal lifecycle transition {} -> {}", current, next);
            return Err(GridError::IllegalTransition {
                from: current,
                to: next,
            });
        }

        self.state.send_replace(next);
        tracing::info!("Lifecycle state: {} -> {}", current, next);

        self.notify(next);
        Ok(())
    }

    /// Delivers the current state to all listeners without changing it.
    ///
    /// Used once at startup so listeners registered before the node starts see `Starting`.
    pub(crate) fn announce_current(&self) {
        let _guard = self.transition.lock();
        self.notify(self.state());
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(LifecycleState) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.listeners.write().push((id.clone(), Arc::new(listener)));

        tracing::debug!("Registered lifecycle listener {}", id);
        id
    }

    pub fn remove_listener(&self, id: &ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| existing != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Shuts the instance down. Idempotent and infallible.
    ///
    /// The first caller runs SHUTTING_DOWN, stops the health monitor, drains every proxy,
    /// stops the cluster node, and finally publishes SHUTDOWN. Concurrent callers wait
    /// for that sequence; later callers return immediately.
    ///
    /// Draining waits for proxy creations that are still running, so a factory that
    /// never completes also keeps shutdown from completing.
    ///
    /// # Returns
    /// Once the state is SHUTDOWN and no proxy is left in the registry.
    pub async fn shutdown(&self) {
        self.shutdown_once
            .get_or_init(|| self.run_shutdown())
            .await;
    }

    /// Starts the shutdown sequence without waiting for it.
    ///
    /// The returned handle completes once the instance has reached SHUTDOWN.
    pub fn begin_shutdown(self: &Arc<Self>) -> JoinHandle<()> {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            lifecycle.shutdown().await;
        })
    }

    async fn run_shutdown(&self) {
        tracing::info!("Shutdown requested in state {}", self.state());

        if let Err(e) = self.fire_lifecycle_event(LifecycleState::ShuttingDown) {
            tracing::error!("Failed to enter shutdown: {}", e);
        }

        self.health.stop();

        let destroyed = self.registry.drain().await;
        tracing::debug!("Drained {} proxies", destroyed);

        self.node.shutdown().await;
        self.registry.listeners().clear();

        if let Err(e) = self.fire_lifecycle_event(LifecycleState::Shutdown) {
            tracing::error!("Failed to complete shutdown: {}", e);
        }
    }

    fn notify(&self, state: LifecycleState) {
        let snapshot: Vec<(ListenerId, LifecycleListenerFn)> = self.listeners.read().clone();

        for (id, listener) in snapshot {
            invoke_isolated(&id, || listener(state));
        }
    }
}
