//! Proxy Registry
//!
//! Resolves `(service, name)` pairs to the single live proxy for that distributed object,
//! creating it on first access through the factory registered for the service.
//!
//! ## Per-key admission
//! Each key owns an `OnceCell`. Callers racing on one key share that cell, so the factory
//! runs at most once per successful creation and every caller receives the same `Arc`.
//! Callers on different keys never wait for each other: the `DashMap` shard lock is only
//! held long enough to fetch or insert the cell, never across the factory call.
//!
//! ## Draining
//! Every call that may create a proxy is counted while it runs. `drain` closes the
//! registry, waits for that count to reach zero and only then destroys what is left, so a
//! creation that races with shutdown is always released before `drain` returns.

use super::listeners::{ProxyListenerHub, panic_message};
use super::types::*;
use crate::error::{GridError, Result};

use dashmap::DashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Notify, OnceCell};

/// Type-erased async factory that builds the proxy for a key of its service.
pub type ProxyFactoryFn = Arc<
    dyn Fn(ObjectKey) -> Pin<Box<dyn Future<Output = anyhow::Result<ProxyHandle>> + Send>>
        + Send
        + Sync,
>;

/// Wraps `factory` in `Box::pin` so factories returning different future types can share
/// one map.
pub fn erase_factory<F, Fut>(factory: F) -> ProxyFactoryFn
where
    F: Fn(ObjectKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ProxyHandle>> + Send + 'static,
{
    Arc::new(move |key: ObjectKey| {
        Box::pin(factory(key)) as Pin<Box<dyn Future<Output = anyhow::Result<ProxyHandle>> + Send>>
    })
}

pub struct ProxyRegistry {
    factories: DashMap<String, ProxyFactoryFn>,
    proxies: DashMap<ObjectKey, Arc<OnceCell<ProxyHandle>>>,
    listeners: Arc<ProxyListenerHub>,
    /// Number of initialised proxies. Read by the health sampler without touching the map.
    live: AtomicUsize,
    closed: AtomicBool,
    /// `get_or_create` calls past the open check that have not returned yet.
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count on every exit path, including cancellation.
struct InFlightGuard<'a> {
    registry: &'a ProxyRegistry,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.registry.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.registry.idle.notify_waiters();
        }
    }
}

impl ProxyRegistry {
    pub fn new(listeners: Arc<ProxyListenerHub>) -> Arc<Self> {
        Arc::new(Self {
            factories: DashMap::new(),
            proxies: DashMap::new(),
            listeners,
            live: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        })
    }

    /// Registers the factory for `service_name`, replacing any earlier one.
    ///
    /// # Arguments
    /// * `service_name` - The service identifier (e.g., "map").
    /// * `factory` - Async closure that builds the proxy for one key of that service.
    pub fn register_service<F, Fut>(&self, service_name: &str, factory: F)
    where
        F: Fn(ObjectKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ProxyHandle>> + Send + 'static,
    {
        self.register_factory(service_name, erase_factory(factory));
    }

    /// Registers an already type-erased factory.
    pub fn register_factory(&self, service_name: &str, factory: ProxyFactoryFn) {
        self.factories.insert(service_name.to_string(), factory);

        tracing::info!("Registered proxy factory for service: {}", service_name);
    }

    pub fn has_service(&self, service_name: &str) -> bool {
        self.factories.contains_key(service_name)
    }

    pub fn list_services(&self) -> Vec<String> {
        self.factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn listeners(&self) -> &Arc<ProxyListenerHub> {
        &self.listeners
    }

    /// Returns the proxy for `(service_name, object_name)`, creating it if needed.
    ///
    /// # Returns
    /// * `Ok(handle)` with the one live proxy for the key; concurrent callers share it.
    /// * `Err(InvalidArgument)` for an empty name, `Err(UnknownService)` when no factory is
    ///   registered, `Err(Factory)` when the factory failed.
    /// * `Err(NotActive)` once the registry is closed, including for a creation that
    ///   completed after the close (that proxy is released immediately).
    pub async fn get_or_create(&self, service_name: &str, object_name: &str) -> Result<ProxyHandle> {
        let key = ObjectKey::new(service_name, object_name)?;

        // Counted before the open check: `drain` either sees this call or this call sees
        // the registry closed.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlightGuard { registry: self };
        self.ensure_open(&key)?;

        if let Some(handle) = self.lookup(&key) {
            return Ok(handle);
        }

        let factory = self
            .factories
            .get(service_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GridError::UnknownService(service_name.to_string()))?;

        let cell = self
            .proxies
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let created = cell
            .get_or_try_init(|| async {
                let handle = factory(key.clone())
                    .await
                    .map_err(|source| GridError::Factory {
                        key: key.clone(),
                        source,
                    })?;

                self.live.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("Created proxy {}", key);

                // Published before the cell is set: no destroy can observe this proxy
                // until its CREATED event has been delivered.
                self.listeners
                    .publish(&DistributedObjectEvent::created(key.clone()));

                Ok::<_, GridError>(handle)
            })
            .await
            .cloned();

        match created {
            Ok(handle) => {
                if self.closed.load(Ordering::SeqCst) {
                    // Lost the race against the shutdown drain.
                    self.release(&key);
                    return Err(GridError::NotActive(format!(
                        "proxy {} was created during shutdown",
                        key
                    )));
                }
                Ok(handle)
            }
            Err(e) => {
                // Only drop the empty cell if no other caller is waiting on it; a waiter
                // retries the initialisation itself.
                self.proxies.remove_if(&key, |_, existing| {
                    Arc::ptr_eq(existing, &cell)
                        && !existing.initialized()
                        && Arc::strong_count(existing) == 2
                });
                tracing::warn!("Proxy creation for {} failed: {}", key, e);
                Err(e)
            }
        }
    }

    /// Destroys the proxy for `(service_name, object_name)`.
    ///
    /// Returns `false` when there was nothing to destroy, including while the proxy is
    /// still being created.
    pub fn destroy(&self, service_name: &str, object_name: &str) -> Result<bool> {
        let key = ObjectKey::new(service_name, object_name)?;
        Ok(self.release(&key))
    }

    /// Destroys every live proxy and returns how many were released.
    pub fn destroy_all(&self) -> usize {
        let keys = self.list_all();
        let released = keys.iter().filter(|key| self.release(key)).count();

        if released > 0 {
            tracing::info!("Destroyed {} proxies", released);
        }
        released
    }

    /// Snapshot of the keys of all live proxies.
    pub fn list_all(&self) -> Vec<ObjectKey> {
        self.proxies
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Snapshot of all live proxies.
    pub fn get_distributed_objects(&self) -> Vec<ProxyHandle> {
        self.proxies
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect()
    }

    pub fn proxy_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Stops accepting new proxies. Existing ones stay until destroyed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Closes the registry, waits for in-flight creations and destroys every proxy.
    ///
    /// # Returns
    /// The number of proxies destroyed by this call. Proxies whose creation finished
    /// during the wait are released by their creators and are not counted.
    pub async fn drain(&self) -> usize {
        self.close();
        self.wait_idle().await;
        self.destroy_all()
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            tracing::debug!(
                "Waiting for {} in-flight proxy creations",
                self.in_flight.load(Ordering::SeqCst)
            );
            notified.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self, key: &ObjectKey) -> Result<()> {
        if self.is_closed() {
            return Err(GridError::NotActive(format!(
                "cannot access {} after shutdown",
                key
            )));
        }
        Ok(())
    }

    fn lookup(&self, key: &ObjectKey) -> Option<ProxyHandle> {
        self.proxies
            .get(key)
            .and_then(|entry| entry.value().get().cloned())
    }

    /// Removes an initialised proxy, runs its destroy hook and publishes DESTROYED.
    fn release(&self, key: &ObjectKey) -> bool {
        let Some((key, cell)) = self
            .proxies
            .remove_if(key, |_, existing| existing.initialized())
        else {
            return false;
        };

        if let Some(handle) = cell.get() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handle.on_destroy())) {
                tracing::error!(
                    "Destroy hook of proxy {} panicked: {}",
                    key,
                    panic_message(&*panic)
                );
            }
            self.live.fetch_sub(1, Ordering::SeqCst);
        }

        tracing::debug!("Destroyed proxy {}", key);
        self.listeners
            .publish(&DistributedObjectEvent::destroyed(key));
        true
    }
}
