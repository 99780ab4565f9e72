use super::builder::GridInstanceBuilder;
use super::node::ClusterNode;
use crate::config::InstanceConfig;
use crate::context::store::UserContextStore;
use crate::error::{GridError, Result};
use crate::health::monitor::HealthMonitor;
use crate::lifecycle::service::LifecycleService;
use crate::lifecycle::types::LifecycleState;
use crate::proxy::registry::ProxyRegistry;
use crate::proxy::types::{DistributedObjectEvent, ListenerId, ObjectKey, ProxyHandle, services};

use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One running member of the grid.
///
/// Owns every coordination component; nothing here is process-global, so several
/// instances can live side by side in one process.
pub struct GridInstance {
    name: String,
    config: InstanceConfig,
    user_context: UserContextStore,
    registry: Arc<ProxyRegistry>,
    lifecycle: Arc<LifecycleService>,
    health: Arc<HealthMonitor>,
    node: Arc<dyn ClusterNode>,
}

impl GridInstance {
    pub fn builder(config: InstanceConfig) -> GridInstanceBuilder {
        GridInstanceBuilder::new(config)
    }

    pub(crate) fn new(
        name: String,
        config: InstanceConfig,
        user_context: UserContextStore,
        registry: Arc<ProxyRegistry>,
        lifecycle: Arc<LifecycleService>,
        health: Arc<HealthMonitor>,
        node: Arc<dyn ClusterNode>,
    ) -> Self {
        Self {
            name,
            config,
            user_context,
            registry,
            lifecycle,
            health,
            node,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn user_context(&self) -> &UserContextStore {
        &self.user_context
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleService> {
        &self.lifecycle
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn proxy_registry(&self) -> &Arc<ProxyRegistry> {
        &self.registry
    }

    pub fn node(&self) -> &Arc<dyn ClusterNode> {
        &self.node
    }

    pub async fn get_distributed_object(
        &self,
        service_name: &str,
        name: &str,
    ) -> Result<ProxyHandle> {
        self.ensure_active()?;
        self.registry.get_or_create(service_name, name).await
    }

    /// Narrowed entry point for callers holding a loosely typed identifier.
    ///
    /// Only JSON strings are accepted; any other value is `InvalidArgument`.
    pub async fn get_distributed_object_by_id(
        &self,
        service_name: &str,
        id: &Value,
    ) -> Result<ProxyHandle> {
        match id {
            Value::String(name) => self.get_distributed_object(service_name, name).await,
            other => Err(GridError::InvalidArgument(format!(
                "'id' must be a string, got {}",
                other
            ))),
        }
    }

    pub async fn get_map(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::MAP, name).await
    }

    pub async fn get_queue(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::QUEUE, name).await
    }

    pub async fn get_topic(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::TOPIC, name).await
    }

    pub async fn get_set(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::SET, name).await
    }

    pub async fn get_list(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::LIST, name).await
    }

    pub async fn get_multi_map(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::MULTI_MAP, name).await
    }

    pub async fn get_replicated_map(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::REPLICATED_MAP, name)
            .await
    }

    pub async fn get_lock(&self, key: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::LOCK, key).await
    }

    pub async fn get_executor_service(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::EXECUTOR, name).await
    }

    pub async fn get_id_generator(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::ID_GENERATOR, name)
            .await
    }

    pub async fn get_atomic_long(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::ATOMIC_LONG, name).await
    }

    pub async fn get_atomic_reference(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::ATOMIC_REFERENCE, name)
            .await
    }

    pub async fn get_count_down_latch(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::COUNT_DOWN_LATCH, name)
            .await
    }

    pub async fn get_semaphore(&self, name: &str) -> Result<ProxyHandle> {
        self.get_distributed_object(services::SEMAPHORE, name).await
    }

    pub fn destroy_distributed_object(&self, service_name: &str, name: &str) -> Result<bool> {
        self.registry.destroy(service_name, name)
    }

    pub fn get_distributed_objects(&self) -> Vec<ProxyHandle> {
        self.registry.get_distributed_objects()
    }

    pub fn list_objects(&self) -> Vec<ObjectKey> {
        self.registry.list_all()
    }

    pub fn add_distributed_object_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&DistributedObjectEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.listeners().add_listener(listener)
    }

    pub fn remove_distributed_object_listener(&self, id: &ListenerId) -> bool {
        self.registry.listeners().remove_listener(id)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }

    /// Non-blocking variant of `shutdown`.
    pub fn begin_shutdown(&self) -> JoinHandle<()> {
        self.lifecycle.begin_shutdown()
    }

    fn ensure_active(&self) -> Result<()> {
        match self.lifecycle.state() {
            LifecycleState::ShuttingDown | LifecycleState::Shutdown => Err(GridError::NotActive(
                format!("instance {} is shut down", self.name),
            )),
            _ => Ok(()),
        }
    }
}

impl PartialEq for GridInstance {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for GridInstance {}

impl Hash for GridInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for GridInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GridInstance{{name='{}', node={}}}",
            self.name,
            self.node.address()
        )
    }
}
