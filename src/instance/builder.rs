//! Instance startup.
//!
//! Collects factories and listeners, then runs the startup order: construct services,
//! announce STARTING, start the cluster node, mark STARTED, start the health monitor.

use super::grid::GridInstance;
use super::node::{ClusterNode, LocalNode};
use crate::config::InstanceConfig;
use crate::context::store::UserContextStore;
use crate::error::{GridError, Result};
use crate::health::monitor::HealthMonitor;
use crate::lifecycle::service::{LifecycleListenerFn, LifecycleService};
use crate::lifecycle::types::{LifecycleState, TransitionTable};
use crate::proxy::listeners::{ObjectListenerFn, ProxyListenerHub};
use crate::proxy::registry::{ProxyFactoryFn, ProxyRegistry, erase_factory};
use crate::proxy::types::{DistributedObjectEvent, ObjectKey, ProxyHandle};

use std::future::Future;
use std::sync::Arc;

const DEFAULT_LOCAL_ADDRESS: &str = "127.0.0.1:5701";

pub struct GridInstanceBuilder {
    config: InstanceConfig,
    node: Option<Arc<dyn ClusterNode>>,
    transitions: TransitionTable,
    services: Vec<(String, ProxyFactoryFn)>,
    lifecycle_listeners: Vec<LifecycleListenerFn>,
    object_listeners: Vec<ObjectListenerFn>,
}

impl GridInstanceBuilder {
    pub fn new(config: InstanceConfig) -> Self {
        Self {
            config,
            node: None,
            transitions: TransitionTable::default(),
            services: Vec::new(),
            lifecycle_listeners: Vec::new(),
            object_listeners: Vec::new(),
        }
    }

    /// Cluster layer to start. Defaults to a standalone `LocalNode`.
    pub fn with_node(mut self, node: Arc<dyn ClusterNode>) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_transition_table(mut self, table: TransitionTable) -> Self {
        self.transitions = table;
        self
    }

    pub fn with_service<F, Fut>(mut self, service_name: &str, factory: F) -> Self
    where
        F: Fn(ObjectKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ProxyHandle>> + Send + 'static,
    {
        self.services
            .push((service_name.to_string(), erase_factory(factory)));
        self
    }

    /// Registered before startup, so it also observes STARTING and STARTED.
    pub fn with_lifecycle_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(LifecycleState) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.lifecycle_listeners.push(Arc::new(listener));
        self
    }

    pub fn with_object_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&DistributedObjectEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.object_listeners.push(Arc::new(listener));
        self
    }

    pub async fn start(self) -> Result<Arc<GridInstance>> {
        let name = self.config.instance_name();
        tracing::info!("Starting instance {}", name);

        // Each instance gets its own copy; the config's template is never shared.
        let user_context = UserContextStore::from_template(&self.config.user_context_template());

        let node = self
            .node
            .unwrap_or_else(|| Arc::new(LocalNode::new(DEFAULT_LOCAL_ADDRESS)));

        let hub = ProxyListenerHub::new();
        for listener in self.object_listeners {
            hub.add_listener(move |event| listener(event));
        }

        let registry = ProxyRegistry::new(hub);
        for (service_name, factory) in self.services {
            registry.register_factory(&service_name, factory);
        }

        let health = HealthMonitor::new(
            self.config.health_settings(),
            registry.clone(),
            node.clone(),
        );

        let lifecycle = LifecycleService::new(
            self.transitions,
            registry.clone(),
            health.clone(),
            node.clone(),
        );
        for listener in self.lifecycle_listeners {
            lifecycle.add_listener(move |state| listener(state));
        }
        lifecycle.announce_current();

        let started = match node.start().await {
            Ok(()) if node.is_active() => Ok(()),
            Ok(()) => Err(GridError::StartupFailed(
                "node is not active after start".to_string(),
            )),
            Err(e) => Err(GridError::StartupFailed(e.to_string())),
        };

        if let Err(e) = started.and_then(|_| lifecycle.fire_lifecycle_event(LifecycleState::Started)) {
            tracing::error!("Instance {} failed to start: {}", name, e);
            lifecycle.shutdown().await;
            return Err(e);
        }

        health.start();

        tracing::info!("Instance {} started at {}", name, node.address());

        Ok(Arc::new(GridInstance::new(
            name,
            self.config,
            user_context,
            registry,
            lifecycle,
            health,
            node,
        )))
    }
}
