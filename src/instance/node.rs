//! Cluster Node Seam
//!
//! The network/cluster layer (transport, membership, failure detection) lives outside this
//! crate. The instance only needs to start it, stop it, and read a few counters from it.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait ClusterNode: Send + Sync {
    /// Brings the network and cluster layer up.
    async fn start(&self) -> Result<()>;

    /// Whether the node joined successfully and is still serving.
    fn is_active(&self) -> bool;

    async fn shutdown(&self);

    fn address(&self) -> String;

    /// Read-only accessors used by the health monitor; must not block.
    fn member_count(&self) -> usize;

    fn connection_count(&self) -> usize;
}

/// A single-member node with no network presence.
pub struct LocalNode {
    pub id: NodeId,
    address: String,
    active: AtomicBool,
}

impl LocalNode {
    pub fn new(address: &str) -> Self {
        Self {
            id: NodeId::new(),
            address: address.to_string(),
            active: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ClusterNode for LocalNode {
    async fn start(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        tracing::info!("Local node {:?} active at {}", self.id, self.address);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::info!("Local node {:?} stopped", self.id);
        }
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    fn member_count(&self) -> usize {
        usize::from(self.is_active())
    }

    fn connection_count(&self) -> usize {
        0
    }
}
