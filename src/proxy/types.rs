use crate::error::{GridError, Result};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Well-known service names for the standard distributed object kinds.
pub mod services {
    pub const MAP: &str = "map";
    pub const QUEUE: &str = "queue";
    pub const TOPIC: &str = "topic";
    pub const SET: &str = "set";
    pub const LIST: &str = "list";
    pub const MULTI_MAP: &str = "multimap";
    pub const REPLICATED_MAP: &str = "replicatedmap";
    pub const LOCK: &str = "lock";
    pub const EXECUTOR: &str = "executor";
    pub const ID_GENERATOR: &str = "idgenerator";
    pub const ATOMIC_LONG: &str = "atomiclong";
    pub const ATOMIC_REFERENCE: &str = "atomicreference";
    pub const COUNT_DOWN_LATCH: &str = "countdownlatch";
    pub const SEMAPHORE: &str = "semaphore";

    pub const ALL: [&str; 14] = [
        MAP,
        QUEUE,
        TOPIC,
        SET,
        LIST,
        MULTI_MAP,
        REPLICATED_MAP,
        LOCK,
        EXECUTOR,
        ID_GENERATOR,
        ATOMIC_LONG,
        ATOMIC_REFERENCE,
        COUNT_DOWN_LATCH,
        SEMAPHORE,
    ];
}

/// Identity of a distributed object: which service owns it, and its name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    service_name: String,
    object_name: String,
}

impl ObjectKey {
    /// Both components must be non-empty.
    pub fn new(service_name: &str, object_name: &str) -> Result<Self> {
        if service_name.is_empty() {
            return Err(GridError::InvalidArgument(
                "service name must not be empty".to_string(),
            ));
        }
        if object_name.is_empty() {
            return Err(GridError::InvalidArgument(format!(
                "retrieving a {} instance with an empty name is not allowed",
                service_name
            )));
        }

        Ok(Self {
            service_name: service_name.to_string(),
            object_name: object_name.to_string(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service_name, self.object_name)
    }
}

/// Node-local representative of a distributed object.
///
/// Implemented by each backing service. The registry owns every proxy it creates and
/// calls [`DistributedObject::on_destroy`] exactly once when the proxy is released.
pub trait DistributedObject: Send + Sync {
    fn key(&self) -> &ObjectKey;

    fn on_destroy(&self) {}
}

pub type ProxyHandle = Arc<dyn DistributedObject>;

/// A proxy that carries nothing but its identity.
///
/// Used by services that keep no node-local state behind their proxies.
#[derive(Debug)]
pub struct NamedProxy {
    key: ObjectKey,
}

impl NamedProxy {
    pub fn new(key: ObjectKey) -> Self {
        Self { key }
    }
}

impl DistributedObject for NamedProxy {
    fn key(&self) -> &ObjectKey {
        &self.key
    }
}

/// Opaque registration id handed out by listener registries. Never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ListenerId(pub String);

impl ListenerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Destroyed,
}

/// Notification emitted by the proxy registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributedObjectEvent {
    pub kind: EventKind,
    pub key: ObjectKey,
}

impl DistributedObjectEvent {
    pub fn created(key: ObjectKey) -> Self {
        Self {
            kind: EventKind::Created,
            key,
        }
    }

    pub fn destroyed(key: ObjectKey) -> Self {
        Self {
            kind: EventKind::Destroyed,
            key,
        }
    }
}
