//! Error taxonomy shared by every coordination component.
//!
//! Collaborator code (service factories, listeners, the cluster node) reports failures
//! with `anyhow::Result`; those are wrapped here when they cross back into the instance.

use crate::lifecycle::types::LifecycleState;
use crate::proxy::types::ObjectKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    /// An identifying name was empty or of the wrong shape. Nothing was changed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No proxy factory is registered under the requested service name.
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// A lifecycle event that the transition table does not allow from the current state.
    #[error("Illegal lifecycle transition: {from} -> {to}")]
    IllegalTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// The instance is shutting down or already shut down.
    #[error("Instance is not active: {0}")]
    NotActive(String),

    /// The service factory failed while creating a proxy.
    #[error("Failed to create proxy {key}: {source}")]
    Factory {
        key: ObjectKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("Node failed to start: {0}")]
    StartupFailed(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
