//! Data Grid Node Coordination Library
//!
//! The per-node coordination layer of an in-memory data grid. It does not implement any
//! data structure itself; it decides how distributed objects are found, created once and
//! torn down on this node, and how the node's own readiness is tracked and observed.
//!
//! ## Architecture Modules
//!
//! - **`context`**: the per-instance user context, seeded from configuration.
//! - **`proxy`**: the proxy registry (one live proxy per `(service, name)`) and the
//!   listener hub that announces proxy creation and destruction.
//! - **`lifecycle`**: the node's run-state machine and its ordered shutdown sequence.
//! - **`health`**: a background sampler that logs resource indicators without touching
//!   the request path.
//! - **`instance`**: the `GridInstance` facade and its startup builder.

pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod instance;
pub mod lifecycle;
pub mod proxy;

pub use config::InstanceConfig;
pub use error::{GridError, Result};
pub use instance::grid::GridInstance;
