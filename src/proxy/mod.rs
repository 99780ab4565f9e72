//! Distributed Object Proxy Module
//!
//! Guarantees that every named distributed object resolves, on this node, to exactly one
//! live proxy, and tells interested parties when proxies come and go.
//!
//! ## Submodules
//! - **`types`**: object identity (`ObjectKey`), the `DistributedObject` trait, events.
//! - **`registry`**: per-service factories and the single-flight key table.
//! - **`listeners`**: fan-out of CREATED / DESTROYED events with per-listener isolation.

pub mod listeners;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;
