//! Grid Instance Module
//!
//! The facade an application holds: one `GridInstance` per running member, owning its user
//! context, proxy registry, lifecycle and health monitor.
//!
//! ## Submodules
//! - **`node`**: the seam to the external cluster layer (`ClusterNode`) and a standalone
//!   `LocalNode`.
//! - **`builder`**: startup ordering.
//! - **`grid`**: the instance itself and its distributed-object accessors.

pub mod builder;
pub mod grid;
pub mod node;
