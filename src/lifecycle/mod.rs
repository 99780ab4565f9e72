//! Lifecycle Module
//!
//! The node's run state as an explicit state machine:
//!
//! ```text
//! STARTING -> STARTED -> SHUTTING_DOWN -> SHUTDOWN
//!               ^  |
//!               |  v
//!             MERGING
//! ```
//!
//! `MERGING` covers the window where the node temporarily gives up data ownership while it
//! rejoins the cluster. The legal edges live in a `TransitionTable` so deployments can
//! tighten or widen them; the shutdown edges are always legal.

pub mod service;
pub mod types;
