//! Health Monitoring Module
//!
//! Out-of-band observability for one node. A background task periodically samples memory,
//! system load and the coordination layer's own counters (live proxies, listeners, cluster
//! members, connections) and reports them according to the configured level:
//!
//! - **OFF**: nothing is started.
//! - **SILENT**: samples are taken, and logged only when a threshold is crossed.
//! - **NOISY**: every sample is logged.

pub mod monitor;
pub mod types;
