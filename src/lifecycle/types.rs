use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Top-level run state of one instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Set at construction, before the cluster layer is started.
    Starting,
    /// Fully started and serving.
    Started,
    /// Temporarily not authoritative for data while rejoining the cluster.
    Merging,
    /// Shutdown sequence in progress.
    ShuttingDown,
    /// Terminal. The instance is unusable.
    Shutdown,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Shutdown)
    }

    /// `Started` and `Merging` both count as running.
    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Started | LifecycleState::Merging)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "STARTING",
            LifecycleState::Started => "STARTED",
            LifecycleState::Merging => "MERGING",
            LifecycleState::ShuttingDown => "SHUTTING_DOWN",
            LifecycleState::Shutdown => "SHUTDOWN",
        };
        f.write_str(name)
    }
}

/// The set of legal lifecycle transitions.
///
/// The shutdown edges (every non-shutdown state to `ShuttingDown`, then
/// `ShuttingDown -> Shutdown`) are always permitted so that shutdown can never fail.
/// No other edge ever leaves `ShuttingDown` or `Shutdown`; everything else must be
/// allowed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    allowed: HashSet<(LifecycleState, LifecycleState)>,
}

impl TransitionTable {
    /// A table with only the shutdown edges.
    pub fn empty() -> Self {
        Self {
            allowed: HashSet::new(),
        }
    }

    pub fn allow(mut self, from: LifecycleState, to: LifecycleState) -> Self {
        self.allowed.insert((from, to));
        self
    }

    /// Whether `from -> to` is legal.
    ///
    /// # Returns
    /// * `true` for the shutdown edges, whatever the table holds.
    /// * `false` for every other edge out of `ShuttingDown` or `Shutdown`, even when it was
    ///   added with `allow`.
    /// * Otherwise, whether the edge was allowed.
    pub fn permits(&self, from: LifecycleState, to: LifecycleState) -> bool {
        if Self::is_shutdown_edge(from, to) {
            return true;
        }
        if matches!(from, LifecycleState::ShuttingDown | LifecycleState::Shutdown) {
            return false;
        }
        self.allowed.contains(&(from, to))
    }

    fn is_shutdown_edge(from: LifecycleState, to: LifecycleState) -> bool {
        use LifecycleState::*;

        matches!(
            (from, to),
            (Starting | Started | Merging, ShuttingDown) | (ShuttingDown, Shutdown)
        )
    }
}

impl Default for TransitionTable {
    /// STARTING -> STARTED, STARTED <-> MERGING, plus the shutdown edges.
    fn default() -> Self {
        use LifecycleState::*;

        Self::empty()
            .allow(Starting, Started)
            .allow(Started, Merging)
            .allow(Merging, Started)
    }
}
