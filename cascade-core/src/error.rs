//! Error Types
//!
//! Three families of failure exist in a stream graph:
//!
//! - [`ConfigError`]: raised while the graph is being built. Operators that
//!   need clock capabilities fail here instead of misbehaving at run time.
//! - [`PropagationError`]: one node's update failed during a wave. Only the
//!   subtree below that node is abandoned; the wave and the clock go on.
//! - [`InjectError`]: returned to the caller of `inject`.

use thiserror::Error;

use crate::graph::NodeId;

/// Error type returned by user update functions.
pub type UpdateError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of one update function call.
///
/// `Ok(Some(v))` publishes `v`, `Ok(None)` publishes nothing (the wave stops
/// along this edge), `Err(e)` abandons the node's subtree for this wave.
pub type Outcome<T> = Result<Option<T>, UpdateError>;

/// Graph-construction errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The operator needs a governing clock but the stream is orphan.
    #[error("operator `{operator}` needs a governing clock, but the stream is orphan")]
    Ungoverned { operator: &'static str },

    /// The operator needs monotonic ticks but the clock does not promise them.
    #[error("operator `{operator}` needs monotonic ticks, but clock {clock} does not guarantee them")]
    NotMonotonic { operator: &'static str, clock: NodeId },

    /// The clock ticks values of another type than the operator can subtract.
    #[error("operator `{operator}` cannot subtract ticks of clock {clock} (ticks are `{actual}`)")]
    ClockValueMismatch {
        operator: &'static str,
        clock: NodeId,
        actual: &'static str,
    },

    /// A second input of the operator is governed by another clock.
    #[error("operator `{operator}` needs every input on clock {clock}")]
    ForeignClock { operator: &'static str, clock: NodeId },

    /// The governing clock no longer exists.
    #[error("clock {clock} has already been dropped")]
    ClockDropped { clock: NodeId },

    /// A self-ticking clock was configured with a zero period.
    #[error("self-ticking clock `{name}` needs a period greater than zero")]
    InvalidPeriod { name: String },

    /// The worker thread for a clock could not be spawned.
    #[error("failed to spawn worker thread for clock `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Clock configuration could not be parsed.
    #[error("invalid clock configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A per-node failure during a wave.
#[derive(Debug, Error)]
pub enum PropagationError {
    /// The node's update function returned an error.
    #[error("update of node {node} failed: {source}")]
    UpdateFailed {
        node: NodeId,
        #[source]
        source: UpdateError,
    },

    /// The node's update function (or its hook) panicked.
    #[error("update of node {node} panicked: {message}")]
    Panicked { node: NodeId, message: String },

    /// Two threads tried to mutate the same node at once.
    #[error("node {node} was mutated from two threads at once")]
    GovernanceMismatch { node: NodeId },

    /// A monotonic clock was handed a tick smaller than the previous one.
    #[error("clock {clock} rejected a tick smaller than the previous one")]
    NonMonotonicTick { clock: NodeId },
}

impl PropagationError {
    /// The node the failure was recorded against.
    pub fn node(&self) -> NodeId {
        match self {
            Self::UpdateFailed { node, .. }
            | Self::Panicked { node, .. }
            | Self::GovernanceMismatch { node } => *node,
            Self::NonMonotonicTick { clock } => *clock,
        }
    }
}

/// Errors returned from `inject` and friends.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The injected orphan node was being mutated by another thread.
    #[error("node {node} was mutated from two threads at once")]
    GovernanceMismatch { node: NodeId },

    /// The governing clock's loop has exited.
    #[error("clock {clock} is no longer running")]
    ClockStopped { clock: NodeId },

    /// `flush` was called from inside a clock's wave. Waiting there could
    /// block two clock loops on each other.
    #[error("cannot flush clock {clock} from inside a clock wave")]
    FlushFromWave { clock: NodeId },

    /// An orphan wave ran in the caller and some node updates failed.
    #[error("{} node update(s) failed during the wave", .0.len())]
    Propagation(Vec<PropagationError>),
}
