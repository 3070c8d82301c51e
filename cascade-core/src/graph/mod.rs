//! Dependency Graph
//!
//! This module implements the graph that streams live in and the wave
//! algorithm that pushes one event through it.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes hold the latest published value of a stream
//! - Edges point downstream: if B is computed from A, A lists B as a dependent
//!
//! Edges are only ever added to *new* nodes, so the graph is acyclic by
//! construction. Each wave orders itself by the part of the graph it reaches.
//!
//! # Ownership
//!
//! A parent owns its dependents (strong edges). Dependents refer to their
//! parents and to their governing clock weakly, so the downstream direction
//! never keeps anything upstream alive.

mod governance;
mod node;
mod scheduler;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use governance::{resolve_clock, ClockRef};
pub(crate) use node::{Node, Update, Upstream};
pub(crate) use scheduler::{drive, guarded, Injection};

/// Values that can flow through a stream.
///
/// Any `Clone + Send + Sync + 'static` type qualifies.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Send + Sync + 'static {}

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
