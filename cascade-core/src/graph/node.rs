//! Graph Nodes
//!
//! This module defines the node type that lives in the dependency graph,
//! and the two object-safe views the rest of the crate uses on it:
//!
//! - [`Upstream`]: what a new node needs from its parents at build time
//! - [`Propagate`]: what the wave needs from a node at run time
//!
//! Both are implemented for every `Node<T>`, which lets the wave walk a graph
//! whose nodes carry values of different types.

use std::any::type_name;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::governance::{resolve_clock, ClockRef};
use super::{NodeId, Value};
use crate::clock::ClockCore;
use crate::error::{Outcome, PropagationError};

/// Observer invoked with every value a node publishes.
pub(crate) type Hook<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// The update function of a derived node, tagged by arity.
///
/// Inputs are captured by the closures themselves (weak parent handles), so
/// the wave only has to say which parent slots fired.
pub(crate) enum Update<T> {
    /// Runs whenever the parent publishes, without reading its value.
    Tick(Box<dyn FnMut() -> Outcome<T> + Send>),
    /// Reads the single parent's new value.
    Unary(Box<dyn FnMut() -> Outcome<T> + Send>),
    /// Reads every parent; receives the slots that fired this wave.
    Combine(Box<dyn FnMut(&[usize]) -> Outcome<T> + Send>),
}

impl<T> Update<T> {
    fn call(&mut self, fired: &[usize]) -> Outcome<T> {
        match self {
            Update::Tick(f) => f(),
            Update::Unary(f) => f(),
            Update::Combine(f) => f(fired),
        }
    }

    fn arity(&self) -> &'static str {
        match self {
            Update::Tick(_) => "tick",
            Update::Unary(_) => "unary",
            Update::Combine(_) => "combine",
        }
    }
}

/// What a node is.
pub(crate) enum Role<T> {
    /// Updated only by direct injection. May be orphan or governed.
    Source,
    /// Its own governing clock. Updated only through its loop.
    Clock(Arc<ClockCore>),
    /// Recomputed by the wave from its parents.
    Derived(Mutex<Update<T>>),
}

/// A downstream edge: `child` reads this node through parent slot `slot`.
#[derive(Clone)]
pub(crate) struct Edge {
    pub child: Arc<dyn Propagate>,
    pub slot: usize,
}

/// Build-time view of a parent node.
pub(crate) trait Upstream {
    fn clock(&self) -> Option<&ClockRef>;
    fn attach(&self, edge: Edge);
}

/// Run-time view of a node, as seen by the wave.
pub(crate) trait Propagate: Send + Sync {
    fn id(&self) -> NodeId;

    /// Recompute a derived node. Returns whether a value was published.
    fn recompute(&self, fired: &[usize]) -> Result<bool, PropagationError>;

    /// Snapshot of the current dependents, in registration order.
    fn dependents(&self) -> Vec<Edge>;
}

/// A node in the dependency graph.
pub(crate) struct Node<T> {
    /// Unique identifier for this node.
    id: NodeId,

    /// Governing clock, fixed for the node's lifetime.
    clock: Option<ClockRef>,

    role: Role<T>,

    /// Last published value.
    value: RwLock<Option<T>>,

    /// Nodes computed from this one, in registration order.
    dependents: Mutex<Vec<Edge>>,

    hook: RwLock<Option<Hook<T>>>,

    /// Set while some thread is mutating this node.
    busy: AtomicBool,
}

/// Exclusive right to mutate a node, released on drop.
pub(crate) struct Claim<'a> {
    busy: &'a AtomicBool,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl<T: Value> Node<T> {
    fn new(id: NodeId, clock: Option<ClockRef>, role: Role<T>) -> Self {
        Self {
            id,
            clock,
            role,
            value: RwLock::new(None),
            dependents: Mutex::new(Vec::new()),
            hook: RwLock::new(None),
            busy: AtomicBool::new(false),
        }
    }

    /// Create a source node governed by `clock` (or orphan).
    pub fn source(clock: Option<ClockRef>) -> Arc<Self> {
        Arc::new(Self::new(NodeId::new(), clock, Role::Source))
    }

    /// Create the node of a clock. The node is its own governing clock.
    pub fn for_clock(id: NodeId, core: Arc<ClockCore>) -> Self {
        let clock = ClockRef::new(id, Arc::downgrade(&core));
        Self::new(id, Some(clock), Role::Clock(core))
    }

    /// Create a derived node and register it with every parent.
    ///
    /// The governing clock is decided by [`resolve_clock`]. Parent slot `i`
    /// is the position of the parent in `parents`.
    pub fn derive(parents: &[&dyn Upstream], update: Update<T>) -> Arc<Self> {
        let clock = resolve_clock(parents.iter().map(|p| p.clock()));
        let arity = update.arity();
        let node = Arc::new(Self::new(
            NodeId::new(),
            clock,
            Role::Derived(Mutex::new(update)),
        ));

        for (slot, parent) in parents.iter().enumerate() {
            let child: Arc<dyn Propagate> = node.clone();
            parent.attach(Edge { child, slot });
        }

        tracing::trace!(
            node = %node.id,
            arity,
            parents = parents.len(),
            orphan = node.clock.is_none(),
            "derived node registered"
        );

        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn clock(&self) -> Option<&ClockRef> {
        self.clock.as_ref()
    }

    pub fn is_clock(&self) -> bool {
        matches!(self.role, Role::Clock(_))
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.role, Role::Derived(_))
    }

    /// Clone of the last published value.
    pub fn value(&self) -> Option<T> {
        self.value.read().clone()
    }

    pub fn set_hook(&self, hook: Hook<T>) {
        *self.hook.write() = Some(hook);
    }

    pub fn clear_hook(&self) {
        *self.hook.write() = None;
    }

    pub fn dependent_count(&self) -> usize {
        self.dependents.lock().len()
    }

    /// Try to take the exclusive right to mutate this node.
    pub fn claim(&self) -> Option<Claim<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Claim { busy: &self.busy })
    }

    /// Publish an injected value.
    pub fn seed(&self, value: T) -> Result<(), PropagationError> {
        let _claim = self
            .claim()
            .ok_or(PropagationError::GovernanceMismatch { node: self.id })?;
        self.publish(value)
    }

    fn publish(&self, value: T) -> Result<(), PropagationError> {
        if let Role::Clock(core) = &self.role {
            if !core.admit(&value) {
                return Err(PropagationError::NonMonotonicTick { clock: self.id });
            }
        }

        // Store first so a hook reading its own node sees the new value.
        // No lock is held while the hook runs.
        let hook = self.hook.read().clone();
        match hook {
            Some(hook) => {
                *self.value.write() = Some(value.clone());
                hook(&value);
            }
            None => *self.value.write() = Some(value),
        }
        Ok(())
    }
}

impl<T: Value> Upstream for Node<T> {
    fn clock(&self) -> Option<&ClockRef> {
        self.clock.as_ref()
    }

    fn attach(&self, edge: Edge) {
        self.dependents.lock().push(edge);
    }
}

impl<T: Value> Propagate for Node<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn recompute(&self, fired: &[usize]) -> Result<bool, PropagationError> {
        // Sources are never registered as dependents.
        let Role::Derived(update) = &self.role else {
            return Ok(false);
        };

        let _claim = self
            .claim()
            .ok_or(PropagationError::GovernanceMismatch { node: self.id })?;

        let outcome = update.lock().call(fired);
        match outcome {
            Ok(Some(value)) => {
                self.publish(value)?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(source) => Err(PropagationError::UpdateFailed {
                node: self.id,
                source,
            }),
        }
    }

    fn dependents(&self) -> Vec<Edge> {
        self.dependents.lock().clone()
    }
}

impl<T> std::fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self.role {
            Role::Source => "source",
            Role::Clock(_) => "clock",
            Role::Derived(_) => "derived",
        };
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("role", &role)
            .field("value_type", &type_name::<T>())
            .field("orphan", &self.clock.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unary_double(parent: &Arc<Node<i32>>) -> Arc<Node<i32>> {
        let weak = Arc::downgrade(parent);
        Node::derive(
            &[&**parent as &dyn Upstream],
            Update::Unary(Box::new(move || {
                Ok(weak.upgrade().and_then(|p| p.value()).map(|v| v * 2))
            })),
        )
    }

    #[test]
    fn source_node_starts_empty() {
        let node = Node::<i32>::source(None);
        assert!(node.value().is_none());
        assert!(node.clock().is_none());
        assert!(!node.is_clock());
        assert!(!node.is_derived());
    }

    #[test]
    fn derived_node_inherits_parent_clock() {
        let a = Node::<i32>::source(None);
        let b = unary_double(&a);
        let c = unary_double(&b);
        assert!(c.is_derived());
        assert!(c.clock().is_none());
    }

    #[test]
    fn derive_registers_dependents_in_order() {
        let a = Node::<i32>::source(None);
        let b = unary_double(&a);
        let c = unary_double(&a);

        let ids: Vec<_> = Propagate::dependents(&*a)
            .iter()
            .map(|edge| edge.child.id())
            .collect();
        assert_eq!(ids, vec![b.id(), c.id()]);
        assert_eq!(a.dependent_count(), 2);
    }

    #[test]
    fn recompute_reads_parent_value() {
        let a = Node::<i32>::source(None);
        let b = unary_double(&a);

        a.seed(21).unwrap();
        assert!(b.recompute(&[0]).unwrap());
        assert_eq!(b.value(), Some(42));
    }

    #[test]
    fn claim_is_exclusive() {
        let node = Node::<i32>::source(None);
        let claim = node.claim();
        assert!(claim.is_some());
        assert!(node.claim().is_none());
        assert!(matches!(
            node.seed(1),
            Err(PropagationError::GovernanceMismatch { .. })
        ));

        drop(claim);
        assert!(node.claim().is_some());
    }

    #[test]
    fn failed_update_keeps_last_value() {
        let a = Node::<i32>::source(None);
        let weak = Arc::downgrade(&a);
        let b = Node::derive(
            &[&*a as &dyn Upstream],
            Update::Unary(Box::new(move || {
                let v = weak.upgrade().and_then(|p| p.value()).unwrap_or_default();
                if v < 0 {
                    Err("negative".into())
                } else {
                    Ok(Some(v))
                }
            })),
        );

        a.seed(5).unwrap();
        assert!(b.recompute(&[0]).unwrap());
        a.seed(-1).unwrap();
        assert!(matches!(
            b.recompute(&[0]),
            Err(PropagationError::UpdateFailed { .. })
        ));
        assert_eq!(b.value(), Some(5));
    }

    #[test]
    fn hook_sees_published_values() {
        let a = Node::<i32>::source(None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        a.set_hook(Arc::new(move |v| sink.lock().push(*v)));

        a.seed(1).unwrap();
        a.seed(2).unwrap();
        a.clear_hook();
        a.seed(3).unwrap();

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(a.value(), Some(3));
    }

    #[test]
    fn hook_runs_after_the_value_is_stored() {
        let a = Node::<i32>::source(None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (sink, weak) = (seen.clone(), Arc::downgrade(&a));
        a.set_hook(Arc::new(move |v| {
            let stored = weak.upgrade().and_then(|node| node.value());
            sink.lock().push((*v, stored));
        }));

        a.seed(1).unwrap();
        a.seed(2).unwrap();

        assert_eq!(*seen.lock(), vec![(1, Some(1)), (2, Some(2))]);
    }
}
