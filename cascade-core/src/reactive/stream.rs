//! Stream Implementation
//!
//! A Stream is a cheap, cloneable handle on one node of the dependency
//! graph. Cloning a stream clones the handle, not the node.
//!
//! # How Injection Works
//!
//! 1. If a wave is already running on this thread and the target belongs to
//!    it (same clock, or orphan), the event is parked and runs as the next
//!    wave once the current one completes.
//!
//! 2. Otherwise, a governed stream hands the event to its clock's loop and
//!    returns immediately.
//!
//! 3. An orphan stream runs the wave right here, in the caller, and returns
//!    the failures of that wave.
//!
//! # Ownership
//!
//! A stream handle keeps its node alive, and a node keeps every stream
//! derived from it alive. Dropping every handle to a source therefore stops
//! its events, even if derived streams are still held.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{InjectError, Outcome, PropagationError};
use crate::graph::{drive, ClockRef, Injection, Node, NodeId, Update, Upstream, Value};

use super::context::WaveContext;

/// A time-varying sequence of discrete events of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let prices = Stream::orphan();
/// let doubled = prices.subscribe(|p: &u32| Ok(Some(p * 2)));
///
/// prices.inject(21)?;
/// assert_eq!(doubled.value(), Some(42));
/// ```
pub struct Stream<T: Value> {
    node: Arc<Node<T>>,
}

impl<T: Value> Stream<T> {
    /// Create a source stream governed by `clock`, or an orphan.
    pub fn source(clock: Option<&ClockRef>) -> Self {
        Self::from_node(Node::source(clock.cloned()))
    }

    /// Create a source stream with no governing clock.
    pub fn orphan() -> Self {
        Self::source(None)
    }

    pub(crate) fn from_node(node: Arc<Node<T>>) -> Self {
        Self { node }
    }

    pub(crate) fn node(&self) -> &Arc<Node<T>> {
        &self.node
    }

    fn upstream(&self) -> &dyn Upstream {
        &*self.node
    }

    /// Get the stream's unique ID.
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// The clock governing this stream, `None` for an orphan.
    pub fn clock(&self) -> Option<ClockRef> {
        self.node.clock().cloned()
    }

    /// Whether this stream is a clock.
    pub fn is_clock(&self) -> bool {
        self.node.is_clock()
    }

    /// The latest published value, `None` before the first event.
    pub fn value(&self) -> Option<T> {
        self.node.value()
    }

    /// Number of streams directly derived from this one.
    pub fn dependent_count(&self) -> usize {
        self.node.dependent_count()
    }

    /// Push an event into the graph.
    ///
    /// Governed streams return as soon as the event is queued on their
    /// clock. Orphan streams return after the wave (and every follow-up
    /// wave it caused) has completed.
    pub fn inject(&self, value: T) -> Result<(), InjectError> {
        let injection = Injection::new(self.node.clone(), value);
        let target = self.node.clock();

        let injection = match WaveContext::defer(target.map(ClockRef::id), injection) {
            Ok(()) => return Ok(()),
            Err(injection) => injection,
        };

        match target {
            Some(clock) => clock.submit(injection),
            None => self.run_here(injection),
        }
    }

    fn run_here(&self, injection: Injection) -> Result<(), InjectError> {
        let mut errors = Vec::new();
        drive(None, injection, &mut |err| errors.push(err));

        match errors.as_slice() {
            [] => Ok(()),
            [PropagationError::GovernanceMismatch { node }] if *node == self.id() => {
                Err(InjectError::GovernanceMismatch { node: *node })
            }
            _ => Err(InjectError::Propagation(errors)),
        }
    }

    /// Derive a stream computed from every event of this one.
    ///
    /// The derived stream is governed by the same clock. It stays empty
    /// until this stream next publishes.
    pub fn subscribe<U, F>(&self, mut f: F) -> Stream<U>
    where
        U: Value,
        F: FnMut(&T) -> Outcome<U> + Send + 'static,
    {
        let parent = Arc::downgrade(&self.node);
        let update = Update::Unary(Box::new(move || match read(&parent) {
            Some(value) => f(&value),
            None => Ok(None),
        }));
        Stream::from_node(Node::derive(&[self.upstream()], update))
    }

    /// Derive a stream that runs `f` whenever this one publishes, without
    /// reading the published value.
    pub fn subscribe_tick<U, F>(&self, f: F) -> Stream<U>
    where
        U: Value,
        F: FnMut() -> Outcome<U> + Send + 'static,
    {
        Stream::from_node(Node::derive(
            &[self.upstream()],
            Update::Tick(Box::new(f)),
        ))
    }

    /// Derive a stream combining several streams of the same type.
    ///
    /// The governing clock is decided by [`resolve_clock`]. The update sees
    /// the latest value of every parent and which of them fired this wave.
    ///
    /// [`resolve_clock`]: crate::graph::resolve_clock
    pub fn subscribe_many<U, F>(parents: &[Stream<T>], mut f: F) -> Stream<U>
    where
        U: Value,
        F: FnMut(&Inputs<'_, T>) -> Outcome<U> + Send + 'static,
    {
        let weak: Vec<Weak<Node<T>>> = parents.iter().map(|p| Arc::downgrade(&p.node)).collect();
        let upstream: Vec<&dyn Upstream> = parents.iter().map(Stream::upstream).collect();

        let update = Update::Combine(Box::new(move |fired: &[usize]| {
            let values: Vec<Option<T>> = weak.iter().map(read).collect();
            f(&Inputs {
                values: &values,
                fired,
            })
        }));
        Stream::from_node(Node::derive(&upstream, update))
    }

    /// Derive a stream combining this stream with one of another type.
    pub fn subscribe_pair<B, U, F>(&self, other: &Stream<B>, mut f: F) -> Stream<U>
    where
        B: Value,
        U: Value,
        F: FnMut(&Pair<'_, T, B>) -> Outcome<U> + Send + 'static,
    {
        let left = Arc::downgrade(&self.node);
        let right = Arc::downgrade(&other.node);

        let update = Update::Combine(Box::new(move |fired: &[usize]| {
            f(&Pair {
                left: read(&left),
                right: read(&right),
                fired,
            })
        }));
        Stream::from_node(Node::derive(&[self.upstream(), other.upstream()], update))
    }

    /// Observe every value this stream publishes. Replaces any earlier hook.
    ///
    /// The hook runs inside the wave, after the value is stored, so
    /// [`value`](Self::value) already returns it.
    pub fn set_hook<F>(&self, hook: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.node.set_hook(Arc::new(hook));
    }

    pub fn clear_hook(&self) {
        self.node.clear_hook();
    }
}

fn read<T: Value>(node: &Weak<Node<T>>) -> Option<T> {
    node.upgrade().and_then(|node| node.value())
}

impl<T: Value> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T: Value> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stream").field(&*self.node).finish()
    }
}

/// Inputs of a multi-parent update.
#[derive(Debug)]
pub struct Inputs<'a, T> {
    values: &'a [Option<T>],
    fired: &'a [usize],
}

impl<'a, T> Inputs<'a, T> {
    /// Latest value of every parent, in parent order.
    pub fn values(&self) -> &'a [Option<T>] {
        self.values
    }

    /// Latest value of parent `i`.
    pub fn get(&self, i: usize) -> Option<&'a T> {
        self.values.get(i).and_then(Option::as_ref)
    }

    /// Parents that published this wave, in the order they published.
    pub fn fired(&self) -> &'a [usize] {
        self.fired
    }

    pub fn has_fired(&self, i: usize) -> bool {
        self.fired.contains(&i)
    }

    /// The first parent to publish this wave, with its value.
    pub fn first_fired(&self) -> Option<(usize, &'a T)> {
        let i = *self.fired.first()?;
        self.get(i).map(|value| (i, value))
    }
}

/// Inputs of a two-parent update over different value types.
#[derive(Debug)]
pub struct Pair<'a, A, B> {
    left: Option<A>,
    right: Option<B>,
    fired: &'a [usize],
}

impl<A, B> Pair<'_, A, B> {
    pub fn left(&self) -> Option<&A> {
        self.left.as_ref()
    }

    pub fn right(&self) -> Option<&B> {
        self.right.as_ref()
    }

    pub fn left_fired(&self) -> bool {
        self.fired.contains(&0)
    }

    pub fn right_fired(&self) -> bool {
        self.fired.contains(&1)
    }
}
