//! Wave Scheduler
//!
//! A wave is one complete propagation pass triggered by a single injected
//! event. The scheduler guarantees that within a wave every transitive
//! dependent of the injected node is recomputed exactly once, and only after
//! every one of its parents that changed in the same wave.
//!
//! # Algorithm
//!
//! A wave orders itself by the part of the graph it reaches, so a parent that
//! is not touched by the event never delays anything:
//!
//! 1. Publish the injected value
//! 2. Walk every node reachable from it, counting each one's in-wave parents
//! 3. Release the injected node's dependents; a node whose count drops to
//!    zero joins the ready queue if some parent published for it
//! 4. Pop the oldest ready node, recompute it with the parent slots that
//!    fired, and release its dependents; repeat from 4
//!
//! The ready queue is FIFO and dependents are released in registration
//! order, so siblings run in the order they subscribed. A node none of whose
//! parents published is skipped, but still releases its own dependents.
//!
//! # Failures
//!
//! A failing node (error or panic) is reported and its subtree is not
//! reached through it. Other pending nodes are unaffected.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::node::{Edge, Node, Propagate};
use super::{NodeId, Value};
use crate::error::PropagationError;
use crate::reactive::WaveContext;

/// One injected event, waiting to start its wave.
pub(crate) struct Injection {
    origin: NodeId,
    apply: Box<dyn FnOnce(&mut Wave) -> Result<(), PropagationError> + Send>,
}

impl Injection {
    /// Publish `value` on `node` and schedule its dependents.
    pub fn new<T: Value>(node: Arc<Node<T>>, value: T) -> Self {
        Self {
            origin: node.id(),
            apply: Box::new(move |wave| {
                node.seed(value)?;
                wave.start(Propagate::dependents(&*node));
                Ok(())
            }),
        }
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }
}

/// A node reached by the wave.
struct Pending {
    node: Arc<dyn Propagate>,
    /// Dependents as they were when the wave reached the node.
    edges: Vec<Edge>,
    /// Parent slots that published for it.
    fired: SmallVec<[usize; 4]>,
    /// In-wave parents that have not finished yet.
    waiting: usize,
}

/// Bookkeeping for a single wave.
pub(crate) struct Wave {
    pending: HashMap<NodeId, Pending>,
    ready: VecDeque<NodeId>,
    recomputed: usize,
}

impl Wave {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            ready: VecDeque::new(),
            recomputed: 0,
        }
    }

    /// Plan the wave below a node that just published, then release its
    /// dependents.
    pub fn start(&mut self, edges: Vec<Edge>) {
        self.plan(&edges);
        self.release(edges, true);
    }

    /// Count the in-wave parents of everything reachable from `roots`.
    ///
    /// Each edge between two reached nodes is counted exactly once, since a
    /// node's dependents are walked only on its first visit.
    fn plan(&mut self, roots: &[Edge]) {
        let mut stack: Vec<Edge> = roots.iter().rev().cloned().collect();
        while let Some(edge) = stack.pop() {
            match self.pending.entry(edge.child.id()) {
                Entry::Occupied(mut entry) => entry.get_mut().waiting += 1,
                Entry::Vacant(entry) => {
                    let edges = edge.child.dependents();
                    stack.extend(edges.iter().rev().cloned());
                    entry.insert(Pending {
                        node: edge.child,
                        edges,
                        fired: SmallVec::new(),
                        waiting: 1,
                    });
                }
            }
        }
    }

    /// Mark one parent as finished for each edge.
    ///
    /// Children that end up with nothing fired are skipped, and release their
    /// own dependents in turn.
    fn release(&mut self, edges: Vec<Edge>, published: bool) {
        let mut work = vec![(edges, published)];
        while let Some((edges, published)) = work.pop() {
            for edge in edges {
                let id = edge.child.id();
                let Some(pending) = self.pending.get_mut(&id) else {
                    // Subscribed during this wave.
                    continue;
                };
                if published && !pending.fired.contains(&edge.slot) {
                    pending.fired.push(edge.slot);
                }
                pending.waiting -= 1;
                if pending.waiting > 0 {
                    continue;
                }

                if pending.fired.is_empty() {
                    if let Some(skipped) = self.pending.remove(&id) {
                        work.push((skipped.edges, false));
                    }
                } else {
                    self.ready.push_back(id);
                }
            }
        }
    }

    /// Number of nodes recomputed so far.
    pub fn recomputed(&self) -> usize {
        self.recomputed
    }

    /// Process ready nodes until the wave is exhausted.
    pub fn run(&mut self, report: &mut dyn FnMut(PropagationError)) {
        while let Some(id) = self.ready.pop_front() {
            let Some(Pending {
                node, edges, fired, ..
            }) = self.pending.remove(&id)
            else {
                continue;
            };

            trace!(node = %id, fired = ?fired.as_slice(), "recomputing");
            self.recomputed += 1;

            let published = match guarded(id, || node.recompute(&fired)) {
                Ok(published) => published,
                Err(err) => {
                    warn!(node = %id, error = %err, "node update failed, subtree skipped");
                    report(err);
                    false
                }
            };
            self.release(edges, published);
        }
    }
}

impl Default for Wave {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `f`, turning a panic into a [`PropagationError::Panicked`].
pub(crate) fn guarded<R>(
    node: NodeId,
    f: impl FnOnce() -> Result<R, PropagationError>,
) -> Result<R, PropagationError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Err(PropagationError::Panicked { node, message })
    })
}

/// Run `first` as a wave on the current thread, followed by every injection
/// deferred while it (or a later follow-up) ran.
///
/// `clock` is the clock whose loop is calling, or `None` for an orphan wave
/// run by the injecting thread. Returns the number of waves run.
pub(crate) fn drive(
    clock: Option<NodeId>,
    first: Injection,
    report: &mut dyn FnMut(PropagationError),
) -> usize {
    let _scope = WaveContext::enter(clock);
    let mut next = Some(first);
    let mut waves = 0;

    while let Some(injection) = next.take() {
        let origin = injection.origin();
        let mut wave = Wave::new();

        match guarded(origin, || (injection.apply)(&mut wave)) {
            Ok(()) => wave.run(report),
            Err(err) => {
                warn!(node = %origin, error = %err, "injection rejected");
                report(err);
            }
        }

        waves += 1;
        debug!(
            clock = ?clock.map(|c| c.raw()),
            origin = %origin,
            recomputed = wave.recomputed(),
            "wave complete"
        );
        next = WaveContext::next_deferred();
    }

    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Outcome;
    use crate::graph::{Update, Upstream};
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn traced(node: &Arc<Node<i32>>, name: &'static str, log: &Log) {
        let log = log.clone();
        node.set_hook(Arc::new(move |_| log.lock().push(name)));
    }

    fn map(parent: &Arc<Node<i32>>, f: fn(i32) -> i32) -> Arc<Node<i32>> {
        let weak = Arc::downgrade(parent);
        Node::derive(
            &[&**parent as &dyn Upstream],
            Update::Unary(Box::new(move || {
                Ok(weak.upgrade().and_then(|p| p.value()).map(f))
            })),
        )
    }

    fn sum(parents: &[&Arc<Node<i32>>]) -> Arc<Node<i32>> {
        let weak: Vec<_> = parents.iter().map(|p| Arc::downgrade(*p)).collect();
        let ups: Vec<&dyn Upstream> = parents.iter().map(|p| &***p as &dyn Upstream).collect();
        Node::derive(
            &ups,
            Update::Combine(Box::new(move |_fired| {
                Ok(Some(
                    weak.iter()
                        .filter_map(|p| p.upgrade().and_then(|p| p.value()))
                        .sum(),
                ))
            })),
        )
    }

    fn run(node: &Arc<Node<i32>>, value: i32) -> Vec<PropagationError> {
        let mut errors = Vec::new();
        drive(None, Injection::new(node.clone(), value), &mut |e| {
            errors.push(e)
        });
        errors
    }

    #[test]
    fn chain_is_recomputed_in_order() {
        let log: Log = Arc::default();
        let a = Node::source(None);
        let b = map(&a, |x| x + 1);
        let c = map(&b, |x| x * 10);
        traced(&a, "a", &log);
        traced(&b, "b", &log);
        traced(&c, "c", &log);

        assert!(run(&a, 1).is_empty());
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(c.value(), Some(20));
    }

    #[test]
    fn diamond_recomputes_join_once_without_glitch() {
        let log: Log = Arc::default();
        let joined = Arc::new(Mutex::new(Vec::new()));
        let a = Node::source(None);
        let left = map(&a, |x| x + 1);
        let right = map(&a, |x| x * 2);
        let join = sum(&[&left, &right]);
        traced(&left, "left", &log);
        traced(&right, "right", &log);
        let sink = joined.clone();
        join.set_hook(Arc::new(move |v| sink.lock().push(*v)));

        run(&a, 1);
        run(&a, 5);

        assert_eq!(*log.lock(), vec!["left", "right", "left", "right"]);
        // (1 + 1) + (1 * 2), then (5 + 1) + (5 * 2); no half-updated sums.
        assert_eq!(*joined.lock(), vec![4, 16]);
    }

    #[test]
    fn uneven_paths_wait_for_the_deeper_parent() {
        let a = Node::source(None);
        let b = map(&a, |x| x + 1);
        let c = map(&b, |x| x + 1);
        let join = sum(&[&a, &c]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        join.set_hook(Arc::new(move |v| sink.lock().push(*v)));

        run(&a, 10);
        assert_eq!(*seen.lock(), vec![22]);
    }

    #[test]
    fn siblings_follow_registration_order_not_depth() {
        let log: Log = Arc::default();
        let a = Node::source(None);
        let z = Node::source(None);
        let z2 = map(&map(&z, |x| x), |x| x);
        // `c` sits deeper than `d` only because of a parent this wave never
        // touches.
        let c = sum(&[&a, &z2]);
        let d = map(&a, |x| x);
        traced(&c, "c", &log);
        traced(&d, "d", &log);

        assert!(run(&a, 1).is_empty());
        assert_eq!(*log.lock(), vec!["c", "d"]);
        assert_eq!(c.value(), Some(1));
    }

    #[test]
    fn breadth_first_across_levels() {
        let log: Log = Arc::default();
        let a = Node::source(None);
        let b = map(&a, |x| x);
        let below_b = map(&b, |x| x);
        let e = map(&a, |x| x);
        traced(&b, "b", &log);
        traced(&below_b, "below_b", &log);
        traced(&e, "e", &log);

        run(&a, 1);
        assert_eq!(*log.lock(), vec!["b", "e", "below_b"]);
    }

    #[test]
    fn declined_parent_still_releases_the_join() {
        let a = Node::source(None);
        let weak = Arc::downgrade(&a);
        let never = Node::<i32>::derive(
            &[&*a as &dyn Upstream],
            Update::Unary(Box::new(move || {
                Ok(weak.upgrade().and_then(|p| p.value()).filter(|_| false))
            })),
        );
        let below_never = map(&never, |x| x);
        let join = sum(&[&a, &below_never]);

        assert!(run(&a, 4).is_empty());
        assert_eq!(join.value(), Some(4));
        assert!(below_never.value().is_none());
    }

    #[test]
    fn failing_node_skips_only_its_subtree() {
        let log: Log = Arc::default();
        let a = Node::source(None);
        let weak = Arc::downgrade(&a);
        let bad = Node::derive(
            &[&*a as &dyn Upstream],
            Update::Unary(Box::new(move || {
                let v = weak.upgrade().and_then(|p| p.value()).unwrap_or_default();
                if v == 2 {
                    Err("two is not allowed".into())
                } else {
                    Ok(Some(v))
                }
            })),
        );
        let below_bad = map(&bad, |x| x);
        let good = map(&a, |x| x);
        let below_good = map(&good, |x| x);
        traced(&below_bad, "below_bad", &log);
        traced(&below_good, "below_good", &log);

        assert!(run(&a, 1).is_empty());
        let errors = run(&a, 2);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node(), bad.id());
        assert_eq!(*log.lock(), vec!["below_bad", "below_good", "below_good"]);
        assert_eq!(bad.value(), Some(1));
    }

    #[test]
    fn panicking_update_is_reported() {
        let a = Node::<i32>::source(None);
        let b = Node::<i32>::derive(
            &[&*a as &dyn Upstream],
            Update::Tick(Box::new(|| -> Outcome<i32> { panic!("boom") })),
        );

        let errors = run(&a, 1);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            PropagationError::Panicked { node, message } => {
                assert_eq!(*node, b.id());
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn declined_update_stops_the_edge() {
        let a = Node::source(None);
        let weak = Arc::downgrade(&a);
        let even = Node::derive(
            &[&*a as &dyn Upstream],
            Update::Unary(Box::new(move || {
                Ok(weak
                    .upgrade()
                    .and_then(|p| p.value())
                    .filter(|v: &i32| v % 2 == 0))
            })),
        );
        let below = map(&even, |x| x);

        run(&a, 3);
        assert!(below.value().is_none());
        run(&a, 4);
        assert_eq!(below.value(), Some(4));
    }
}
