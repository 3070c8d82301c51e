//! Clock Governance
//!
//! Every node is either governed by exactly one clock or is an orphan.
//! A clock is the only thread allowed to mutate the nodes it governs, so
//! whenever an operator combines several upstream nodes we must decide which
//! clock (if any) governs the result.
//!
//! # Combine Rule
//!
//! Collect the distinct clocks among the parents, ignoring orphans:
//!
//! - none: the result is an orphan
//! - exactly one: the result inherits it
//! - more than one: the result is an orphan
//!
//! Mixing clocks is never resolved automatically; two independently
//! serialized loops cannot share a node safely.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::debug;

use super::scheduler::Injection;
use super::NodeId;
use crate::clock::{ClockCore, Command};
use crate::error::InjectError;

/// Weak, cloneable reference to a clock.
///
/// Two references are equal when they refer to the same clock.
#[derive(Clone)]
pub struct ClockRef {
    id: NodeId,
    core: Weak<ClockCore>,
}

impl ClockRef {
    pub(crate) fn new(id: NodeId, core: Weak<ClockCore>) -> Self {
        Self { id, core }
    }

    /// The node ID of the clock.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Whether the clock still exists.
    pub fn is_alive(&self) -> bool {
        self.core.strong_count() > 0
    }

    /// Whether the clock promises non-decreasing ticks.
    pub fn is_monotonic(&self) -> bool {
        self.core().is_some_and(|core| core.monotonic())
    }

    pub(crate) fn core(&self) -> Option<Arc<ClockCore>> {
        self.core.upgrade()
    }

    /// Hand an injection to the clock's loop.
    pub(crate) fn submit(&self, injection: Injection) -> Result<(), InjectError> {
        let core = self
            .core()
            .ok_or(InjectError::ClockStopped { clock: self.id })?;
        core.send(Command::Inject(injection))
    }
}

impl PartialEq for ClockRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClockRef {}

impl fmt::Debug for ClockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockRef")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Decide the governing clock of a node combining several parents.
pub fn resolve_clock<'a, I>(parents: I) -> Option<ClockRef>
where
    I: IntoIterator<Item = Option<&'a ClockRef>>,
{
    let mut found: Option<&ClockRef> = None;

    for clock in parents.into_iter().flatten() {
        match found {
            None => found = Some(clock),
            Some(current) if current == clock => {}
            Some(current) => {
                debug!(
                    first = %current.id(),
                    second = %clock.id(),
                    "combining nodes from different clocks, result is orphan"
                );
                return None;
            }
        }
    }

    found.cloned()
}

#[cfg(test)]
pub(crate) fn detached_clock() -> ClockRef {
    ClockRef::new(NodeId::new(), Weak::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_clocks_resolve_to_orphan() {
        assert_eq!(resolve_clock([None, None]), None);
        assert_eq!(resolve_clock(std::iter::empty()), None);
    }

    #[test]
    fn single_clock_is_inherited() {
        let clock = detached_clock();
        assert_eq!(resolve_clock([Some(&clock)]), Some(clock.clone()));
        assert_eq!(
            resolve_clock([None, Some(&clock), Some(&clock)]),
            Some(clock.clone())
        );
    }

    #[test]
    fn distinct_clocks_resolve_to_orphan() {
        let a = detached_clock();
        let b = detached_clock();
        assert_eq!(resolve_clock([Some(&a), Some(&b)]), None);
        assert_eq!(resolve_clock([Some(&a), None, Some(&a), Some(&b)]), None);
    }

    #[test]
    fn detached_clock_reports_dead() {
        let clock = detached_clock();
        assert!(!clock.is_alive());
        assert!(!clock.is_monotonic());
        assert!(clock.core().is_none());
    }
}
