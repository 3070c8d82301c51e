//! Wave Context
//!
//! The wave context records, per thread, whether a wave is currently running
//! and on behalf of which clock. It is what makes re-entrant injection safe:
//! an update function that injects into a node of the same graph must not
//! start a second wave in the middle of the first.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering a wave pushes an entry; the guard
//! pops it on drop. Injections that belong to the running wave's clock (or
//! to no clock at all) are parked on the entry and handed back, in FIFO
//! order, once the current wave has completed.

use std::cell::RefCell;
use std::collections::VecDeque;

use tracing::warn;

use crate::graph::{Injection, NodeId};

thread_local! {
    static WAVE_STACK: RefCell<Vec<WaveEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the wave context stack.
struct WaveEntry {
    /// Clock whose loop runs the wave, `None` for an orphan wave.
    clock: Option<NodeId>,
    /// Injections waiting for the current wave to finish.
    deferred: VecDeque<Injection>,
}

/// Guard that pops the context when dropped.
pub struct WaveContext {
    clock: Option<NodeId>,
}

impl WaveContext {
    /// Mark the current thread as running waves for `clock`.
    pub(crate) fn enter(clock: Option<NodeId>) -> Self {
        WAVE_STACK.with(|stack| {
            stack.borrow_mut().push(WaveEntry {
                clock,
                deferred: VecDeque::new(),
            });
        });

        Self { clock }
    }

    /// Check if a wave is running on this thread.
    pub fn is_active() -> bool {
        WAVE_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The clock of the wave running on this thread.
    ///
    /// `None` when no wave runs, `Some(None)` inside an orphan wave.
    pub fn current_clock() -> Option<Option<NodeId>> {
        WAVE_STACK.with(|stack| stack.borrow().last().map(|entry| entry.clock))
    }

    /// Park `injection` if it belongs to the wave running on this thread.
    ///
    /// An injection belongs to the running wave when its target is an
    /// orphan, or is governed by the clock the wave runs for. Anything else
    /// is handed back to the caller for routing.
    pub(crate) fn defer(target: Option<NodeId>, injection: Injection) -> Result<(), Injection> {
        WAVE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last_mut() {
                Some(entry) if target.is_none() || target == entry.clock => {
                    entry.deferred.push_back(injection);
                    Ok(())
                }
                _ => Err(injection),
            }
        })
    }

    /// Take the next parked injection of the innermost wave.
    pub(crate) fn next_deferred() -> Option<Injection> {
        WAVE_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .and_then(|entry| entry.deferred.pop_front())
        })
    }
}

impl Drop for WaveContext {
    fn drop(&mut self) {
        WAVE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.clock, self.clock,
                    "WaveContext mismatch: expected {:?}, got {:?}",
                    self.clock, entry.clock
                );
                if !entry.deferred.is_empty() {
                    warn!(
                        dropped = entry.deferred.len(),
                        "wave context closed with injections still parked"
                    );
                }
            }
        });
    }
}
