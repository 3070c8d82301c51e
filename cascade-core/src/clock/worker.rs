//! Clock worker thread.
//!
//! Each clock owns exactly one OS thread running this loop. The loop is the
//! only place where nodes governed by the clock are mutated.
//!
//! # Loop
//!
//! ```text
//! Producer threads             Clock thread
//!     |                            |
//!     |--inject()----------------->| select! { inbox, timer }
//!     |   [inbox: unbounded]       | drive(wave + follow-ups)
//!     |                            | errors.try_send(..)
//!     |--start()------------------>| timer = tick(period)
//!     |--flush()------------------>| done.send(())
//!     |<--------------------------|
//! ```
//!
//! The loop exits when the inbox disconnects, which happens once the clock
//! node (the only owner of the sending side) is dropped.

use std::sync::Weak;
use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, tick, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::Command;
use crate::error::PropagationError;
use crate::graph::{drive, guarded, Injection, Node, NodeId, Value};

/// The time source of a self-ticking clock.
pub(crate) struct Ticker<C> {
    pub period: Duration,
    pub source: Box<dyn FnMut() -> C + Send>,
}

/// What woke the loop up.
enum Event {
    Command(Command),
    Tick,
    Closed,
}

pub(crate) struct Worker<C: Value> {
    id: NodeId,
    name: String,
    node: Weak<Node<C>>,
    inbox: Receiver<Command>,
    errors: Sender<PropagationError>,
    ticker: Option<Ticker<C>>,
}

impl<C: Value> Worker<C> {
    pub fn new(
        id: NodeId,
        name: String,
        node: Weak<Node<C>>,
        inbox: Receiver<Command>,
        errors: Sender<PropagationError>,
        ticker: Option<Ticker<C>>,
    ) -> Self {
        Self {
            id,
            name,
            node,
            inbox,
            errors,
            ticker,
        }
    }

    pub fn run(mut self) {
        debug!(clock = %self.id, name = %self.name, "clock loop started");

        // Timer ticks are not consumed until `Start` arrives.
        let mut timer: Receiver<Instant> = never();

        loop {
            let event = select! {
                recv(self.inbox) -> msg => msg.map_or(Event::Closed, Event::Command),
                recv(timer) -> _ => Event::Tick,
            };

            match event {
                Event::Command(Command::Inject(injection)) => self.wave(injection),
                Event::Command(Command::Start) => match &self.ticker {
                    Some(ticker) => {
                        info!(
                            clock = %self.id,
                            name = %self.name,
                            period_ms = u64::try_from(ticker.period.as_millis()).unwrap_or(u64::MAX),
                            "clock started"
                        );
                        timer = tick(ticker.period);
                    }
                    None => debug!(clock = %self.id, "start ignored by manual clock"),
                },
                Event::Command(Command::Flush(done)) => {
                    let _ = done.send(());
                }
                Event::Tick => {
                    if !self.tick() {
                        break;
                    }
                }
                Event::Closed => break,
            }
        }

        debug!(clock = %self.id, name = %self.name, "clock loop stopped");
    }

    /// Inject the next timer value into the clock node.
    ///
    /// Returns false once the clock node is gone.
    fn tick(&mut self) -> bool {
        let Some(node) = self.node.upgrade() else {
            return false;
        };
        let Some(ticker) = self.ticker.as_mut() else {
            return true;
        };

        match guarded(self.id, || Ok((ticker.source)())) {
            Ok(now) => self.wave(Injection::new(node, now)),
            Err(err) => self.report(err),
        }
        true
    }

    fn wave(&self, injection: Injection) {
        drive(Some(self.id), injection, &mut |err| self.report(err));
    }

    fn report(&self, err: PropagationError) {
        match self.errors.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(err)) => {
                warn!(clock = %self.id, error = %err, "error channel full, report dropped");
            }
            // Nobody is listening any more.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
