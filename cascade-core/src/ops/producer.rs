//! Event producers driven by a timeline stream.
//!
//! Usually applied to a clock's own stream, but any stream of ordered tick
//! values will do.

use crate::clock::Timeline;
use crate::graph::Value;
use crate::reactive::Stream;

/// Tracks the last time a producer fired.
struct Cadence<C: Timeline> {
    interval: C::Span,
    last: Option<C>,
}

impl<C: Timeline> Cadence<C> {
    fn new(interval: C::Span) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether `now` is at least one interval after the last firing.
    /// Records `now` as the last firing when it is.
    fn due(&mut self, now: &C) -> bool {
        let due = self
            .last
            .as_ref()
            .map_or(true, |last| now.since(last) >= self.interval);
        if due {
            self.last = Some(now.clone());
        }
        due
    }
}

impl<C: Timeline> Stream<C> {
    /// Forward a tick at most once every `interval`.
    pub fn repeat(&self, interval: C::Span) -> Stream<C> {
        let mut cadence = Cadence::new(interval);
        self.subscribe(move |now: &C| Ok(cadence.due(now).then(|| now.clone())))
    }

    /// Publish the next item of `items` every `interval`, until it runs out.
    pub fn sequence<S, I>(&self, interval: C::Span, items: I) -> Stream<S>
    where
        S: Value,
        I: IntoIterator<Item = S>,
        I::IntoIter: Send + 'static,
    {
        let mut cadence = Cadence::new(interval);
        let mut items = items.into_iter();
        self.subscribe(move |now: &C| Ok(if cadence.due(now) { items.next() } else { None }))
    }
}
