//! Operators that measure time in clock ticks.
//!
//! Both need a governing clock whose ticks can be subtracted and never
//! decrease. Building them over anything else fails with a [`ConfigError`]
//! instead of misbehaving later.

use std::collections::VecDeque;

use crate::clock::{timeline_of, Timeline};
use crate::error::{ConfigError, Outcome};
use crate::graph::Value;
use crate::reactive::Stream;

impl<T: Value> Stream<T> {
    /// Re-publish every event `amount` later, measured on the clock of type
    /// `C` governing this stream.
    ///
    /// On every tick, buffered events whose arrival tick is at least `amount`
    /// before the current tick are released in arrival order, each as its own
    /// wave. Events arriving before the first tick count as arriving at it.
    ///
    /// ```rust,ignore
    /// let delayed = src.delay::<u64>(2)?;
    /// ```
    pub fn delay<C: Timeline>(&self, amount: C::Span) -> Result<Stream<T>, ConfigError> {
        let ticks = timeline_of::<T, C>(self, "delay")?;
        let out = Stream::source(self.clock().as_ref());
        let target = out.clone();
        let mut pending: VecDeque<(Option<C>, T)> = VecDeque::new();

        let _ = self.subscribe_pair(&ticks, move |pair| -> Outcome<()> {
            if pair.right_fired() {
                if let Some(now) = pair.right() {
                    for (stamp, _) in pending.iter_mut() {
                        stamp.get_or_insert_with(|| now.clone());
                    }
                    while pending
                        .front()
                        .and_then(|(stamp, _)| stamp.as_ref())
                        .is_some_and(|stamp| now.since(stamp) >= amount)
                    {
                        if let Some((_, value)) = pending.pop_front() {
                            target.inject(value)?;
                        }
                    }
                }
            }

            if pair.left_fired() {
                if let Some(value) = pair.left() {
                    pending.push_back((pair.right().cloned(), value.clone()));
                }
            }
            Ok(None)
        });

        Ok(out)
    }

    /// Publish the current tick whenever `after` has passed without an event
    /// on this stream.
    ///
    /// The window opens at the first tick seen, is reset by every event, and
    /// is reset again by each firing.
    pub fn timeout<C: Timeline>(&self, after: C::Span) -> Result<Stream<C>, ConfigError> {
        let ticks = timeline_of::<T, C>(self, "timeout")?;
        let mut start: Option<C> = None;

        Ok(self.subscribe_pair(&ticks, move |pair| {
            let Some(now) = pair.right() else {
                return Ok(None);
            };
            if pair.left_fired() {
                start = Some(now.clone());
                return Ok(None);
            }

            let elapsed = now.since(start.get_or_insert_with(|| now.clone()));
            if elapsed > after {
                start = Some(now.clone());
                Ok(Some(now.clone()))
            } else {
                Ok(None)
            }
        }))
    }

    /// Publish the current tick when a request on this stream goes
    /// unanswered on `responds` for longer than `after`.
    ///
    /// Each request (re)starts the window and each response closes it. A
    /// window fires at most once. Requests made before the first tick start
    /// their window at it. `responds` may be this stream itself, in which
    /// case every event restarts the window.
    pub fn timeout_on<C, R>(
        &self,
        responds: &Stream<R>,
        after: C::Span,
    ) -> Result<Stream<C>, ConfigError>
    where
        C: Timeline,
        R: Value,
    {
        let ticks = timeline_of::<T, C>(self, "timeout_on")?;
        if responds.clock() != self.clock() {
            return Err(ConfigError::ForeignClock {
                operator: "timeout_on",
                clock: ticks.id(),
            });
        }

        // `true` for a request, `false` for a response.
        let events = Stream::merge(&[
            self.subscribe_tick(|| Ok(Some(true))),
            responds.subscribe_tick(|| Ok(Some(false))),
        ]);
        // `Some(start)` while a request is waiting; `start` is unset until
        // the first tick.
        let mut window: Option<Option<C>> = None;

        Ok(events.subscribe_pair(&ticks, move |pair| {
            let mut fired = None;
            if pair.right_fired() {
                if let (Some(now), Some(start)) = (pair.right(), window.as_mut()) {
                    let start = start.get_or_insert_with(|| now.clone());
                    if now.since(start) > after {
                        window = None;
                        fired = Some(now.clone());
                    }
                }
            }

            if pair.left_fired() {
                window = (pair.left() == Some(&true)).then(|| pair.right().cloned());
            }
            Ok(fired)
        }))
    }
}
