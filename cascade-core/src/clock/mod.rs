//! Clocks
//!
//! A clock is a stream that is its own governing clock, plus the single
//! thread that serializes every wave touching the nodes it governs.
//!
//! # Kinds
//!
//! - **Manual** clocks advance only when [`Clock::tick`] is called. Their
//!   ticks may be arbitrary values and need not increase, unless the clock
//!   was built with [`Clock::manual_monotonic`].
//! - **Self-ticking** clocks inject the next value of a time source every
//!   period, starting once the returned [`ClockStarter`] is used. Their ticks
//!   must never decrease.
//!
//! # Errors
//!
//! A failing node never stops the clock. Its error is sent to the clock's
//! bounded error channel (see [`Clock::errors`]) and the loop returns to
//! idle.

mod config;
mod timeline;
mod worker;

use std::any::{type_name, Any};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

pub use config::ClockConfig;
pub use timeline::Timeline;

use crate::error::{ConfigError, InjectError, PropagationError};
use crate::graph::{ClockRef, Injection, Node, NodeId, Value};
use crate::reactive::{Stream, WaveContext};
use worker::{Ticker, Worker};

/// Messages accepted by a clock's loop, processed in arrival order.
pub(crate) enum Command {
    /// Run a wave for an injected event.
    Inject(Injection),
    /// Begin consuming timer ticks.
    Start,
    /// Reply once everything queued before this message has run.
    Flush(Sender<()>),
}

/// Admission check run before a clock publishes a tick.
type Gate = Box<dyn FnMut(&dyn Any) -> bool + Send>;

/// Shared state of a clock, owned by the clock node.
pub(crate) struct ClockCore {
    id: NodeId,
    monotonic: bool,
    tick_type: &'static str,
    node: OnceLock<Weak<dyn Any + Send + Sync>>,
    inbox: Sender<Command>,
    gate: Option<Mutex<Gate>>,
}

impl ClockCore {
    pub fn monotonic(&self) -> bool {
        self.monotonic
    }

    pub fn send(&self, command: Command) -> Result<(), InjectError> {
        self.inbox
            .send(command)
            .map_err(|_| InjectError::ClockStopped { clock: self.id })
    }

    /// Whether `value` may be published as the next tick.
    pub fn admit<T: 'static>(&self, value: &T) -> bool {
        match &self.gate {
            Some(gate) => {
                let mut gate = gate.lock();
                (*gate)(value)
            }
            None => true,
        }
    }

    /// The clock's own stream, if its ticks are of type `C`.
    pub fn stream<C: Value>(&self) -> Option<Stream<C>> {
        let node = self.node.get()?.upgrade()?;
        node.downcast::<Node<C>>().ok().map(Stream::from_node)
    }

    pub fn tick_type(&self) -> &'static str {
        self.tick_type
    }
}

/// Look up the timeline of the clock governing `stream`.
///
/// Used by operators that measure time between ticks.
pub(crate) fn timeline_of<T: Value, C: Timeline>(
    stream: &Stream<T>,
    operator: &'static str,
) -> Result<Stream<C>, ConfigError> {
    let clock = stream.clock().ok_or(ConfigError::Ungoverned { operator })?;
    let core = clock
        .core()
        .ok_or(ConfigError::ClockDropped { clock: clock.id() })?;

    if !core.monotonic() {
        return Err(ConfigError::NotMonotonic {
            operator,
            clock: clock.id(),
        });
    }

    core.stream::<C>().ok_or(ConfigError::ClockValueMismatch {
        operator,
        clock: clock.id(),
        actual: core.tick_type(),
    })
}

/// A clock stream with ticks of type `C`, and its serializing loop.
///
/// Dropping every handle to the clock (including streams of the clock node
/// itself) stops its loop.
pub struct Clock<C: Value> {
    stream: Stream<C>,
    handle: ClockRef,
    name: String,
    errors: Receiver<PropagationError>,
}

impl<C: Value> Clock<C> {
    /// Create a manual clock. Ticks may be any value, in any order.
    pub fn manual(config: ClockConfig) -> Result<Self, ConfigError> {
        Self::spawn(&config, false, None, None)
    }

    fn spawn(
        config: &ClockConfig,
        monotonic: bool,
        gate: Option<Gate>,
        ticker: Option<Ticker<C>>,
    ) -> Result<Self, ConfigError> {
        let (inbox, commands) = crossbeam_channel::unbounded();
        let (report, errors) = crossbeam_channel::bounded(config.error_capacity.max(1));

        let id = NodeId::new();
        let core = Arc::new(ClockCore {
            id,
            monotonic,
            tick_type: type_name::<C>(),
            node: OnceLock::new(),
            inbox,
            gate: gate.map(Mutex::new),
        });
        let handle = ClockRef::new(id, Arc::downgrade(&core));

        let node = Arc::new(Node::<C>::for_clock(id, core.clone()));
        let weak = Arc::downgrade(&node);
        let erased: Weak<dyn Any + Send + Sync> = weak;
        let _ = core.node.set(erased);
        drop(core);

        let worker = Worker::new(
            id,
            config.name.clone(),
            Arc::downgrade(&node),
            commands,
            report,
            ticker,
        );
        thread::Builder::new()
            .name(format!("cascade-clock-{}", config.name))
            .spawn(move || worker.run())
            .map_err(|source| ConfigError::Spawn {
                name: config.name.clone(),
                source,
            })?;

        debug!(
            clock = %id,
            name = %config.name,
            monotonic,
            tick_type = type_name::<C>(),
            "clock created"
        );

        Ok(Self {
            stream: Stream::from_node(node),
            handle,
            name: config.name.clone(),
            errors,
        })
    }

    /// The clock's own stream. Subscribe to it to react to ticks.
    pub fn stream(&self) -> &Stream<C> {
        &self.stream
    }

    pub fn id(&self) -> NodeId {
        self.handle.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Weak reference used to govern new source streams.
    pub fn handle(&self) -> ClockRef {
        self.handle.clone()
    }

    /// Whether ticks are checked to never decrease.
    pub fn is_monotonic(&self) -> bool {
        self.handle.is_monotonic()
    }

    /// Create a source stream governed by this clock.
    pub fn source<T: Value>(&self) -> Stream<T> {
        Stream::source(Some(&self.handle))
    }

    /// Inject a tick. Runs on the clock's loop.
    pub fn tick(&self, now: C) -> Result<(), InjectError> {
        self.stream.inject(now)
    }

    /// The latest tick.
    pub fn now(&self) -> Option<C> {
        self.stream.value()
    }

    /// Receiving end of the clock's error channel.
    pub fn errors(&self) -> Receiver<PropagationError> {
        self.errors.clone()
    }

    /// Block until every event queued on this clock before the call, and
    /// every follow-up wave they caused, has been processed.
    ///
    /// Refused with [`InjectError::FlushFromWave`] when called from inside
    /// any clock's wave, this one's or another's.
    pub fn flush(&self) -> Result<(), InjectError> {
        let clock = self.id();
        if matches!(WaveContext::current_clock(), Some(Some(_))) {
            return Err(InjectError::FlushFromWave { clock });
        }

        let core = self.handle.core().ok_or(InjectError::ClockStopped { clock })?;
        let (done, wait) = crossbeam_channel::bounded(1);
        core.send(Command::Flush(done))?;
        drop(core);

        wait.recv().map_err(|_| InjectError::ClockStopped { clock })
    }
}

impl<C: Timeline> Clock<C> {
    /// Create a manual clock that rejects ticks smaller than the previous one.
    pub fn manual_monotonic(config: ClockConfig) -> Result<Self, ConfigError> {
        Self::spawn(&config, true, Some(monotonic_gate::<C>()), None)
    }

    /// Create a self-ticking clock fed by `source` every `config.period()`.
    ///
    /// The clock does not tick until [`ClockStarter::start`] is called.
    pub fn self_ticking<F>(config: ClockConfig, source: F) -> Result<(Self, ClockStarter), ConfigError>
    where
        F: FnMut() -> C + Send + 'static,
    {
        let ticker = Ticker {
            period: config.period()?,
            source: Box::new(source),
        };
        let clock = Self::spawn(&config, true, Some(monotonic_gate::<C>()), Some(ticker))?;
        let starter = ClockStarter {
            clock: clock.handle(),
        };
        Ok((clock, starter))
    }
}

impl Clock<u64> {
    /// Self-ticking clock counting `0, 1, 2, ...`.
    pub fn counting(config: ClockConfig) -> Result<(Self, ClockStarter), ConfigError> {
        let mut next = 0u64;
        Self::self_ticking(config, move || {
            let now = next;
            next += 1;
            now
        })
    }
}

impl Clock<Duration> {
    /// Self-ticking clock of the time elapsed since its first tick.
    pub fn elapsed(config: ClockConfig) -> Result<(Self, ClockStarter), ConfigError> {
        let mut origin: Option<Instant> = None;
        Self::self_ticking(config, move || {
            origin.get_or_insert_with(Instant::now).elapsed()
        })
    }
}

impl<C: Value> Clone for Clock<C> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            handle: self.handle.clone(),
            name: self.name.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<C: Value> std::fmt::Debug for Clock<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("monotonic", &self.is_monotonic())
            .finish()
    }
}

fn monotonic_gate<C: Timeline>() -> Gate {
    let mut last: Option<C> = None;
    Box::new(move |value: &dyn Any| {
        let Some(value) = value.downcast_ref::<C>() else {
            return true;
        };
        if last.as_ref().is_some_and(|last| value < last) {
            return false;
        }
        last = Some(value.clone());
        true
    })
}

/// One-shot capability that starts a self-ticking clock.
#[derive(Debug)]
pub struct ClockStarter {
    clock: ClockRef,
}

impl ClockStarter {
    /// Begin consuming timer ticks.
    pub fn start(self) -> Result<(), InjectError> {
        let clock = self.clock.id();
        let core = self.clock.core().ok_or(InjectError::ClockStopped { clock })?;
        core.send(Command::Start)
    }
}
