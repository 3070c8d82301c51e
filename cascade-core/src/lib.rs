//! Cascade Core
//!
//! This crate provides clock-serialized, glitch-free event stream graphs.
//! It implements:
//!
//! - Streams: nodes of a live dependency graph holding their latest event
//! - Waves: deterministic, exactly-once propagation of one event
//! - Clocks: single-threaded loops serializing every wave of their graph
//! - An operator library and an async bridge built on top of those
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Nodes, the wave scheduler and clock governance
//! - `reactive`: The [`Stream`] handle and the re-entrancy context
//! - `clock`: Clock construction, configuration and the worker loop
//! - `ops`: Operators composed from subscriptions
//! - `bridge`: Async stream transforms on a tokio runtime
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_core::{Clock, ClockConfig};
//!
//! // A clock and a source it governs
//! let clock = Clock::<u64>::manual(ClockConfig::named("prices"))?;
//! let price = clock.source::<f64>();
//!
//! // Derived streams recompute on the clock's thread
//! let rounded = price.map(|p: &f64| p.round());
//! rounded.set_hook(|p| println!("price: {p}"));
//!
//! price.inject(41.7)?;
//! clock.flush()?;
//! // prints "price: 42"
//! ```

pub mod bridge;
pub mod clock;
pub mod error;
pub mod graph;
pub mod ops;
pub mod reactive;

pub use bridge::Incoming;
pub use clock::{Clock, ClockConfig, ClockStarter, Timeline};
pub use error::{ConfigError, InjectError, Outcome, PropagationError, UpdateError};
pub use graph::{resolve_clock, ClockRef, NodeId, Value};
pub use reactive::{Inputs, Pair, Stream, WaveContext};
