//! Streams
//!
//! This module implements the user-facing handle on the dependency graph.
//!
//! # Concepts
//!
//! ## Streams
//!
//! A Stream is a time-varying sequence of discrete events. It remembers only
//! the latest event. Events enter the graph through `inject` and travel
//! downstream to every stream computed from the injected one.
//!
//! ## Subscriptions
//!
//! Subscribing creates a new derived stream together with its update
//! function. Whenever a parent publishes, the update function runs and its
//! result (if any) is published on the derived stream. The update can read
//! one parent (`subscribe`), ignore its parent's value (`subscribe_tick`), or
//! combine several parents (`subscribe_many`, `subscribe_pair`).
//!
//! ## Hooks
//!
//! Each stream may carry one observer called with every value it publishes.
//! Hooks run synchronously inside the wave.
//!
//! # Implementation Notes
//!
//! Streams never recompute on their own thread: a governed stream hands its
//! events to its clock, and an orphan stream runs the wave in the caller. A
//! thread-local wave context lets update functions inject back into the graph
//! without starting a nested wave.

mod context;
mod stream;

pub use context::WaveContext;
pub use stream::{Inputs, Pair, Stream};
