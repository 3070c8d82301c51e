//! Operator Library
//!
//! Ready-made stream operators, written purely in terms of `subscribe`,
//! `subscribe_many`, `subscribe_pair` and `inject`. None of them adds any
//! propagation semantics of its own.
//!
//! # Families
//!
//! - [`unary`]: map, try_map, filter, scan, window, diff, changed, dedup,
//!   skip, each
//! - [`multiary`]: merge, merge_tagged
//! - [`nested`]: flatten, split_by
//! - [`producer`]: repeat, sequence
//! - [`timely`]: delay, timeout
//!
//! Operators that publish from a follow-up wave (flatten, split_by, delay)
//! own an output source stream and inject into it. Everything else derives
//! its output directly, so the output is recomputed in the same wave as its
//! input.

pub mod multiary;
pub mod nested;
pub mod producer;
pub mod timely;
pub mod unary;
