//! Tick values that support subtraction.
//!
//! Time-sensitive operators measure spans between two ticks of a clock, so
//! they only accept clocks whose tick type implements [`Timeline`].

use std::time::{Duration, Instant};

use crate::graph::Value;

/// An ordered tick type with a notion of elapsed span.
pub trait Timeline: Value + PartialOrd {
    /// Distance between two ticks.
    type Span: Value + PartialOrd;

    /// Span elapsed from `earlier` to `self`.
    fn since(&self, earlier: &Self) -> Self::Span;
}

macro_rules! unsigned_timeline {
    ($($ty:ty),*) => {
        $(
            impl Timeline for $ty {
                type Span = $ty;

                fn since(&self, earlier: &Self) -> Self::Span {
                    self.saturating_sub(*earlier)
                }
            }
        )*
    };
}

unsigned_timeline!(u32, u64, usize);

impl Timeline for i64 {
    type Span = i64;

    fn since(&self, earlier: &Self) -> Self::Span {
        self.saturating_sub(*earlier)
    }
}

impl Timeline for f64 {
    type Span = f64;

    fn since(&self, earlier: &Self) -> Self::Span {
        self - earlier
    }
}

impl Timeline for Duration {
    type Span = Duration;

    fn since(&self, earlier: &Self) -> Self::Span {
        self.saturating_sub(*earlier)
    }
}

impl Timeline for Instant {
    type Span = Duration;

    fn since(&self, earlier: &Self) -> Self::Span {
        self.saturating_duration_since(*earlier)
    }
}
