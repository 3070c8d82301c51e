//! Streams of streams.

use std::hash::Hash;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::trace;

use crate::error::Outcome;
use crate::graph::Value;
use crate::reactive::Stream;

impl<T: Value> Stream<Stream<T>> {
    /// Forward every event of every inner stream to one output stream.
    ///
    /// Inner streams are picked up as they are published; events an inner
    /// stream published earlier are not replayed. Each forwarded event is a
    /// new wave on the output.
    pub fn flatten(&self) -> Stream<T> {
        let out = Stream::source(self.clock().as_ref());
        let target = out.clone();

        self.each(move |inner: &Stream<T>| {
            let target = target.clone();
            let _ = inner.subscribe(move |value: &T| -> Outcome<()> {
                target.inject(value.clone())?;
                Ok(None)
            });
        });

        out
    }
}

impl<T: Value> Stream<T> {
    /// Split events into one substream per key.
    ///
    /// The returned stream publishes a new substream the first time a key is
    /// seen; that event and every later one with the same key are then
    /// injected into the substream. A key with no events for longer than
    /// `stale` (wall time) is forgotten, so its next event opens a fresh
    /// substream.
    pub fn split_by<K, F>(&self, mut key: F, stale: Duration) -> Stream<Stream<T>>
    where
        K: Eq + Hash + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
    {
        let clock = self.clock();
        let mut open: IndexMap<K, (Stream<T>, Instant)> = IndexMap::new();

        self.subscribe(move |value: &T| {
            let now = Instant::now();
            let before = open.len();
            open.retain(|_, (_, seen)| now.duration_since(*seen) <= stale);
            if open.len() < before {
                trace!(forgotten = before - open.len(), "stale substreams dropped");
            }

            let k = key(value);
            if let Some((sub, seen)) = open.get_mut(&k) {
                *seen = now;
                sub.inject(value.clone())?;
                return Ok(None);
            }

            // The first event lands after this wave, once the new substream
            // has been published.
            let sub = Stream::source(clock.as_ref());
            sub.inject(value.clone())?;
            open.insert(k, (sub.clone(), now));
            Ok(Some(sub))
        })
    }
}
