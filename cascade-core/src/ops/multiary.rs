//! Multi-parent operators.

use crate::graph::Value;
use crate::reactive::Stream;

impl<T: Value> Stream<T> {
    /// Forward events from any of `streams`.
    ///
    /// When several parents publish in the same wave, the value of the first
    /// one to publish wins. The result is governed according to the combine
    /// rule: a shared clock is kept, mixed clocks give an orphan.
    pub fn merge(streams: &[Stream<T>]) -> Stream<T> {
        Stream::subscribe_many(streams, |inputs| {
            Ok(inputs.first_fired().map(|(_, value)| value.clone()))
        })
    }

    /// Like [`merge`](Self::merge), tagging each event with the topic of the
    /// stream it came from.
    pub fn merge_tagged<K: Value>(tagged: &[(K, Stream<T>)]) -> Stream<(K, T)> {
        let (topics, streams): (Vec<K>, Vec<Stream<T>>) = tagged.iter().cloned().unzip();
        Stream::subscribe_many(&streams, move |inputs| {
            Ok(inputs
                .first_fired()
                .and_then(|(i, value)| Some((topics.get(i)?.clone(), value.clone()))))
        })
    }
}
