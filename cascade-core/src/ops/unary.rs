//! Single-parent operators.
//!
//! Each of these derives one stream from one parent with `subscribe`, so the
//! result is always governed by the parent's clock.

use std::collections::VecDeque;

use crate::error::UpdateError;
use crate::graph::Value;
use crate::reactive::Stream;

impl<T: Value> Stream<T> {
    /// Apply `f` to every event.
    ///
    /// ```rust,ignore
    /// let src = Stream::orphan();
    /// let plus_three = src.map(|x: &i32| x + 3);
    /// src.inject(5)?; // plus_three publishes 8
    /// ```
    pub fn map<U, F>(&self, mut f: F) -> Stream<U>
    where
        U: Value,
        F: FnMut(&T) -> U + Send + 'static,
    {
        self.subscribe(move |value| Ok(Some(f(value))))
    }

    /// Apply a fallible `f` to every event. Errors are reported on the wave
    /// like any other update failure.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Stream<U>
    where
        U: Value,
        E: Into<UpdateError>,
        F: FnMut(&T) -> Result<U, E> + Send + 'static,
    {
        self.subscribe(move |value| f(value).map(Some).map_err(Into::into))
    }

    /// Keep only events matching `keep`.
    pub fn filter<F>(&self, mut keep: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.subscribe(move |value| Ok(keep(value).then(|| value.clone())))
    }

    /// Running accumulation of every event, starting from `init`.
    pub fn scan<S, F>(&self, init: S, mut f: F) -> Stream<S>
    where
        S: Value,
        F: FnMut(&S, &T) -> S + Send + 'static,
    {
        let mut acc = init;
        self.subscribe(move |value| {
            acc = f(&acc, value);
            Ok(Some(acc.clone()))
        })
    }

    /// Like [`scan`](Self::scan), seeded with the first event instead of an
    /// initial value. The first event is published unchanged.
    pub fn scan1<F>(&self, mut f: F) -> Stream<T>
    where
        F: FnMut(&T, &T) -> T + Send + 'static,
    {
        let mut acc: Option<T> = None;
        self.subscribe(move |value| {
            let next = match acc.take() {
                Some(acc) => f(&acc, value),
                None => value.clone(),
            };
            acc = Some(next.clone());
            Ok(Some(next))
        })
    }

    /// Sliding window of the last `width` events, oldest first.
    ///
    /// The first windows are shorter until `width` events have arrived.
    pub fn window(&self, width: usize) -> Stream<Vec<T>> {
        let mut buffer = VecDeque::with_capacity(width);
        self.subscribe(move |value: &T| {
            if width == 0 {
                return Ok(Some(Vec::new()));
            }
            if buffer.len() == width {
                buffer.pop_front();
            }
            buffer.push_back(value.clone());
            Ok(Some(buffer.iter().cloned().collect()))
        })
    }

    /// Combine every event with the one before it, `init` standing in for
    /// the event before the first.
    pub fn diff<U, F>(&self, init: T, mut f: F) -> Stream<U>
    where
        U: Value,
        F: FnMut(&T, &T) -> U + Send + 'static,
    {
        let mut last = init;
        self.subscribe(move |value| {
            let out = f(&last, value);
            last = value.clone();
            Ok(Some(out))
        })
    }

    /// Like [`diff`](Self::diff) with no event before the first: the first
    /// event is published unchanged.
    pub fn diff1<F>(&self, mut f: F) -> Stream<T>
    where
        F: FnMut(&T, &T) -> T + Send + 'static,
    {
        let mut last: Option<T> = None;
        self.subscribe(move |value| {
            let out = match last.replace(value.clone()) {
                Some(last) => f(&last, value),
                None => value.clone(),
            };
            Ok(Some(out))
        })
    }

    /// Forward an event only when `same(previous, current)` is false.
    /// The first event is always forwarded.
    pub fn changed<F>(&self, mut same: F) -> Stream<T>
    where
        F: FnMut(&T, &T) -> bool + Send + 'static,
    {
        let mut last: Option<T> = None;
        self.subscribe(move |value| {
            let forward = last.as_ref().map_or(true, |last| !same(last, value));
            last = Some(value.clone());
            Ok(forward.then(|| value.clone()))
        })
    }

    /// Drop consecutive duplicates.
    pub fn dedup(&self) -> Stream<T>
    where
        T: PartialEq,
    {
        self.changed(|a, b| a == b)
    }

    /// Drop the first `n` events.
    pub fn skip(&self, n: usize) -> Stream<T> {
        let mut seen = 0;
        self.subscribe(move |value| {
            if seen < n {
                seen += 1;
                return Ok(None);
            }
            Ok(Some(value.clone()))
        })
    }

    /// Run a side effect for every event.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        let _ = self.subscribe(move |value| -> crate::error::Outcome<()> {
            f(value);
            Ok(None)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn record<T: Value>(stream: &Stream<T>) -> Arc<Mutex<Vec<T>>> {
        let footprint = Arc::new(Mutex::new(Vec::new()));
        let sink = footprint.clone();
        stream.set_hook(move |v: &T| sink.lock().push(v.clone()));
        footprint
    }

    fn feed<T: Value>(src: &Stream<T>, values: impl IntoIterator<Item = T>) {
        for value in values {
            src.inject(value).unwrap();
        }
    }

    #[test]
    fn map_applies_to_every_event() {
        let src = Stream::orphan();
        let s = record(&src.map(|x: &i32| x + 3));
        feed(&src, [5, 208, 176, 1021]);
        assert_eq!(*s.lock(), vec![8, 211, 179, 1024]);
    }

    #[test]
    fn try_map_reports_failures() {
        let src = Stream::orphan();
        let parsed = src.try_map(|s: &&str| s.parse::<i32>());
        src.inject("12").unwrap();
        assert!(src.inject("twelve").is_err());
        assert_eq!(parsed.value(), Some(12));
    }

    #[test]
    fn filter_keeps_matching_events() {
        let src = Stream::orphan();
        let s = record(&src.filter(|x: &i32| x % 2 == 0));
        feed(&src, [17, 4, 10, 5]);
        assert_eq!(*s.lock(), vec![4, 10]);
    }

    #[test]
    fn scan_accumulates_from_init() {
        let src = Stream::orphan();
        let s = record(&src.scan(-1, |acc: &i32, x: &i32| acc + x));
        feed(&src, [2, 6, 10]);
        assert_eq!(*s.lock(), vec![1, 7, 17]);
    }

    #[test]
    fn scan1_seeds_with_the_first_event() {
        let src = Stream::orphan();
        let s = record(&src.scan1(|acc: &String, x: &String| format!("{acc} {x}")));
        feed(&src, ["hello", "world,", "frpy!"].map(String::from));
        assert_eq!(
            *s.lock(),
            vec!["hello", "hello world,", "hello world, frpy!"]
        );
    }

    #[test]
    fn window_slides() {
        let src = Stream::orphan();
        let s = record(&src.window(3));
        feed(&src, [1, 2, 3, 4, 5]);
        assert_eq!(
            *s.lock(),
            vec![
                vec![1],
                vec![1, 2],
                vec![1, 2, 3],
                vec![2, 3, 4],
                vec![3, 4, 5]
            ]
        );
    }

    #[test]
    fn diff_pairs_neighbours() {
        let src = Stream::orphan();
        let s = record(&src.diff(0, |x: &i32, y: &i32| y - x));
        feed(&src, [3, 5, 11]);
        assert_eq!(*s.lock(), vec![3, 2, 6]);

        let words = Stream::orphan();
        let flips = record(&words.diff(String::new(), |x: &String, y: &String| x != y));
        feed(&words, ["aaa", "aaa", "bbb", "aaa", "bbb"].map(String::from));
        assert_eq!(*flips.lock(), vec![true, false, true, true, true]);
    }

    #[test]
    fn diff1_passes_the_first_event_through() {
        let src = Stream::orphan();
        let s = record(&src.diff1(|x: &i32, y: &i32| y - x));
        feed(&src, [5, 11, 19]);
        assert_eq!(*s.lock(), vec![5, 6, 8]);
    }

    #[test]
    fn changed_detects_jumps() {
        let src = Stream::orphan();
        let s = record(&src.changed(|x: &i32, y: &i32| y - x <= 1));
        feed(&src, [12, 13, 14, 17, 18]);
        assert_eq!(*s.lock(), vec![12, 17]);
    }

    #[test]
    fn dedup_drops_repeats() {
        let src = Stream::orphan();
        let s = record(&src.dedup());
        feed(&src, [1, 1, 2, 2, 2, 1]);
        assert_eq!(*s.lock(), vec![1, 2, 1]);
    }

    #[test]
    fn skip_drops_first_events() {
        let src = Stream::orphan();
        let s = record(&src.skip(2));
        feed(&src, [1, 1, 2, 3]);
        assert_eq!(*s.lock(), vec![2, 3]);
    }

    #[test]
    fn each_runs_side_effects() {
        let src = Stream::orphan();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        src.each(move |x: &i32| sink.lock().push(*x));
        feed(&src, [1, 5, 11]);
        assert_eq!(*seen.lock(), vec![1, 5, 11]);
        assert_eq!(src.dependent_count(), 1);
    }
}
