//! Async Bridge
//!
//! Lets an async stream transform consume and produce stream events.
//!
//! # How It Works
//!
//! 1. Every event of the input stream is pushed onto an unbounded channel.
//!    The receiving end is handed to the transform as [`Incoming`].
//!
//! 2. The transform's output is polled by a task on the caller's tokio
//!    runtime.
//!
//! 3. Each yielded value becomes an ordinary `inject` into the output
//!    stream, governed like the input.
//!
//! The graph itself never awaits. Waves stay synchronous; only the transform
//! runs on the runtime.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream as AsyncStream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{trace, warn};

use crate::graph::Value;
use crate::reactive::Stream;

/// The input events of an async transform, in publication order.
///
/// Ends when the input stream is dropped.
#[derive(Debug)]
pub struct Incoming<T> {
    rx: UnboundedReceiver<T>,
}

impl<T> AsyncStream for Incoming<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T: Value> Stream<T> {
    /// Drive an async stream transform with the events of this stream.
    ///
    /// ```rust,ignore
    /// let odd_plus_one = src.transform_async(&runtime, |events| {
    ///     events.filter(|e| ready(e % 2 != 0)).map(|e| e + 1)
    /// });
    /// ```
    pub fn transform_async<U, F, S>(&self, runtime: &Handle, transform: F) -> Stream<U>
    where
        U: Value,
        F: FnOnce(Incoming<T>) -> S,
        S: AsyncStream<Item = U> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let out = Stream::source(self.clock().as_ref());

        self.each(move |value: &T| {
            if tx.send(value.clone()).is_err() {
                trace!("async transform finished, event dropped");
            }
        });

        let mut outputs = Box::pin(transform(Incoming { rx }));
        let target = out.clone();
        runtime.spawn(async move {
            while let Some(value) = outputs.next().await {
                if let Err(err) = target.inject(value) {
                    warn!(node = %target.id(), error = %err, "async transform output failed");
                }
            }
        });

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::ready;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn transform_filters_and_maps() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let src = Stream::orphan();
        let out = src.transform_async(runtime.handle(), |events| {
            events.filter(|e: &i32| ready(e % 2 != 0)).map(|e| e + 1)
        });
        let footprint = Arc::new(Mutex::new(Vec::new()));
        let sink = footprint.clone();
        out.set_hook(move |v: &i32| sink.lock().push(*v));

        for x in [1, 10, 25, 131, 18] {
            src.inject(x).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while footprint.lock().len() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*footprint.lock(), vec![2, 26, 132]);
    }

    #[test]
    fn incoming_ends_with_its_sender() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(1).unwrap();
        drop(tx);

        let collected: Vec<i32> = runtime.block_on(Incoming { rx }.collect());
        assert_eq!(collected, vec![1]);
    }
}
