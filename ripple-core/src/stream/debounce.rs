//! Debounced Change Stream
//!
//! Turns a burst of values into a single "settled" value: the last one
//! received before the source went quiet for the whole delay.
//!
//! # Behavior
//!
//! - Each new input replaces the pending value and restarts the timer.
//! - A value is emitted only when the timer elapses with no newer input.
//! - When the source ends, the pending value (if any) is still emitted once
//!   its delay elapses, then the stream ends.
//! - Emission happens only when the consumer polls the stream, never inside
//!   the call that produced the input, even with a zero delay.
//! - Dropping the stream discards the pending value.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::time::{Instant, Sleep};

/// Stream adaptor returned by [`debounce`].
pub struct Debounce<S: Stream> {
    source: Pin<Box<S>>,
    delay: Duration,
    /// Created on the first input, so the adaptor itself can be built
    /// outside a Tokio runtime.
    timer: Option<Pin<Box<Sleep>>>,
    pending: Option<S::Item>,
    source_done: bool,
}

/// Debounce `source` by `delay`.
pub fn debounce<S: Stream>(source: S, delay: Duration) -> Debounce<S> {
    Debounce {
        source: Box::pin(source),
        delay,
        timer: None,
        pending: None,
        source_done: false,
    }
}

/// Extension trait adding [`debounce`] to every stream.
pub trait DebounceExt: Stream + Sized {
    /// Debounce this stream by `delay`.
    fn debounce(self, delay: Duration) -> Debounce<Self> {
        debounce(self, delay)
    }
}

impl<S: Stream> DebounceExt for S {}

impl<S: Stream> Debounce<S> {
    /// The configured quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Check whether a value is waiting for its timer.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

// `source` and `timer` are boxed, so nothing is structurally pinned.
impl<S: Stream> Unpin for Debounce<S> {}

impl<S: Stream> Stream for Debounce<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        let this = &mut *self;

        // Drain everything the source has ready; only the newest survives.
        while !this.source_done {
            match this.source.as_mut().poll_next(cx) {
                Poll::Ready(Some(value)) => {
                    this.pending = Some(value);
                    let deadline = Instant::now() + this.delay;
                    match this.timer.as_mut() {
                        Some(timer) => timer.as_mut().reset(deadline),
                        None => this.timer = Some(Box::pin(tokio::time::sleep_until(deadline))),
                    }
                }
                Poll::Ready(None) => this.source_done = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_some() {
            if let Some(timer) = this.timer.as_mut() {
                return match timer.as_mut().poll(cx) {
                    Poll::Ready(()) => Poll::Ready(this.pending.take()),
                    Poll::Pending => Poll::Pending,
                };
            }
        }

        if this.source_done {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
