//! # StreamSource: adapter over `futures::Stream`.
//!
//! Each subscription spawns a tokio task that drives a fresh stream (built by
//! the captured factory) into the sink, value by value, until the stream ends
//! or the subscription is cancelled.
//!
//! ## Rules
//! - `subscribe` must be called within a tokio runtime context.
//! - Stream end maps to `on_completed`; cancellation stops delivery without
//!   any terminal signal.
//! - A stream that yields without ever pending will starve the cancellation
//!   check on a current-thread runtime; such sources should interleave an
//!   await point (e.g. a timer), same as any non-cooperative tokio task.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::sources::source::{SinkRef, Source};
use crate::sources::subscription::Subscription;

/// Source driving one freshly built stream per subscription.
pub struct StreamSource<F> {
    factory: F,
}

impl<F> StreamSource<F> {
    /// Wraps a factory producing one stream per subscription.
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Creates the source behind a shared handle.
    pub fn arc(factory: F) -> Arc<Self> {
        Arc::new(Self::new(factory))
    }
}

impl<T, S, F> Source<T> for StreamSource<F>
where
    T: Send + 'static,
    S: Stream<Item = T> + Send + 'static,
    F: Fn() -> S + Send + Sync,
{
    fn subscribe(&self, sink: SinkRef<T>) -> Subscription {
        let token = CancellationToken::new();
        let stream = (self.factory)();
        let watch = token.clone();

        tokio::spawn(async move {
            futures::pin_mut!(stream);
            loop {
                tokio::select! {
                    _ = watch.cancelled() => break,
                    item = stream.next() => match item {
                        Some(value) => sink.on_value(value),
                        None => {
                            sink.on_completed();
                            break;
                        }
                    },
                }
            }
        });

        Subscription::new(token)
    }
}
