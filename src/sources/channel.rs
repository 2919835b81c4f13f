//! # Channel bridge: consume sink signals from async code.
//!
//! [`channel_sink`] turns the synchronous [`Sink`] callbacks into an
//! unbounded [`tokio::sync::mpsc`] stream of [`SourceEvent`]s. Unbounded on
//! purpose: sink callbacks must never block the producer thread.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::JoinError;
use crate::sources::source::{Sink, SinkRef, SourceEvent};

struct ChannelSink<T> {
    tx: mpsc::UnboundedSender<SourceEvent<T>>,
}

impl<T: Send + 'static> Sink<T> for ChannelSink<T> {
    fn on_value(&self, value: T) {
        let _ = self.tx.send(SourceEvent::Value(value));
    }

    fn on_completed(&self) {
        let _ = self.tx.send(SourceEvent::Completed);
    }

    fn on_error(&self, error: JoinError) {
        let _ = self.tx.send(SourceEvent::Error(error));
    }
}

/// Builds a sink forwarding every signal into the returned receiver.
///
/// Dropping the receiver silently discards further signals; the producer is
/// never blocked or failed by a slow or departed consumer.
///
/// # Example
/// ```
/// use joinpatterns::{channel_sink, IterSource, Source, SourceEvent, SourceRef};
///
/// let src: SourceRef<i32> = IterSource::arc([5]);
/// let (sink, mut rx) = channel_sink();
/// let _sub = src.subscribe(sink);
///
/// assert!(matches!(rx.try_recv(), Ok(SourceEvent::Value(5))));
/// assert!(matches!(rx.try_recv(), Ok(SourceEvent::Completed)));
/// ```
pub fn channel_sink<T: Send + 'static>() -> (
    SinkRef<T>,
    mpsc::UnboundedReceiver<SourceEvent<T>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelSink { tx }), rx)
}
