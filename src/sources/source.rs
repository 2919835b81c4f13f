//! # Source and sink contracts.
//!
//! The minimal capability set the join engine requires from its
//! collaborators, upstream and downstream alike:
//!
//! - a source accepts a subscription and pushes zero or more values followed
//!   by at most one terminal signal (error XOR completion);
//! - a sink receives those signals synchronously, on the producer's thread;
//! - cancellation is an idempotent handle ([`Subscription`]) honored by the
//!   source ceasing all further delivery.
//!
//! ## Rules
//! - Callbacks run to completion on the calling thread; none of them blocks
//!   or suspends. A sink that needs async handling should hand off through
//!   [`channel_sink`](crate::sources::channel_sink).
//! - A source may emit synchronously from inside `subscribe` (cold sources
//!   do). Subscribers must be reentrancy-safe for that window.
//! - After a terminal signal the source must deliver nothing further on that
//!   subscription.
//!
//! ## Identity
//! Sources are shared as [`SourceRef`] (`Arc<dyn Source<T>>`). The join
//! engine deduplicates sources by `Arc` data-pointer identity: use clones of
//! the same `Arc` to share one upstream subscription across patterns.

use std::sync::Arc;

use crate::error::JoinError;
use crate::sources::subscription::Subscription;

/// Receiving side of a push-based source.
///
/// Implementations must tolerate (and ignore) signals arriving after a
/// terminal one; well-behaved sources never send them, but the contract is
/// checked at the receiver too.
pub trait Sink<T>: Send + Sync {
    /// A value is available.
    fn on_value(&self, value: T);

    /// The source is exhausted; no further values will arrive.
    fn on_completed(&self);

    /// The source failed; no further values will arrive.
    fn on_error(&self, error: JoinError);
}

/// Shared handle to a sink.
pub type SinkRef<T> = Arc<dyn Sink<T>>;

/// A push-based asynchronous producer.
///
/// Each call to [`subscribe`](Source::subscribe) is an independent
/// subscription with its own cancel handle.
pub trait Source<T>: Send + Sync {
    /// Starts delivering this source's signals into `sink`.
    ///
    /// The returned [`Subscription`] must be honored: once cancelled, the
    /// source delivers nothing further into `sink`.
    fn subscribe(&self, sink: SinkRef<T>) -> Subscription;
}

/// Shared handle to a source. Clones share identity (see module docs).
pub type SourceRef<T> = Arc<dyn Source<T>>;

/// A sink signal reified as a value, used by the channel bridge and handy in
/// tests.
#[derive(Debug, Clone)]
pub enum SourceEvent<T> {
    /// `on_value`.
    Value(T),
    /// `on_completed`.
    Completed,
    /// `on_error`.
    Error(JoinError),
}

impl<T> SourceEvent<T> {
    /// Returns the carried value, if this is a `Value` event.
    pub fn value(self) -> Option<T> {
        match self {
            SourceEvent::Value(v) => Some(v),
            _ => None,
        }
    }

    /// True for the completion signal.
    pub fn is_completed(&self) -> bool {
        matches!(self, SourceEvent::Completed)
    }

    /// True for the error signal.
    pub fn is_error(&self) -> bool {
        matches!(self, SourceEvent::Error(_))
    }
}
