//! Push-based source/sink contracts and ready-made source adapters.
//!
//! Everything the join engine knows about the outside world goes through two
//! traits:
//! - [`Source`]: something that can be subscribed to and will push values,
//!   followed by at most one terminal signal, into a [`Sink`];
//! - [`Sink`]: the receiving side — synchronous callbacks invoked on whatever
//!   thread the producer happens to be on.
//!
//! Modules:
//! - [`source`]: the traits, `Arc` handle aliases, and [`SourceEvent`];
//! - [`subscription`]: the idempotent cancel handle returned by `subscribe`;
//! - [`push`]: hand-driven hot source ([`PushSource`]);
//! - [`iter`]: cold source replaying a fixed sequence ([`IterSource`]);
//! - [`stream`]: adapter driving a `futures::Stream` ([`StreamSource`]);
//! - [`channel`]: bridge from sink callbacks into a tokio mpsc channel.

mod channel;
mod iter;
mod push;
mod source;
mod stream;
mod subscription;

pub use channel::channel_sink;
pub use iter::IterSource;
pub use push::PushSource;
pub use source::{Sink, SinkRef, Source, SourceEvent, SourceRef};
pub use stream::StreamSource;
pub use subscription::Subscription;
