//! # IterSource: cold source over a fixed sequence.
//!
//! Replays its items synchronously, from inside `subscribe`, then completes.
//! Every subscriber gets the full sequence.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::sources::source::{SinkRef, Source};
use crate::sources::subscription::Subscription;

/// Cold source emitting a fixed sequence then completing, all synchronously
/// within `subscribe`.
pub struct IterSource<T> {
    items: Vec<T>,
}

impl<T> IterSource<T> {
    /// Captures the items to replay per subscription.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Creates the source behind a shared handle.
    pub fn arc(items: impl IntoIterator<Item = T>) -> Arc<Self> {
        Arc::new(Self::new(items))
    }
}

impl<T: Clone + Send + Sync + 'static> Source<T> for IterSource<T> {
    fn subscribe(&self, sink: SinkRef<T>) -> Subscription {
        for item in &self.items {
            sink.on_value(item.clone());
        }
        sink.on_completed();
        Subscription::new(CancellationToken::new())
    }
}
