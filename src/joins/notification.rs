//! Buffered event: a value, or the permanent end-of-source sentinel.

/// One buffered item in a source observer's queue.
///
/// `Completed` is a sentinel: once it reaches the head of a queue it is only
/// ever peeked, never dequeued, so every later match attempt against that
/// source sees it again.
#[derive(Debug)]
pub(crate) enum Notification<T> {
    Value(T),
    Completed,
}

impl<T> Notification<T> {
    pub(crate) fn is_completed(&self) -> bool {
        matches!(self, Notification::Completed)
    }
}
