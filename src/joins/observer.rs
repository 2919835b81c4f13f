//! # SourceObserver: per-source buffer and plan registration.
//!
//! Exactly one observer exists per distinct source identity within one join
//! run. It owns the source's unbounded FIFO queue of [`Notification`]s, the
//! ids of the plans waiting on it (in registration order, which is the
//! match-attempt priority when plans share a source), and the upstream
//! subscription once attached.
//!
//! ## Rules
//! - Every method here is called with the owning join's lock held; the
//!   observer itself carries no synchronization.
//! - The queue is unbounded: a source producing faster than its peers
//!   accumulates freely. Accepted behavior, not a defect.
//! - `dispose` is idempotent and cancels the upstream subscription.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::joins::notification::Notification;
use crate::sources::{SourceRef, Subscription};

/// Identity key of a source: the `Arc` data pointer. Clones of one `Arc`
/// share a key; separately allocated sources never collide while alive,
/// and every key captured by a join is kept alive by the plan holding the
/// `Arc` for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SourceKey(usize);

impl SourceKey {
    pub(crate) fn of<T>(source: &SourceRef<T>) -> Self {
        SourceKey(Arc::as_ptr(source) as *const () as usize)
    }
}

/// Lifecycle of an observer within one join run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObserverState {
    /// Created and registered, upstream subscription not yet attached.
    Unsubscribed,
    /// Upstream subscription attached and live.
    Active,
    /// Disposed; nothing further is buffered or delivered.
    Terminated,
}

pub(crate) struct SourceObserver<T> {
    key: SourceKey,
    queue: VecDeque<Notification<T>>,
    plans: Vec<super::active::PlanId>,
    state: ObserverState,
    upstream: Option<Subscription>,
}

impl<T> SourceObserver<T> {
    pub(crate) fn new(key: SourceKey) -> Self {
        Self {
            key,
            queue: VecDeque::new(),
            plans: Vec::new(),
            state: ObserverState::Unsubscribed,
            upstream: None,
        }
    }

    pub(crate) fn push_value(&mut self, value: T) {
        self.queue.push_back(Notification::Value(value));
    }

    pub(crate) fn push_completed(&mut self) {
        self.queue.push_back(Notification::Completed);
    }

    /// Non-destructive head access.
    pub(crate) fn peek(&self) -> Option<&Notification<T>> {
        self.queue.front()
    }

    /// Removes and returns the head value. The completion sentinel is never
    /// removed: a `Completed` head yields `None`.
    pub(crate) fn dequeue_value(&mut self) -> Option<T> {
        match self.queue.front() {
            Some(Notification::Value(_)) => match self.queue.pop_front() {
                Some(Notification::Value(value)) => Some(value),
                _ => None,
            },
            _ => None,
        }
    }

    /// Plans waiting on this observer, in registration (priority) order.
    pub(crate) fn plans(&self) -> &[super::active::PlanId] {
        &self.plans
    }

    pub(crate) fn register(&mut self, plan: super::active::PlanId) {
        if !self.plans.contains(&plan) {
            self.plans.push(plan);
        }
    }

    pub(crate) fn unregister(&mut self, plan: super::active::PlanId) {
        self.plans.retain(|p| *p != plan);
    }

    /// Attaches the upstream subscription obtained outside the join lock.
    pub(crate) fn attach(&mut self, upstream: Subscription) {
        if self.state == ObserverState::Terminated {
            upstream.cancel();
            return;
        }
        self.state = ObserverState::Active;
        self.upstream = Some(upstream);
    }

    /// Idempotent teardown: cancels the upstream subscription and drops all
    /// buffered state.
    pub(crate) fn dispose(&mut self) {
        if self.state == ObserverState::Terminated {
            return;
        }
        self.state = ObserverState::Terminated;
        self.queue.clear();
        self.plans.clear();
        if let Some(upstream) = self.upstream.take() {
            upstream.cancel();
        }
        tracing::debug!(source = ?self.key, "observer disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{IterSource, SourceRef};

    #[test]
    fn test_key_is_stable_across_clones() {
        let src: SourceRef<i32> = IterSource::arc([1]);
        let other: SourceRef<i32> = IterSource::arc([1]);
        assert_eq!(SourceKey::of(&src), SourceKey::of(&src.clone()));
        assert_ne!(SourceKey::of(&src), SourceKey::of(&other));
    }

    #[test]
    fn test_completed_sentinel_is_peeked_never_dequeued() {
        let src: SourceRef<i32> = IterSource::arc([]);
        let mut obs = SourceObserver::new(SourceKey::of(&src));
        obs.push_value(1);
        obs.push_completed();

        assert_eq!(obs.dequeue_value(), Some(1));
        assert!(obs.peek().is_some_and(Notification::is_completed));
        assert_eq!(obs.dequeue_value(), None);
        assert!(obs.peek().is_some_and(Notification::is_completed));
    }
}
