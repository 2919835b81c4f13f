//! # JoinCore: the single-lock match engine.
//!
//! One join run owns one `Mutex<JoinCore>`. Every mutating operation — queue
//! push/pop, plan registration, the whole check-peek-dequeue-emit match
//! attempt, deactivation, and terminal delivery — runs inside that one
//! critical section, so two producer threads can never partially and
//! inconsistently consume a plan's inputs. Independent joins never contend.
//!
//! ## Rules
//! - Cancellation is checked first in every lock-held entry point: a disposal
//!   racing with an in-flight producer always wins.
//! - A buffered item is dequeued by at most one match attempt, ever.
//! - The k-th emitted result combines the k-th item of every matched source,
//!   by strict queue position — never by timestamp.
//! - The selector and the downstream emission run while the lock is held.
//!   Relaxing that would risk duplicated or reordered matches; the price is
//!   that a downstream sink must not synchronously cancel its own join from
//!   inside `on_value` (the cancellation token still flips, but the value in
//!   flight has already been delivered).
//! - Terminal delivery is exactly once. Errors arriving after termination are
//!   never delivered twice and never silently lost: they go to the `tracing`
//!   side channel.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::JoinError;
use crate::joins::active::{ActivePlan, PlanId};
use crate::joins::observer::{SourceKey, SourceObserver};
use crate::sources::{SinkRef, Subscription};

/// Locks the core, absorbing poison: the engine's invariants hold between
/// lock-held operations (a selector failure is an error path, not a panic
/// path), so a poisoned mutex still guards consistent state.
pub(crate) fn lock<T, R>(core: &Mutex<JoinCore<T, R>>) -> MutexGuard<'_, JoinCore<T, R>> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct JoinCore<T, R> {
    /// Registry: one observer per distinct source identity.
    observers: HashMap<SourceKey, SourceObserver<T>>,
    /// Plans still active. A plan leaves this map exactly once, on
    /// deactivation or teardown, and is never reactivated.
    plans: HashMap<PlanId, ActivePlan<T, R>>,
    downstream: SinkRef<R>,
    /// Cancelled when the downstream unsubscribes.
    token: CancellationToken,
    /// Terminal delivered (or join cancelled); nothing further may happen.
    done: bool,
    torn_down: bool,
}

impl<T: Clone, R> JoinCore<T, R> {
    pub(crate) fn new(downstream: SinkRef<R>, token: CancellationToken) -> Self {
        Self {
            observers: HashMap::new(),
            plans: HashMap::new(),
            downstream,
            token,
            done: false,
            torn_down: false,
        }
    }

    /// Returns true if the caller must bail out. Runs the deferred teardown
    /// when a downstream cancellation is first observed from under the lock.
    fn guard(&mut self) -> bool {
        if self.done {
            return true;
        }
        if self.token.is_cancelled() {
            self.shutdown();
            return true;
        }
        false
    }

    /// Creates the observer for `key` if absent; true if it was created.
    pub(crate) fn ensure_observer(&mut self, key: SourceKey) -> bool {
        if self.observers.contains_key(&key) {
            return false;
        }
        self.observers.insert(key, SourceObserver::new(key));
        true
    }

    /// Registers an activated plan on every one of its observers, in pattern
    /// order (registration order is match priority on shared observers).
    pub(crate) fn register_plan(&mut self, plan: ActivePlan<T, R>) {
        for key in plan.distinct() {
            if let Some(observer) = self.observers.get_mut(key) {
                observer.register(plan.id());
            }
        }
        self.plans.insert(plan.id(), plan);
    }

    /// Stores the upstream subscription obtained outside the lock, or cancels
    /// it right away if the join already terminated in the meantime.
    pub(crate) fn attach_subscription(&mut self, key: SourceKey, upstream: Subscription) {
        if self.done || self.token.is_cancelled() {
            upstream.cancel();
            return;
        }
        match self.observers.get_mut(&key) {
            Some(observer) => observer.attach(upstream),
            None => upstream.cancel(),
        }
    }

    /// True once nothing further may be buffered, matched, or emitted.
    pub(crate) fn is_done(&self) -> bool {
        self.done || self.token.is_cancelled()
    }

    /// A source delivered a value: buffer it, then re-attempt matching on
    /// every plan waiting on this observer, in registration order.
    pub(crate) fn on_value(&mut self, key: SourceKey, value: T) {
        if self.guard() {
            return;
        }
        let waiting = match self.observers.get_mut(&key) {
            Some(observer) => {
                observer.push_value(value);
                observer.plans().to_vec()
            }
            None => return,
        };
        self.attempt_all(waiting);
    }

    /// A source completed: buffer the permanent sentinel, then re-attempt
    /// matching exactly as for a value.
    pub(crate) fn on_completed(&mut self, key: SourceKey) {
        if self.guard() {
            return;
        }
        let waiting = match self.observers.get_mut(&key) {
            Some(observer) => {
                observer.push_completed();
                observer.plans().to_vec()
            }
            None => return,
        };
        self.attempt_all(waiting);
    }

    fn attempt_all(&mut self, waiting: Vec<PlanId>) {
        for id in waiting {
            // a previous attempt may have deactivated this plan, ended the
            // join, or lost against a concurrent downstream cancellation
            if self.guard() {
                break;
            }
            if self.plans.contains_key(&id) {
                self.try_match(id);
            }
        }
    }

    /// The match-or-deactivate algorithm. One atomic unit under the lock:
    /// readiness check, peek, dequeue, combine, emit.
    fn try_match(&mut self, id: PlanId) {
        let (positions, distinct, selector) = match self.plans.get(&id) {
            Some(plan) => (
                plan.positions().to_vec(),
                plan.distinct().to_vec(),
                plan.selector(),
            ),
            None => return,
        };

        // 1-2: every queue must be non-empty; scan heads for the sentinel
        let mut saw_completed = false;
        for key in &distinct {
            match self.observers.get(key).and_then(SourceObserver::peek) {
                None => return, // not ready
                Some(head) => saw_completed |= head.is_completed(),
            }
        }

        // 3: a completed source at any matched position quietly retires the
        // plan; nothing is dequeued.
        if saw_completed {
            self.deactivate(id);
            return;
        }

        // 4: dequeue exactly one item per distinct queue, assemble positional
        // values, combine, emit.
        let mut taken: HashMap<SourceKey, T> = HashMap::with_capacity(distinct.len());
        for key in &distinct {
            if let Some(observer) = self.observers.get_mut(key) {
                if let Some(value) = observer.dequeue_value() {
                    taken.insert(*key, value);
                }
            }
        }
        debug_assert_eq!(taken.len(), distinct.len());

        let values: Vec<T> = positions.iter().map(|key| taken[key].clone()).collect();
        match selector(values) {
            Ok(result) => {
                let downstream = self.downstream.clone();
                downstream.on_value(result);
            }
            Err(reason) => self.fail(JoinError::selector(reason)),
        }
    }

    /// Quiet retirement of one plan: unregister it everywhere, and complete
    /// the join once no plan remains.
    fn deactivate(&mut self, id: PlanId) {
        let Some(plan) = self.plans.remove(&id) else {
            return;
        };
        for key in plan.distinct() {
            if let Some(observer) = self.observers.get_mut(key) {
                observer.unregister(id);
            }
        }
        tracing::debug!(plan = ?id, remaining = self.plans.len(), "plan deactivated");
        if self.plans.is_empty() {
            self.complete();
        }
    }

    /// Fails the whole join. First call wins; later errors go to the side
    /// channel only.
    pub(crate) fn fail(&mut self, error: JoinError) {
        if self.done || self.token.is_cancelled() {
            tracing::warn!(
                label = error.as_label(),
                %error,
                "error after join terminated; not delivered downstream"
            );
            self.shutdown();
            return;
        }
        self.done = true;
        self.teardown();
        tracing::debug!(label = error.as_label(), "join failed");
        self.downstream.on_error(error);
    }

    fn complete(&mut self) {
        if self.done || self.token.is_cancelled() {
            return;
        }
        self.done = true;
        self.teardown();
        tracing::debug!("join completed");
        self.downstream.on_completed();
    }

    /// Terminal state without downstream delivery (downstream cancelled).
    pub(crate) fn shutdown(&mut self) {
        self.done = true;
        self.teardown();
    }

    /// Idempotent: cancels every upstream subscription and drops buffers.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.plans.clear();
        for observer in self.observers.values_mut() {
            observer.dispose();
        }
    }
}
