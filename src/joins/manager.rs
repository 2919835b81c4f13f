//! # Join manager: activation and the downstream subscription.
//!
//! [`join`] validates its plans once, synchronously; the returned
//! [`JoinSource`] is subscribable any number of times, and every subscription
//! runs a fresh manager: its own registry of observers, its own active plans,
//! its own lock.
//!
//! ## Activation
//! Two phases per subscription:
//! 1. under the lock: build (or reuse, deduplicated by source identity) one
//!    observer per distinct source, and register every plan on its observers
//!    in pattern order;
//! 2. outside the lock: subscribe each new observer to its source in
//!    first-appearance order. Outside, because a cold source emits
//!    synchronously from inside `subscribe` and would re-enter the lock. The
//!    upstream handle is then attached under the lock, or cancelled
//!    immediately if the join already terminated mid-activation.
//!
//! ## Cancellation
//! The downstream [`Subscription`]'s cleanup cancels the join token first
//! (lock-free, always wins) and tears down on a best-effort `try_lock`; a
//! producer holding the lock at that moment observes the cancelled token on
//! its next entry and finishes the teardown itself. Either way nothing is
//! emitted after the cancel call returns.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::error::JoinError;
use crate::joins::active::{ActivePlan, PlanId};
use crate::joins::core::{lock, JoinCore};
use crate::joins::observer::SourceKey;
use crate::joins::pattern::Plan;
use crate::sources::{Sink, SinkRef, Source, SourceRef, Subscription};

/// Combines one or more plans into a single joined source.
///
/// Fails synchronously with [`JoinError::NoPlans`] when called with no plans;
/// subscription-time surprises are not this crate's style.
///
/// # Example
/// ```
/// use joinpatterns::{channel_sink, join, IterSource, Pattern, Source, SourceEvent, SourceRef};
///
/// let a: SourceRef<i32> = IterSource::arc([1, 2, 3]);
/// let b: SourceRef<i32> = IterSource::arc([10, 20, 30]);
/// let sums = join(vec![
///     Pattern::new(a).and(b).then(|vs: Vec<i32>| vs[0] + vs[1]),
/// ])
/// .expect("one plan given");
///
/// let (sink, mut rx) = channel_sink();
/// let _sub = sums.subscribe(sink);
/// assert!(matches!(rx.try_recv(), Ok(SourceEvent::Value(11))));
/// assert!(matches!(rx.try_recv(), Ok(SourceEvent::Value(22))));
/// assert!(matches!(rx.try_recv(), Ok(SourceEvent::Value(33))));
/// assert!(matches!(rx.try_recv(), Ok(SourceEvent::Completed)));
/// ```
pub fn join<T, R>(plans: Vec<Plan<T, R>>) -> Result<JoinSource<T, R>, JoinError>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
{
    if plans.is_empty() {
        return Err(JoinError::NoPlans);
    }
    Ok(JoinSource { plans })
}

/// The combined multi-pattern join, itself a [`Source`] — joins compose.
pub struct JoinSource<T, R> {
    plans: Vec<Plan<T, R>>,
}

impl<T, R> std::fmt::Debug for JoinSource<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinSource")
            .field("plans", &self.plans.len())
            .finish()
    }
}

impl<T, R> Clone for JoinSource<T, R> {
    fn clone(&self) -> Self {
        Self {
            plans: self.plans.clone(),
        }
    }
}

impl<T, R> Source<R> for JoinSource<T, R>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
{
    fn subscribe(&self, sink: SinkRef<R>) -> Subscription {
        let token = CancellationToken::new();
        let core = Arc::new(Mutex::new(JoinCore::new(sink, token.clone())));

        // phase 1: registry and plan registration, all under the lock
        let mut pending: Vec<(SourceKey, SourceRef<T>)> = Vec::new();
        {
            let mut guard = lock(&core);
            for (seq, plan) in self.plans.iter().enumerate() {
                let positions: Vec<SourceKey> = plan
                    .sources()
                    .iter()
                    .map(|source| {
                        let key = SourceKey::of(source);
                        if guard.ensure_observer(key) {
                            pending.push((key, source.clone()));
                        }
                        key
                    })
                    .collect();
                guard.register_plan(ActivePlan::new(
                    PlanId::new(seq as u64),
                    positions,
                    plan.selector(),
                ));
            }
        }
        tracing::debug!(
            plans = self.plans.len(),
            sources = pending.len(),
            "join activated"
        );

        // phase 2: subscribe upstream, one source at a time, outside the lock
        for (key, source) in pending {
            if lock(&core).is_done() {
                break;
            }
            let upstream = source.subscribe(Arc::new(PlanSink {
                core: core.clone(),
                key,
            }));
            lock(&core).attach_subscription(key, upstream);
        }

        let cancel_core = Arc::downgrade(&core);
        Subscription::with_cleanup(token, move || {
            if let Some(core) = cancel_core.upgrade() {
                // best effort: a producer holding the lock finishes the
                // teardown itself once it observes the cancelled token
                if let Ok(mut guard) = core.try_lock() {
                    guard.shutdown();
                }
            }
        })
    }
}

/// Per-observer sink wired into the join core; every callback takes the one
/// join lock and runs to completion on the producer's thread.
struct PlanSink<T, R> {
    core: Arc<Mutex<JoinCore<T, R>>>,
    key: SourceKey,
}

impl<T, R> Sink<T> for PlanSink<T, R>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
{
    fn on_value(&self, value: T) {
        lock(&self.core).on_value(self.key, value);
    }

    fn on_completed(&self) {
        lock(&self.core).on_completed(self.key);
    }

    /// Errors bypass the queue entirely: fail-fast for the whole join.
    fn on_error(&self, error: JoinError) {
        lock(&self.core).fail(error);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use rand::Rng;

    use super::*;
    use crate::joins::Pattern;
    use crate::sources::{IterSource, PushSource, SourceEvent};

    struct Recorder<R> {
        seen: StdMutex<Vec<SourceEvent<R>>>,
    }

    impl<R> Recorder<R> {
        fn arc() -> Arc<Self> {
            Arc::new(Self {
                seen: StdMutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<SourceEvent<R>>
        where
            R: Clone,
        {
            self.seen.lock().unwrap().clone()
        }

        fn values(&self) -> Vec<R>
        where
            R: Clone,
        {
            self.events()
                .into_iter()
                .filter_map(SourceEvent::value)
                .collect()
        }

        fn terminal_count(&self) -> usize
        where
            R: Clone,
        {
            self.events()
                .iter()
                .filter(|e| e.is_completed() || e.is_error())
                .count()
        }
    }

    impl<R: Send + Sync> Sink<R> for Recorder<R> {
        fn on_value(&self, value: R) {
            self.seen.lock().unwrap().push(SourceEvent::Value(value));
        }
        fn on_completed(&self) {
            self.seen.lock().unwrap().push(SourceEvent::Completed);
        }
        fn on_error(&self, error: JoinError) {
            self.seen.lock().unwrap().push(SourceEvent::Error(error));
        }
    }

    /// Test source that hands the raw sink to the test so misbehaving
    /// producers (double errors, post-terminal values) can be simulated.
    struct RawSource<T> {
        sinks: StdMutex<Vec<SinkRef<T>>>,
    }

    impl<T> RawSource<T> {
        fn arc() -> Arc<Self> {
            Arc::new(Self {
                sinks: StdMutex::new(Vec::new()),
            })
        }

        fn sink(&self) -> SinkRef<T> {
            self.sinks.lock().unwrap()[0].clone()
        }
    }

    impl<T: Send + 'static> Source<T> for RawSource<T> {
        fn subscribe(&self, sink: SinkRef<T>) -> Subscription {
            self.sinks.lock().unwrap().push(sink);
            Subscription::new(CancellationToken::new())
        }
    }

    #[test]
    fn test_no_plans_is_a_synchronous_error() {
        let err = join::<i32, i32>(Vec::new()).unwrap_err();
        assert_eq!(err.as_label(), "no_plans");
    }

    #[test]
    fn test_fifo_pairing_is_arrival_independent() {
        let a = PushSource::<i64>::arc();
        let b = PushSource::<i64>::arc();
        let sa: SourceRef<i64> = a.clone();
        let sb: SourceRef<i64> = b.clone();

        let sums = join(vec![
            Pattern::new(sa).and(sb).then(|vs: Vec<i64>| vs[0] + vs[1]),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = sums.subscribe(rec.clone());

        // a races far ahead of b; pairing must stay strictly positional
        for k in 0..100 {
            a.push(k);
        }
        for k in 0..100 {
            b.push(1000 + k);
        }

        let got = rec.values();
        let expected: Vec<i64> = (0..100).map(|k| k + 1000 + k).collect();
        assert_eq!(got, expected);
        assert_eq!(rec.terminal_count(), 0);
    }

    #[test]
    fn test_completed_source_retires_plan_without_consuming_peers() {
        let a = PushSource::<u32>::arc();
        let b = PushSource::<u32>::arc();
        let sa: SourceRef<u32> = a.clone();
        let sb: SourceRef<u32> = b.clone();

        let pairs = join(vec![
            Pattern::new(sa).and(sb).then(|vs: Vec<u32>| (vs[0], vs[1])),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = pairs.subscribe(rec.clone());

        for v in [10, 20, 30, 40, 50] {
            b.push(v);
        }
        for v in [1, 2, 3] {
            a.push(v);
        }
        a.complete(); // b's 4th item is peeked against the sentinel, never consumed

        assert_eq!(rec.values(), vec![(1, 10), (2, 20), (3, 30)]);
        let events = rec.events();
        assert!(events.last().unwrap().is_completed());
        assert_eq!(rec.terminal_count(), 1);

        // both upstreams are disposed once the join completes
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);

        // producers continuing afterward change nothing
        b.push(60);
        assert_eq!(rec.events().len(), events.len());
    }

    #[test]
    fn test_source_error_fails_fast_and_disposes_siblings() {
        let a = PushSource::<u32>::arc();
        let b = PushSource::<u32>::arc();
        let sa: SourceRef<u32> = a.clone();
        let sb: SourceRef<u32> = b.clone();

        let pairs = join(vec![
            Pattern::new(sa).and(sb).then(|vs: Vec<u32>| (vs[0], vs[1])),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = pairs.subscribe(rec.clone());

        b.fail("wire torn");

        let events = rec.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
        assert_eq!(a.subscriber_count(), 0);

        // values arriving after the failure are dropped, no match ever occurs
        a.push(1);
        assert_eq!(rec.events().len(), 1);
    }

    #[test]
    fn test_selector_failure_is_terminal() {
        let a = PushSource::<u32>::arc();
        let b = PushSource::<u32>::arc();
        let sa: SourceRef<u32> = a.clone();
        let sb: SourceRef<u32> = b.clone();

        let out = join(vec![Pattern::new(sa).and(sb).then_try(
            |_vs: Vec<u32>| -> Result<u32, crate::error::BoxError> { Err("kaput".into()) },
        )])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = out.subscribe(rec.clone());

        a.push(1);
        b.push(2);

        let events = rec.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            SourceEvent::Error(e) => assert_eq!(e.as_label(), "selector_error"),
            other => panic!("expected selector error, got {other:?}"),
        }
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn test_shared_source_consumes_each_item_exactly_once() {
        let x = PushSource::<u32>::arc();
        let a = PushSource::<u32>::arc();
        let b = PushSource::<u32>::arc();
        let sx: SourceRef<u32> = x.clone();
        let sa: SourceRef<u32> = a.clone();
        let sb: SourceRef<u32> = b.clone();

        const PRODUCERS: u32 = 4;
        const PER_PRODUCER: u32 = 250;
        const TOTAL: u32 = PRODUCERS * PER_PRODUCER;

        let tagged = join(vec![
            Pattern::new(sx.clone())
                .and(sa)
                .then(|vs: Vec<u32>| ("left", vs[0])),
            Pattern::new(sx).and(sb).then(|vs: Vec<u32>| ("right", vs[0])),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = tagged.subscribe(rec.clone());

        // both plans share one upstream subscription on x
        assert_eq!(x.subscriber_count(), 1);

        // "left" holds priority on x while a has items; a runs dry halfway
        // through, after which "right" takes over. b never runs dry.
        for k in 0..TOTAL / 2 {
            a.push(k);
        }
        for k in 0..TOTAL {
            b.push(k);
        }

        let mut producers = Vec::new();
        for p in 0..PRODUCERS {
            let x = x.clone();
            producers.push(std::thread::spawn(move || {
                let mut rng = rand::rng();
                for k in 0..PER_PRODUCER {
                    x.push(p * PER_PRODUCER + k);
                    if rng.random_range(0..8) == 0 {
                        std::thread::yield_now();
                    }
                }
            }));
        }
        for handle in producers {
            handle.join().unwrap();
        }

        // every produced x item was matched by exactly one of the two plans
        let outputs = rec.values();
        let mut matched: Vec<u32> = outputs.iter().map(|(_, v)| *v).collect();
        assert_eq!(matched.len() as u32, TOTAL);
        matched.sort_unstable();
        let expected: Vec<u32> = (0..TOTAL).collect();
        assert_eq!(matched, expected);

        // and both plans got a share
        assert!(outputs.iter().any(|(tag, _)| *tag == "left"));
        assert!(outputs.iter().any(|(tag, _)| *tag == "right"));
    }

    #[test]
    fn test_cancel_prevents_further_emissions() {
        let a = PushSource::<u32>::arc();
        let b = PushSource::<u32>::arc();
        let sa: SourceRef<u32> = a.clone();
        let sb: SourceRef<u32> = b.clone();

        let sums = join(vec![
            Pattern::new(sa).and(sb).then(|vs: Vec<u32>| vs[0] + vs[1]),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let sub = sums.subscribe(rec.clone());

        a.push(1);
        b.push(2);
        assert_eq!(rec.values(), vec![3]);

        sub.cancel();
        a.push(10);
        b.push(20);
        a.complete();

        // no value, no terminal: the join was cancelled, not completed
        assert_eq!(rec.events().len(), 1);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn test_second_error_is_dropped_not_delivered() {
        let raw = RawSource::<u32>::arc();
        let other = PushSource::<u32>::arc();
        let sraw: SourceRef<u32> = raw.clone();
        let sother: SourceRef<u32> = other.clone();

        let out = join(vec![
            Pattern::new(sraw).and(sother).then(|vs: Vec<u32>| vs[0]),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = out.subscribe(rec.clone());

        let sink = raw.sink();
        sink.on_error(JoinError::source("first"));
        sink.on_error(JoinError::source("second"));
        sink.on_value(9);

        let events = rec.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
    }

    #[test]
    fn test_duplicate_source_in_one_pattern_shares_the_head() {
        let x = PushSource::<u32>::arc();
        let sx: SourceRef<u32> = x.clone();

        let doubled = join(vec![
            Pattern::new(sx.clone()).and(sx).then(|vs: Vec<u32>| (vs[0], vs[1])),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = doubled.subscribe(rec.clone());

        assert_eq!(x.subscriber_count(), 1);
        x.push(1);
        x.push(2);
        assert_eq!(rec.values(), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_cold_sources_match_during_activation() {
        // 1-ary pattern over a cold source: everything happens inside subscribe
        let src: SourceRef<i32> = IterSource::arc([4, 5, 6]);
        let out = join(vec![Pattern::new(src).then(|vs: Vec<i32>| vs[0] * 10)]).unwrap();

        let rec = Recorder::arc();
        let _sub = out.subscribe(rec.clone());
        assert_eq!(rec.values(), vec![40, 50, 60]);
        assert!(rec.events().last().unwrap().is_completed());
    }

    #[test]
    fn test_cold_and_hot_sources_mix() {
        let cold: SourceRef<u32> = IterSource::arc([1, 2, 3]);
        let hot = PushSource::<u32>::arc();
        let shot: SourceRef<u32> = hot.clone();

        let pairs = join(vec![
            Pattern::new(cold).and(shot).then(|vs: Vec<u32>| (vs[0], vs[1])),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = pairs.subscribe(rec.clone());

        hot.push(10);
        hot.push(20);
        hot.push(30);
        assert_eq!(rec.values(), vec![(1, 10), (2, 20), (3, 30)]);

        // the cold source is exhausted: the next hot value only serves to
        // surface its completion sentinel and finish the join
        hot.push(40);
        assert!(rec.events().last().unwrap().is_completed());
    }

    #[test]
    fn test_each_subscription_is_an_independent_run() {
        let a = PushSource::<u32>::arc();
        let b = PushSource::<u32>::arc();
        let sa: SourceRef<u32> = a.clone();
        let sb: SourceRef<u32> = b.clone();

        let sums = join(vec![
            Pattern::new(sa).and(sb).then(|vs: Vec<u32>| vs[0] + vs[1]),
        ])
        .unwrap();
        let first = Recorder::arc();
        let second = Recorder::arc();
        let _s1 = sums.subscribe(first.clone());
        let _s2 = sums.subscribe(second.clone());

        assert_eq!(a.subscriber_count(), 2);
        a.push(1);
        b.push(2);
        assert_eq!(first.values(), vec![3]);
        assert_eq!(second.values(), vec![3]);
    }

    #[test]
    fn test_joins_compose_as_sources() {
        let a = PushSource::<i32>::arc();
        let b = PushSource::<i32>::arc();
        let c = PushSource::<i32>::arc();
        let sa: SourceRef<i32> = a.clone();
        let sb: SourceRef<i32> = b.clone();
        let sc: SourceRef<i32> = c.clone();

        let inner = join(vec![
            Pattern::new(sa).and(sb).then(|vs: Vec<i32>| vs[0] + vs[1]),
        ])
        .unwrap();
        let inner_src: SourceRef<i32> = Arc::new(inner);

        let outer = join(vec![
            Pattern::new(inner_src).and(sc).then(|vs: Vec<i32>| vs[0] * vs[1]),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = outer.subscribe(rec.clone());

        a.push(1);
        b.push(2); // inner emits 3
        c.push(10);
        assert_eq!(rec.values(), vec![30]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_producers_keep_positional_pairing() {
        let a = PushSource::<u64>::arc();
        let b = PushSource::<u64>::arc();
        let sa: SourceRef<u64> = a.clone();
        let sb: SourceRef<u64> = b.clone();

        let pairs = join(vec![
            Pattern::new(sa).and(sb).then(|vs: Vec<u64>| (vs[0], vs[1])),
        ])
        .unwrap();
        let rec = Recorder::arc();
        let _sub = pairs.subscribe(rec.clone());

        let pa = a.clone();
        let ta = tokio::task::spawn_blocking(move || {
            for k in 0..500 {
                pa.push(k);
            }
        });
        let pb = b.clone();
        let tb = tokio::task::spawn_blocking(move || {
            for k in 0..500 {
                pb.push(k);
                if k % 64 == 0 {
                    std::thread::sleep(Duration::from_micros(50));
                }
            }
        });
        ta.await.unwrap();
        tb.await.unwrap();

        let got = rec.values();
        assert_eq!(got.len(), 500);
        for (k, (left, right)) in got.into_iter().enumerate() {
            assert_eq!(left, k as u64);
            assert_eq!(right, k as u64);
        }
    }
}
