//! # joinpatterns
//!
//! **joinpatterns** is a join-pattern matching engine for push-based
//! asynchronous event sources: combine N independent sources into one output
//! stream that emits only when all N have a matching element simultaneously
//! available.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────┐      ┌──────────┐      ┌──────────┐
//!   │ Source A │      │ Source B │      │ Source C │   (push-based producers,
//!   └────┬─────┘      └────┬─────┘      └────┬─────┘    arbitrary threads)
//!        ▼ subscribe       ▼                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Join run (one per subscription, one lock)                       │
//! │                                                                  │
//! │   SourceObserver(A)   SourceObserver(B)   SourceObserver(C)      │
//! │   [FIFO queue]        [FIFO queue]        [FIFO queue]           │
//! │        │  every event: re-attempt matching on waiting plans      │
//! │        ▼                                                         │
//! │   ActivePlan #1 (A, B)      ──┐  ready → dequeue one from each,  │
//! │   ActivePlan #2 (A, C)      ──┤  combine, emit                   │
//! │                               │  completed at head → retire plan │
//! │   registry: source identity ─►│  error anywhere → fail the join  │
//! │   dedup (A shared by #1, #2)  │                                  │
//! └───────────────────────────────┼──────────────────────────────────┘
//!                                 ▼
//!                     downstream Sink (values*, then one terminal, once)
//! ```
//!
//! ### Matching rules
//! - A plan fires only when **every** one of its sources has a buffered item;
//!   it then dequeues exactly one item from each and emits the combined
//!   result. The k-th output always combines the k-th item of every source —
//!   strict queue position, never timestamps.
//! - A completed source surfacing at a matched position retires that plan
//!   quietly. When no plan remains, the join completes.
//! - Any source error, or a failing combining function, fails the whole join
//!   immediately: fail-fast, no retries, terminal delivered exactly once.
//! - Sources shared across plans (same `Arc`) share one upstream
//!   subscription; each buffered item is consumed by exactly one match.
//!
//! ### Concurrency
//! One join run owns one mutex; every callback runs to completion under it on
//! the producer's thread. No thread affinity, no blocking, no cross-source
//! parallelism inside a run: two producers can never partially consume the
//! same plan's inputs. Per-source buffers are unbounded; a source outpacing
//! its peers accumulates freely.
//!
//! ## Example
//! ```
//! use joinpatterns::{channel_sink, join, IterSource, Pattern, Source, SourceEvent, SourceRef};
//!
//! let temperature: SourceRef<i32> = IterSource::arc([21, 22, 23]);
//! let humidity: SourceRef<i32> = IterSource::arc([40, 41, 42]);
//!
//! let readings = join(vec![
//!     Pattern::new(temperature)
//!         .and(humidity)
//!         .then(|vs: Vec<i32>| (vs[0], vs[1])),
//! ])
//! .expect("at least one plan");
//!
//! let (sink, mut rx) = channel_sink();
//! let _sub = readings.subscribe(sink);
//!
//! assert!(matches!(rx.try_recv(), Ok(SourceEvent::Value((21, 40)))));
//! assert!(matches!(rx.try_recv(), Ok(SourceEvent::Value((22, 41)))));
//! assert!(matches!(rx.try_recv(), Ok(SourceEvent::Value((23, 42)))));
//! assert!(matches!(rx.try_recv(), Ok(SourceEvent::Completed)));
//! ```

mod error;
mod joins;
mod sources;

pub use error::{BoxError, JoinError};
pub use joins::{join, JoinSource, Pattern, Plan};
pub use sources::{
    channel_sink, IterSource, PushSource, Sink, SinkRef, Source, SourceEvent, SourceRef,
    StreamSource, Subscription,
};
