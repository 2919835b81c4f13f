//! # PushSource: hand-driven hot source.
//!
//! A multi-producer source driven by explicit calls: [`push`](PushSource::push),
//! [`complete`](PushSource::complete), [`fail`](PushSource::fail). Each signal
//! fans out to every live subscriber.
//!
//! ## Rules
//! - **Hot**: late subscribers miss earlier values; they only receive the
//!   remembered terminal signal, if one was already delivered.
//! - **Terminal memory**: after `complete`/`fail`, further pushes are dropped
//!   and new subscribers get the terminal signal immediately.
//! - **Pruning**: cancelled subscriptions are pruned lazily on the next
//!   `push`/`subscriber_count` call; a cancelled sink never receives a signal
//!   even before pruning.
//! - Signals are delivered outside the internal lock, so a sink may call back
//!   into this source without deadlocking. Per-producer FIFO order holds;
//!   ordering across racing producers is whatever the lock arbitration gives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, JoinError};
use crate::sources::source::{SinkRef, Source};
use crate::sources::subscription::Subscription;

enum Terminal {
    Completed,
    Failed(JoinError),
}

struct Slot<T> {
    sink: SinkRef<T>,
    token: CancellationToken,
}

struct PushState<T> {
    slots: Vec<Slot<T>>,
    terminal: Option<Terminal>,
}

/// Hand-driven hot source; the workhorse for feeding joins from ordinary
/// imperative code (and from tests).
pub struct PushSource<T> {
    state: Mutex<PushState<T>>,
}

impl<T> Default for PushSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PushSource<T> {
    /// Creates an empty, non-terminated source.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PushState {
                slots: Vec::new(),
                terminal: None,
            }),
        }
    }

    /// Creates the source behind a shared handle.
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn state(&self) -> MutexGuard<'_, PushState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live (not cancelled) subscriber count, pruning cancelled slots first.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.slots.retain(|s| !s.token.is_cancelled());
        state.slots.len()
    }

    /// Snapshot of live sinks; pruning happens here so a long-gone
    /// subscriber does not keep its sink alive.
    fn live_sinks(&self) -> Vec<(SinkRef<T>, CancellationToken)> {
        let mut state = self.state();
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.slots.retain(|s| !s.token.is_cancelled());
        state
            .slots
            .iter()
            .map(|s| (s.sink.clone(), s.token.clone()))
            .collect()
    }

    /// Takes every live sink and marks the source terminated, or returns
    /// `None` if a terminal signal was already delivered.
    fn terminate(&self, terminal: Terminal) -> Option<Vec<(SinkRef<T>, CancellationToken)>> {
        let mut state = self.state();
        if state.terminal.is_some() {
            return None;
        }
        state.terminal = Some(terminal);
        Some(
            state
                .slots
                .drain(..)
                .map(|s| (s.sink, s.token))
                .collect(),
        )
    }
}

impl<T: Clone> PushSource<T> {
    /// Delivers `value` to every live subscriber. Dropped after termination.
    pub fn push(&self, value: T) {
        for (sink, token) in self.live_sinks() {
            if !token.is_cancelled() {
                sink.on_value(value.clone());
            }
        }
    }

    /// Completes the source; at most the first terminal call wins.
    pub fn complete(&self) {
        if let Some(sinks) = self.terminate(Terminal::Completed) {
            for (sink, token) in sinks {
                if !token.is_cancelled() {
                    sink.on_completed();
                }
            }
        }
    }

    /// Fails the source; at most the first terminal call wins.
    pub fn fail(&self, reason: impl Into<BoxError>) {
        let error = JoinError::source(reason);
        if let Some(sinks) = self.terminate(Terminal::Failed(error.clone())) {
            for (sink, token) in sinks {
                if !token.is_cancelled() {
                    sink.on_error(error.clone());
                }
            }
        }
    }
}

impl<T: Clone + Send + 'static> Source<T> for PushSource<T> {
    fn subscribe(&self, sink: SinkRef<T>) -> Subscription {
        let token = CancellationToken::new();
        let replay = {
            let mut state = self.state();
            match &state.terminal {
                Some(Terminal::Completed) => Some(None),
                Some(Terminal::Failed(e)) => Some(Some(e.clone())),
                None => {
                    state.slots.push(Slot {
                        sink: sink.clone(),
                        token: token.clone(),
                    });
                    None
                }
            }
        };
        match replay {
            Some(Some(error)) => sink.on_error(error),
            Some(None) => sink.on_completed(),
            None => {}
        }
        Subscription::new(token)
    }
}
