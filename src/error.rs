//! Error types used by the join engine.
//!
//! Every failure in this crate is terminal to the join it occurs in: there are
//! no retries. [`JoinError`] classifies the three ways a join can go wrong:
//!
//! - [`JoinError::Source`] — an upstream source signalled failure;
//! - [`JoinError::Selector`] — a combining function failed on an otherwise
//!   successful match;
//! - [`JoinError::NoPlans`] — builder misuse caught synchronously at
//!   construction time, never deferred to subscription.
//!
//! Both failure payloads live behind an `Arc` so the error is cheap to clone:
//! the same terminal error is delivered once to the downstream sink and may
//! additionally be surfaced through diagnostics.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error payload accepted from sources and fallible selectors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// # Errors produced by the join engine.
///
/// Delivery to a downstream sink is exactly once: whichever terminal signal
/// (error or completion) wins the race is the only one delivered.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum JoinError {
    /// An upstream source failed. Fatal to the whole join; every sibling
    /// source is cancelled.
    #[error("source failed: {reason}")]
    Source {
        /// The failure reported by the source.
        reason: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A combining function failed while producing a matched result.
    /// Treated exactly like a source failure.
    #[error("selector failed: {reason}")]
    Selector {
        /// The failure returned by the selector.
        reason: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// [`join`](crate::join) was called with zero plans.
    #[error("join requires at least one plan")]
    NoPlans,
}

impl JoinError {
    /// Wraps a source failure.
    pub fn source(reason: impl Into<BoxError>) -> Self {
        JoinError::Source {
            reason: Arc::from(reason.into()),
        }
    }

    /// Wraps a selector failure.
    pub fn selector(reason: impl Into<BoxError>) -> Self {
        JoinError::Selector {
            reason: Arc::from(reason.into()),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use joinpatterns::JoinError;
    ///
    /// assert_eq!(JoinError::source("boom").as_label(), "source_error");
    /// assert_eq!(JoinError::NoPlans.as_label(), "no_plans");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JoinError::Source { .. } => "source_error",
            JoinError::Selector { .. } => "selector_error",
            JoinError::NoPlans => "no_plans",
        }
    }
}
