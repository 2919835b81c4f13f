//! # Pattern and Plan builders.
//!
//! A [`Pattern`] is an immutable, ordered tuple of sources awaiting
//! simultaneous data — arity 1 and up, one generic representation for every
//! arity. [`Pattern::then`] (or [`Pattern::then_try`] for fallible
//! combiners) finalizes it into a [`Plan`], ready to hand to
//! [`join`](crate::join).
//!
//! ## Rules
//! - Builders are value-style: each step consumes and returns, nothing is
//!   mutated in place.
//! - The combining function receives the matched values as a `Vec<T>`, one
//!   entry per pattern position, in pattern order.
//! - Per-source buffers are unbounded: if one source outpaces its peers its
//!   buffer grows without limit until the join terminates.
//! - A pattern may reference the same source (the same `Arc`) at several
//!   positions; a single buffered item then satisfies all of those positions
//!   and its value is cloned into each.

use std::sync::Arc;

use crate::error::BoxError;
use crate::sources::SourceRef;

/// Combining function: matched values in, one result (or failure) out.
pub(crate) type SelectorFn<T, R> = Arc<dyn Fn(Vec<T>) -> Result<R, BoxError> + Send + Sync>;

/// Ordered tuple of sources awaiting simultaneous data.
///
/// # Example
/// ```
/// use joinpatterns::{IterSource, Pattern, SourceRef};
///
/// let a: SourceRef<i32> = IterSource::arc([1, 2]);
/// let b: SourceRef<i32> = IterSource::arc([10, 20]);
/// let plan = Pattern::new(a).and(b).then(|vs: Vec<i32>| vs[0] + vs[1]);
/// assert_eq!(plan.arity(), 2);
/// ```
pub struct Pattern<T> {
    sources: Vec<SourceRef<T>>,
}

impl<T> Pattern<T> {
    /// Seeds a pattern with its first source (arity 1).
    pub fn new(source: SourceRef<T>) -> Self {
        Self {
            sources: vec![source],
        }
    }

    /// Appends one more source, growing the arity by one.
    pub fn and(mut self, source: SourceRef<T>) -> Self {
        self.sources.push(source);
        self
    }

    /// Number of source positions.
    pub fn arity(&self) -> usize {
        self.sources.len()
    }

    /// Finalizes with an infallible combining function.
    pub fn then<R, F>(self, combine: F) -> Plan<T, R>
    where
        F: Fn(Vec<T>) -> R + Send + Sync + 'static,
    {
        self.then_try(move |values| Ok(combine(values)))
    }

    /// Finalizes with a fallible combining function. An `Err` during a match
    /// fails the whole join as a selector error.
    pub fn then_try<R, F>(self, combine: F) -> Plan<T, R>
    where
        F: Fn(Vec<T>) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        Plan {
            inner: Arc::new(PlanInner {
                sources: self.sources,
                selector: Arc::new(combine),
            }),
        }
    }
}

struct PlanInner<T, R> {
    sources: Vec<SourceRef<T>>,
    selector: SelectorFn<T, R>,
}

/// A pattern plus its combining function. Immutable and cheap to clone; one
/// plan can take part in any number of join subscriptions.
pub struct Plan<T, R> {
    inner: Arc<PlanInner<T, R>>,
}

impl<T, R> Clone for Plan<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, R> Plan<T, R> {
    /// Number of source positions.
    pub fn arity(&self) -> usize {
        self.inner.sources.len()
    }

    pub(crate) fn sources(&self) -> &[SourceRef<T>] {
        &self.inner.sources
    }

    pub(crate) fn selector(&self) -> SelectorFn<T, R> {
        self.inner.selector.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::IterSource;

    #[test]
    fn test_and_appends_in_order() {
        let a: SourceRef<u8> = IterSource::arc([1]);
        let b: SourceRef<u8> = IterSource::arc([2]);
        let c: SourceRef<u8> = IterSource::arc([3]);

        let pattern = Pattern::new(a.clone()).and(b.clone()).and(c.clone());
        assert_eq!(pattern.arity(), 3);

        let plan = pattern.then(|values: Vec<u8>| values);
        let keys: Vec<usize> = plan
            .sources()
            .iter()
            .map(|s| Arc::as_ptr(s) as *const () as usize)
            .collect();
        let expected: Vec<usize> = [&a, &b, &c]
            .iter()
            .map(|s| Arc::as_ptr(s) as *const () as usize)
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_plan_clone_shares_the_pattern() {
        let a: SourceRef<u8> = IterSource::arc([1]);
        let plan = Pattern::new(a).then(|values: Vec<u8>| values[0]);
        let copy = plan.clone();
        assert_eq!(plan.arity(), copy.arity());
        assert!(Arc::ptr_eq(&plan.inner, &copy.inner));
    }
}
