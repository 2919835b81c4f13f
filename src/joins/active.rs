//! # ActivePlan: the live form of a plan within one join run.
//!
//! Holds the plan's source positions as observer keys (pattern order), the
//! deduplicated key set (first-appearance order), and the shared selector.
//! The match algorithm itself lives on the join core so that all queue and
//! registry mutation stays under the one lock.

use crate::joins::observer::SourceKey;
use crate::joins::pattern::SelectorFn;

/// Identifier of one activated plan within one join run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PlanId(u64);

impl PlanId {
    pub(crate) fn new(raw: u64) -> Self {
        PlanId(raw)
    }
}

pub(crate) struct ActivePlan<T, R> {
    id: PlanId,
    /// One key per pattern position; the same key may appear several times
    /// when a pattern references one source at multiple positions.
    positions: Vec<SourceKey>,
    /// `positions` deduplicated, keeping first-appearance order.
    distinct: Vec<SourceKey>,
    selector: SelectorFn<T, R>,
}

impl<T, R> ActivePlan<T, R> {
    pub(crate) fn new(id: PlanId, positions: Vec<SourceKey>, selector: SelectorFn<T, R>) -> Self {
        let mut distinct = Vec::with_capacity(positions.len());
        for key in &positions {
            if !distinct.contains(key) {
                distinct.push(*key);
            }
        }
        Self {
            id,
            positions,
            distinct,
            selector,
        }
    }

    pub(crate) fn id(&self) -> PlanId {
        self.id
    }

    pub(crate) fn positions(&self) -> &[SourceKey] {
        &self.positions
    }

    pub(crate) fn distinct(&self) -> &[SourceKey] {
        &self.distinct
    }

    pub(crate) fn selector(&self) -> SelectorFn<T, R> {
        self.selector.clone()
    }
}
