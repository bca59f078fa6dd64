//! Ordered list of recorded operators attached to a query.

use std::rc::Rc;

use crate::query::executor;
use crate::query::ops::{Operator, OperatorKind};
use crate::query::source::Cursor;

/// Recorded operators in application order.
///
/// Extending a pipeline copies the operator handles, never the operators, so
/// sibling queries share recorded state (memoised lookups) with their parent
/// but never observe each other's later operators.
pub(crate) struct Pipeline<T> {
    stages: Vec<Rc<Operator<T>>>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<T> Pipeline<T> {
    /// Returns a copy with `op` appended.
    pub(crate) fn extended(&self, op: Operator<T>) -> Self {
        let mut stages = Vec::with_capacity(self.stages.len() + 1);
        stages.extend(self.stages.iter().cloned());
        stages.push(Rc::new(op));
        Self { stages }
    }

    /// Returns a copy whose last operator is replaced by `op`.
    pub(crate) fn with_last(&self, op: Operator<T>) -> Self {
        let mut next = self.clone();
        next.stages.pop();
        next.stages.push(Rc::new(op));
        next
    }

    pub(crate) fn last(&self) -> Option<&Operator<T>> {
        self.stages.last().map(|op| op.as_ref())
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.len()
    }

    pub(crate) fn kinds(&self) -> impl Iterator<Item = OperatorKind> + '_ {
        self.stages.iter().map(|op| op.kind())
    }
}

impl<T: Clone + 'static> Pipeline<T> {
    /// Wraps `source` in every recorded stage, oldest first.
    pub(crate) fn run(&self, source: Cursor<T>) -> Cursor<T> {
        self.stages
            .iter()
            .fold(source, |cursor, op| executor::apply(op, cursor))
    }
}
