//! The query object: a source plus a recorded pipeline.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use tracing::debug;

use crate::error::{non_negative, Error, Result};
use crate::query::ops::{
    DistinctBy, ExceptBy, IntersectBy, KeyFn, Operator, OperatorKind, SecondaryKeys, UnionBy,
};
use crate::query::ordering::{OrderingChain, SortDirection, SortKey};
use crate::query::pipeline::Pipeline;
use crate::query::profile::{record, QueryProfileKind};
use crate::query::projection::{
    GroupBy, GroupJoinBy, Grouping, JoinBy, Projected, Projection, SecondaryGroups, ZipWith,
};
use crate::query::source::{Cursor, ReplaySource, Reusable, Shared, Source};

/// A lazily evaluated, restartable query over a sequence.
///
/// Operator methods record a stage and return a new query; nothing runs until
/// the query is iterated or a terminal operation is called. Every traversal
/// replays the full pipeline against a fresh view of the source.
///
/// ```
/// use quarry::Queryable;
///
/// let evens = Queryable::new(1..=10).r#where(|x| x % 2 == 0).select(|x| x * 10);
/// assert_eq!(evens.to_list(), vec![20, 40, 60, 80, 100]);
/// assert_eq!(evens.count(), 5);
/// ```
pub struct Queryable<T> {
    source: Rc<dyn Source<T>>,
    pipeline: Pipeline<T>,
}

impl<T> Clone for Queryable<T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<T> fmt::Debug for Queryable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queryable")
            .field("source", &self.source.describe())
            .field("stages", &self.pipeline.kinds().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Clone + 'static> Queryable<T> {
    /// Wraps a multi-pass iterable (ranges, vectors, cloneable collections).
    ///
    /// Every traversal clones `items` and iterates the clone, which is free
    /// for ranges but copies the whole collection for a `Vec`. Use
    /// [`Queryable::from`] for vectors: the shared buffer it builds clones
    /// only the elements a traversal actually pulls.
    pub fn new<C>(items: C) -> Self
    where
        C: IntoIterator<Item = T> + Clone + 'static,
        C::IntoIter: 'static,
    {
        Self::from_source(Rc::new(Reusable::new(items)))
    }

    /// Wraps a single-pass cursor.
    ///
    /// Drawn elements are cached in a buffer shared by every query derived
    /// from this one, so re-traversal never re-reads the cursor.
    pub fn from_cursor<I>(cursor: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Self::from_source(Rc::new(ReplaySource::open(Box::new(cursor.into_iter()))))
    }

    /// Returns a query that evaluates this one at most once, replaying the
    /// cached output on later traversals.
    pub fn memoize(&self) -> Self {
        let parent = self.clone();
        Self::from_source(Rc::new(ReplaySource::deferred(move || parent.traverse())))
    }

    fn from_source(source: Rc<dyn Source<T>>) -> Self {
        Self {
            source,
            pipeline: Pipeline::default(),
        }
    }

    fn with(&self, op: Operator<T>) -> Self {
        Self {
            source: Rc::clone(&self.source),
            pipeline: self.pipeline.extended(op),
        }
    }

    fn project<U: Clone + 'static>(&self, projection: Projection<T, U>) -> Queryable<U> {
        Queryable::from_source(Rc::new(Projected::new(self.clone(), projection)))
    }

    /// Opens a fresh cursor over the source and wraps it in every stage.
    pub(crate) fn traverse(&self) -> Cursor<T> {
        debug!(
            source = self.source.describe(),
            stages = self.pipeline.len(),
            "traversal started"
        );
        record(QueryProfileKind::Traversal, 1);
        self.pipeline.run(self.source.cursor())
    }

    /// Starts a lazy traversal.
    pub fn iter(&self) -> QueryIter<T> {
        QueryIter {
            inner: self.traverse(),
        }
    }

    /// Recorded operator kinds in application order, including the stages of
    /// projected parents.
    pub fn explain(&self) -> Vec<OperatorKind> {
        let mut kinds = Vec::new();
        self.source.explain(&mut kinds);
        kinds.extend(self.pipeline.kinds());
        kinds
    }

    /// Keeps elements for which `predicate` holds.
    pub fn r#where<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'static,
    {
        self.with(Operator::Filter(Rc::new(predicate)))
    }

    /// Alias of [`Queryable::r#where`].
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'static,
    {
        self.r#where(predicate)
    }

    /// Keeps elements for which `predicate(element, index)` holds.
    pub fn where_indexed<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T, usize) -> bool + 'static,
    {
        self.with(Operator::FilterIndexed(Rc::new(predicate)))
    }

    /// Drops the first `count` elements.
    ///
    /// Fails with a contract violation when `count` is negative.
    pub fn skip(&self, count: i64) -> Result<Self> {
        let count = non_negative("skip", "count", count)?;
        Ok(self.with(Operator::Skip(count)))
    }

    /// Emits at most `count` elements, pulling no further upstream.
    ///
    /// Fails with a contract violation when `count` is negative.
    pub fn take(&self, count: i64) -> Result<Self> {
        let count = non_negative("take", "count", count)?;
        Ok(self.with(Operator::Take(count)))
    }

    /// Drops elements while `predicate` holds, then emits the rest unconditionally.
    pub fn skip_while<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'static,
    {
        self.with(Operator::SkipWhile(Rc::new(predicate)))
    }

    /// Emits elements until `predicate` first fails.
    pub fn take_while<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'static,
    {
        self.with(Operator::TakeWhile(Rc::new(predicate)))
    }

    /// Emits this sequence followed by `other`.
    pub fn concat(&self, other: &Queryable<T>) -> Self {
        self.with(Operator::Concat(Rc::new(secondary_replay(other))))
    }

    /// Emits the elements in reverse order.
    pub fn reverse(&self) -> Self {
        self.with(Operator::Reverse)
    }

    /// Stable sort by `key`, ascending.
    pub fn order_by<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + 'static,
    {
        let chain = OrderingChain::new(SortKey::new(key, SortDirection::Ascending));
        self.with(Operator::Sort(chain))
    }

    /// Stable sort by `key`, descending.
    pub fn order_by_descending<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + 'static,
    {
        let chain = OrderingChain::new(SortKey::new(key, SortDirection::Descending));
        self.with(Operator::Sort(chain))
    }

    /// Adds an ascending tie-breaker to the immediately preceding sort.
    pub fn then_by<K, F>(&self, key: F) -> Result<Self>
    where
        K: Ord,
        F: Fn(&T) -> K + 'static,
    {
        self.then("then_by", SortKey::new(key, SortDirection::Ascending))
    }

    /// Adds a descending tie-breaker to the immediately preceding sort.
    pub fn then_by_descending<K, F>(&self, key: F) -> Result<Self>
    where
        K: Ord,
        F: Fn(&T) -> K + 'static,
    {
        self.then("then_by_descending", SortKey::new(key, SortDirection::Descending))
    }

    fn then(&self, operator: &'static str, key: SortKey<T>) -> Result<Self> {
        let Some(Operator::Sort(chain)) = self.pipeline.last() else {
            return Err(Error::UnorderedChain { operator });
        };
        Ok(Self {
            source: Rc::clone(&self.source),
            pipeline: self.pipeline.with_last(Operator::Sort(chain.then(key))),
        })
    }

    /// Removes duplicate elements, keeping first occurrences.
    pub fn distinct(&self) -> Self
    where
        T: Hash + Eq,
    {
        self.distinct_by(T::clone)
    }

    /// Removes elements whose key was already seen, keeping first occurrences.
    pub fn distinct_by<K, F>(&self, key: F) -> Self
    where
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
    {
        self.with(Operator::Distinct(Rc::new(DistinctBy::new(key_fn(key)))))
    }

    /// Set union: this sequence then `other`, each element once.
    pub fn union(&self, other: &Queryable<T>) -> Self
    where
        T: Hash + Eq,
    {
        self.union_by(other, T::clone)
    }

    /// Set union by key; the first occurrence across both sequences wins.
    pub fn union_by<K, F>(&self, other: &Queryable<T>, key: F) -> Self
    where
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
    {
        let key = key_fn(key);
        self.union_with(other, Rc::clone(&key), key)
    }

    /// Set union where `other`'s elements are keyed by `other_key`.
    pub fn union_by_keys<K, F, G>(&self, other: &Queryable<T>, key: F, other_key: G) -> Self
    where
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
        G: Fn(&T) -> K + 'static,
    {
        self.union_with(other, key_fn(key), key_fn(other_key))
    }

    fn union_with<K>(&self, other: &Queryable<T>, key: KeyFn<T, K>, other_key: KeyFn<T, K>) -> Self
    where
        K: Hash + Eq + 'static,
    {
        self.with(Operator::Union {
            secondary: Rc::new(secondary_replay(other)),
            seen: Rc::new(UnionBy::new(key, other_key)),
        })
    }

    /// Set intersection: elements also present in `other`, each once.
    pub fn intersect(&self, other: &Queryable<T>) -> Self
    where
        T: Hash + Eq,
    {
        self.intersect_by(other, T::clone)
    }

    /// Set intersection by key; `other`'s key set is built once per operator.
    pub fn intersect_by<K, F>(&self, other: &Queryable<T>, key: F) -> Self
    where
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
    {
        let key = key_fn(key);
        self.intersect_with(other, Rc::clone(&key), key)
    }

    /// Set intersection against a sequence of another type, keyed by `other_key`.
    pub fn intersect_by_keys<S, K, F, G>(&self, other: &Queryable<S>, key: F, other_key: G) -> Self
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
        G: Fn(&S) -> K + 'static,
    {
        self.intersect_with(other, key_fn(key), key_fn(other_key))
    }

    fn intersect_with<S, K>(&self, other: &Queryable<S>, key: KeyFn<T, K>, other_key: KeyFn<S, K>) -> Self
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
    {
        let lookup = SecondaryKeys::new("intersect", other.clone(), other_key);
        self.with(Operator::Intersect(Rc::new(IntersectBy::new(key, lookup))))
    }

    /// Set difference: elements absent from `other`.
    pub fn difference(&self, other: &Queryable<T>) -> Self
    where
        T: Hash + Eq,
    {
        self.difference_by(other, T::clone)
    }

    /// Set difference by key; `other`'s key set is built once per operator.
    pub fn difference_by<K, F>(&self, other: &Queryable<T>, key: F) -> Self
    where
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
    {
        let key = key_fn(key);
        self.difference_with(other, Rc::clone(&key), key)
    }

    /// Set difference against a sequence of another type, keyed by `other_key`.
    pub fn difference_by_keys<S, K, F, G>(&self, other: &Queryable<S>, key: F, other_key: G) -> Self
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
        G: Fn(&S) -> K + 'static,
    {
        self.difference_with(other, key_fn(key), key_fn(other_key))
    }

    fn difference_with<S, K>(&self, other: &Queryable<S>, key: KeyFn<T, K>, other_key: KeyFn<S, K>) -> Self
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
    {
        let lookup = SecondaryKeys::new("difference", other.clone(), other_key);
        self.with(Operator::Difference(Rc::new(ExceptBy::new(key, lookup))))
    }

    /// Alias of [`Queryable::difference`].
    pub fn except_values(&self, other: &Queryable<T>) -> Self
    where
        T: Hash + Eq,
    {
        self.difference(other)
    }

    /// Alias of [`Queryable::difference_by`].
    pub fn except_values_by<K, F>(&self, other: &Queryable<T>, key: F) -> Self
    where
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + 'static,
    {
        self.difference_by(other, key)
    }

    /// Emits the sequence, or only `value` when the sequence is empty.
    pub fn default_if_empty(&self, value: T) -> Self {
        self.with(Operator::DefaultIfEmpty(value))
    }

    /// Replaces every element by `selector(element)`.
    pub fn select<U, F>(&self, selector: F) -> Queryable<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> U + 'static,
    {
        self.project(Projection::Select(Rc::new(selector)))
    }

    /// Replaces every element by `selector(element, index)`.
    pub fn select_indexed<U, F>(&self, selector: F) -> Queryable<U>
    where
        U: Clone + 'static,
        F: Fn(T, usize) -> U + 'static,
    {
        self.project(Projection::SelectIndexed(Rc::new(selector)))
    }

    /// Converts every element with [`From`].
    pub fn cast<U>(&self) -> Queryable<U>
    where
        U: From<T> + Clone + 'static,
    {
        self.select(U::from)
    }

    /// Flattens the sub-sequence produced for each element.
    pub fn select_many<I, F>(&self, selector: F) -> Queryable<I::Item>
    where
        I: IntoIterator,
        I::Item: Clone + 'static,
        I::IntoIter: 'static,
        F: Fn(T) -> I + 'static,
    {
        self.project(Projection::SelectMany(Rc::new(move |element: T| {
            Box::new(selector(element).into_iter()) as Cursor<I::Item>
        })))
    }

    /// Flattens the sub-sequence produced for each `(element, index)`.
    pub fn select_many_indexed<I, F>(&self, selector: F) -> Queryable<I::Item>
    where
        I: IntoIterator,
        I::Item: Clone + 'static,
        I::IntoIter: 'static,
        F: Fn(T, usize) -> I + 'static,
    {
        self.project(Projection::SelectManyIndexed(Rc::new(move |element: T, index: usize| {
            Box::new(selector(element, index).into_iter()) as Cursor<I::Item>
        })))
    }

    /// Flattens sub-sequences, combining each sub-element with its parent.
    pub fn select_many_with<I, R, F, C>(&self, selector: F, combine: C) -> Queryable<R>
    where
        I: IntoIterator,
        I::IntoIter: 'static,
        R: Clone + 'static,
        F: Fn(&T) -> I + 'static,
        C: Fn(&T, I::Item) -> R + 'static,
    {
        let combine = Rc::new(combine);
        self.project(Projection::SelectMany(Rc::new(move |element: T| {
            let combine = Rc::clone(&combine);
            let children = selector(&element).into_iter();
            Box::new(children.map(move |child| combine(&element, child))) as Cursor<R>
        })))
    }

    /// Groups elements by key, in ascending key order.
    pub fn group_by<K, F>(&self, key: F) -> Queryable<Grouping<K, T>>
    where
        K: Ord + Clone + 'static,
        F: Fn(&T) -> K + 'static,
    {
        self.group_by_result(key, |element| element, Grouping::new)
    }

    /// Groups elements by key, transforming each grouped element.
    pub fn group_by_with<K, V, F, G>(&self, key: F, value: G) -> Queryable<Grouping<K, V>>
    where
        K: Ord + Clone + 'static,
        V: Clone + 'static,
        F: Fn(&T) -> K + 'static,
        G: Fn(T) -> V + 'static,
    {
        self.group_by_result(key, value, Grouping::new)
    }

    /// Groups elements by key and combines each key with its elements.
    pub fn group_by_result<K, V, R, F, G, C>(&self, key: F, value: G, result: C) -> Queryable<R>
    where
        K: Ord + 'static,
        V: 'static,
        R: Clone + 'static,
        F: Fn(&T) -> K + 'static,
        G: Fn(T) -> V + 'static,
        C: Fn(K, Vec<V>) -> R + 'static,
    {
        self.project(Projection::Group(Rc::new(GroupBy {
            key: key_fn(key),
            value: Rc::new(value),
            result: Rc::new(result),
        })))
    }

    /// Inner join: `combine(outer, inner)` for every pair with equal keys.
    ///
    /// `inner` is grouped by key once per operator instance; output follows
    /// outer order, then inner order within a key.
    pub fn join<S, K, R, FO, FI, C>(
        &self,
        inner: &Queryable<S>,
        outer_key: FO,
        inner_key: FI,
        combine: C,
    ) -> Queryable<R>
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&S) -> K + 'static,
        C: Fn(T, S) -> R + 'static,
    {
        self.project(Projection::Join(Rc::new(JoinBy {
            outer_key: key_fn(outer_key),
            inner: SecondaryGroups::new("join", inner.clone(), key_fn(inner_key)),
            combine: Rc::new(combine),
        })))
    }

    /// Inner join emitting `(outer, inner)` pairs.
    pub fn join_pairs<S, K, FO, FI>(
        &self,
        inner: &Queryable<S>,
        outer_key: FO,
        inner_key: FI,
    ) -> Queryable<(T, S)>
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&S) -> K + 'static,
    {
        self.join(inner, outer_key, inner_key, |outer, inner| (outer, inner))
    }

    /// Grouped join: one `combine(outer, matches)` per outer element.
    pub fn group_join<S, K, R, FO, FI, C>(
        &self,
        inner: &Queryable<S>,
        outer_key: FO,
        inner_key: FI,
        combine: C,
    ) -> Queryable<R>
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&S) -> K + 'static,
        C: Fn(T, Vec<S>) -> R + 'static,
    {
        self.project(Projection::GroupJoin(Rc::new(GroupJoinBy {
            outer_key: key_fn(outer_key),
            inner: SecondaryGroups::new("group_join", inner.clone(), key_fn(inner_key)),
            combine: Rc::new(combine),
        })))
    }

    /// Grouped join emitting `(outer, matches)` pairs.
    pub fn group_join_pairs<S, K, FO, FI>(
        &self,
        inner: &Queryable<S>,
        outer_key: FO,
        inner_key: FI,
    ) -> Queryable<(T, Vec<S>)>
    where
        S: Clone + 'static,
        K: Hash + Eq + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&S) -> K + 'static,
    {
        self.group_join(inner, outer_key, inner_key, |outer, matches| (outer, matches))
    }

    /// Combines corresponding elements, stopping at the shorter sequence.
    pub fn zip<S, R, C>(&self, other: &Queryable<S>, combine: C) -> Queryable<R>
    where
        S: Clone + 'static,
        R: Clone + 'static,
        C: Fn(T, S) -> R + 'static,
    {
        self.project(Projection::Zip(Rc::new(ZipWith {
            other: other.clone(),
            combine: Rc::new(combine),
        })))
    }

    /// Pairs corresponding elements, stopping at the shorter sequence.
    pub fn zip_pairs<S>(&self, other: &Queryable<S>) -> Queryable<(T, S)>
    where
        S: Clone + 'static,
    {
        self.zip(other, |a, b| (a, b))
    }
}

fn key_fn<T, K, F>(key: F) -> KeyFn<T, K>
where
    F: Fn(&T) -> K + 'static,
{
    Rc::new(key)
}

/// Streamed secondaries are replayed so each operator reads them at most once.
fn secondary_replay<T: Clone + 'static>(other: &Queryable<T>) -> ReplaySource<T> {
    let other = other.clone();
    ReplaySource::deferred(move || other.traverse())
}

impl<T: Clone + 'static> From<Vec<T>> for Queryable<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_source(Rc::new(Shared::new(items)))
    }
}

impl<T: Clone + 'static> FromIterator<T> for Queryable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

/// Lazy traversal of a [`Queryable`].
pub struct QueryIter<T> {
    inner: Cursor<T>,
}

impl<T> Iterator for QueryIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Clone + 'static> IntoIterator for &Queryable<T> {
    type Item = T;
    type IntoIter = QueryIter<T>;

    fn into_iter(self) -> QueryIter<T> {
        self.iter()
    }
}

impl<T: Clone + 'static> IntoIterator for Queryable<T> {
    type Item = T;
    type IntoIter = QueryIter<T>;

    fn into_iter(self) -> QueryIter<T> {
        self.iter()
    }
}
