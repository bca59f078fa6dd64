//! Type-changing operators.
//!
//! A projection ends the parent's pipeline: the projected query's source is
//! the parent query itself, so each traversal replays the parent and maps its
//! output through one [`Projection`] stage.

use std::cell::OnceCell;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::debug;

use crate::query::executor;
use crate::query::ops::{KeyFn, OperatorKind};
use crate::query::profile::{record, QueryProfileKind};
use crate::query::source::{Cursor, Source};
use crate::query::Queryable;

/// A key together with the elements that share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping<K, V> {
    key: K,
    elements: Vec<V>,
}

impl<K, V> Grouping<K, V> {
    /// Creates a grouping.
    pub fn new(key: K, elements: Vec<V>) -> Self {
        Self { key, elements }
    }

    /// The shared key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Elements in their sorted-input order.
    pub fn elements(&self) -> &[V] {
        &self.elements
    }

    /// Number of elements in the group.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the group has no elements (never true for `group_by` output).
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Splits the grouping into its key and elements.
    pub fn into_parts(self) -> (K, Vec<V>) {
        (self.key, self.elements)
    }
}

impl<K, V> IntoIterator for Grouping<K, V> {
    type Item = V;
    type IntoIter = std::vec::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

/// Buffering group stage: sorts by key, then partitions equal-key runs.
pub(crate) trait Grouper<T, U> {
    fn group(&self, items: Vec<T>) -> Vec<U>;
}

pub(crate) struct GroupBy<T, K, V, U> {
    pub(crate) key: KeyFn<T, K>,
    pub(crate) value: Rc<dyn Fn(T) -> V>,
    pub(crate) result: Rc<dyn Fn(K, Vec<V>) -> U>,
}

impl<T, K: Ord, V, U> Grouper<T, U> for GroupBy<T, K, V, U> {
    fn group(&self, items: Vec<T>) -> Vec<U> {
        let mut keyed: Vec<(K, T)> = items.into_iter().map(|e| ((self.key)(&e), e)).collect();
        // stable: equal keys keep arrival order
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let mut groups = Vec::new();
        let mut current: Option<(K, Vec<V>)> = None;
        for (key, element) in keyed {
            if let Some((run_key, run)) = current.as_mut() {
                if *run_key == key {
                    run.push((self.value)(element));
                    continue;
                }
            }
            if let Some((run_key, run)) = current.take() {
                groups.push((self.result)(run_key, run));
            }
            current = Some((key, vec![(self.value)(element)]));
        }
        if let Some((run_key, run)) = current {
            groups.push((self.result)(run_key, run));
        }
        groups
    }
}

/// Secondary sequence grouped by key, materialised once per operator instance.
pub(crate) struct SecondaryGroups<S, K> {
    operator: &'static str,
    secondary: Queryable<S>,
    key: KeyFn<S, K>,
    groups: OnceCell<Rc<AHashMap<K, Vec<S>>>>,
}

impl<S, K> SecondaryGroups<S, K>
where
    S: Clone + 'static,
    K: Hash + Eq + 'static,
{
    pub(crate) fn new(operator: &'static str, secondary: Queryable<S>, key: KeyFn<S, K>) -> Self {
        Self {
            operator,
            secondary,
            key,
            groups: OnceCell::new(),
        }
    }

    fn groups(&self) -> Rc<AHashMap<K, Vec<S>>> {
        let groups = self.groups.get_or_init(|| {
            let mut groups: AHashMap<K, Vec<S>> = AHashMap::new();
            let mut elements = 0usize;
            for element in self.secondary.iter() {
                elements += 1;
                groups.entry((self.key)(&element)).or_default().push(element);
            }
            debug!(
                operator = self.operator,
                keys = groups.len(),
                elements,
                "secondary groups materialised"
            );
            record(QueryProfileKind::MemoBuild, 1);
            Rc::new(groups)
        });
        Rc::clone(groups)
    }
}

/// Inner-join matcher: every matching secondary element yields one output.
pub(crate) trait JoinMatch<T, U> {
    fn matches(&self, outer: T) -> Vec<U>;
}

pub(crate) struct JoinBy<T, S, K, U> {
    pub(crate) outer_key: KeyFn<T, K>,
    pub(crate) inner: SecondaryGroups<S, K>,
    pub(crate) combine: Rc<dyn Fn(T, S) -> U>,
}

impl<T, S, K, U> JoinMatch<T, U> for JoinBy<T, S, K, U>
where
    T: Clone,
    S: Clone + 'static,
    K: Hash + Eq + 'static,
{
    fn matches(&self, outer: T) -> Vec<U> {
        let groups = self.inner.groups();
        match groups.get(&(self.outer_key)(&outer)) {
            Some(matches) => matches
                .iter()
                .map(|inner| (self.combine)(outer.clone(), inner.clone()))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Group-join matcher: exactly one output per outer element.
pub(crate) trait GroupJoinMatch<T, U> {
    fn matches(&self, outer: T) -> U;
}

pub(crate) struct GroupJoinBy<T, S, K, U> {
    pub(crate) outer_key: KeyFn<T, K>,
    pub(crate) inner: SecondaryGroups<S, K>,
    pub(crate) combine: Rc<dyn Fn(T, Vec<S>) -> U>,
}

impl<T, S, K, U> GroupJoinMatch<T, U> for GroupJoinBy<T, S, K, U>
where
    S: Clone + 'static,
    K: Hash + Eq + 'static,
{
    fn matches(&self, outer: T) -> U {
        let groups = self.inner.groups();
        let matches = groups
            .get(&(self.outer_key)(&outer))
            .cloned()
            .unwrap_or_default();
        (self.combine)(outer, matches)
    }
}

/// Pairwise combination with a second sequence, stopping at the shorter one.
pub(crate) trait Zipper<T, U> {
    fn zip(&self, primary: Cursor<T>) -> Cursor<U>;
}

pub(crate) struct ZipWith<S, F> {
    pub(crate) other: Queryable<S>,
    pub(crate) combine: Rc<F>,
}

impl<T, S, U, F> Zipper<T, U> for ZipWith<S, F>
where
    T: 'static,
    S: Clone + 'static,
    U: 'static,
    F: Fn(T, S) -> U + 'static,
{
    fn zip(&self, primary: Cursor<T>) -> Cursor<U> {
        let combine = Rc::clone(&self.combine);
        Box::new(
            primary
                .zip(self.other.traverse())
                .map(move |(a, b)| combine(a, b)),
        )
    }
}

pub(crate) enum Projection<T, U> {
    Select(Rc<dyn Fn(T) -> U>),
    SelectIndexed(Rc<dyn Fn(T, usize) -> U>),
    SelectMany(Rc<dyn Fn(T) -> Cursor<U>>),
    SelectManyIndexed(Rc<dyn Fn(T, usize) -> Cursor<U>>),
    Group(Rc<dyn Grouper<T, U>>),
    Join(Rc<dyn JoinMatch<T, U>>),
    GroupJoin(Rc<dyn GroupJoinMatch<T, U>>),
    Zip(Rc<dyn Zipper<T, U>>),
}

impl<T, U> Projection<T, U> {
    pub(crate) fn kind(&self) -> OperatorKind {
        match self {
            Projection::Select(_) | Projection::SelectIndexed(_) => OperatorKind::Project,
            Projection::SelectMany(_) | Projection::SelectManyIndexed(_) => {
                OperatorKind::FlattenProject
            }
            Projection::Group(_) => OperatorKind::Group,
            Projection::Join(_) => OperatorKind::Join,
            Projection::GroupJoin(_) => OperatorKind::GroupJoin,
            Projection::Zip(_) => OperatorKind::Zip,
        }
    }
}

/// Source of a projected query: the parent query plus one projection.
pub(crate) struct Projected<T, U> {
    parent: Queryable<T>,
    projection: Projection<T, U>,
}

impl<T, U> Projected<T, U> {
    pub(crate) fn new(parent: Queryable<T>, projection: Projection<T, U>) -> Self {
        Self { parent, projection }
    }
}

impl<T, U> Source<U> for Projected<T, U>
where
    T: Clone + 'static,
    U: 'static,
{
    fn cursor(&self) -> Cursor<U> {
        executor::project(&self.projection, self.parent.traverse())
    }

    fn describe(&self) -> &'static str {
        "projection"
    }

    fn explain(&self, out: &mut Vec<OperatorKind>) {
        out.extend(self.parent.explain());
        out.push(self.projection.kind());
    }
}
