//! Recorded operators: the closed vocabulary a pipeline is built from.

use std::cell::OnceCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashSet;
use tracing::debug;

use crate::query::ordering::{OrderingChain, SortDirection};
use crate::query::profile::{record, QueryProfileKind};
use crate::query::source::Source;
use crate::query::Queryable;

/// Every operator kind a query can record, including type-changing projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// `where` / `filter` / `where_indexed`.
    Filter,
    /// `select` / `select_indexed` / `cast`.
    Project,
    /// `select_many` family.
    FlattenProject,
    /// `skip`.
    Skip,
    /// `take`.
    Take,
    /// `skip_while`.
    SkipWhile,
    /// `take_while`.
    TakeWhile,
    /// `concat`.
    Concatenate,
    /// `reverse`.
    Reverse,
    /// `order_by` (primary key ascending).
    SortAscending,
    /// `order_by_descending` (primary key descending).
    SortDescending,
    /// `group_by` family.
    Group,
    /// `join` / `join_pairs`.
    Join,
    /// `group_join` / `group_join_pairs`.
    GroupJoin,
    /// `union`.
    Union,
    /// `intersect`.
    Intersect,
    /// `difference` / `except_values`.
    Difference,
    /// `distinct`.
    Distinct,
    /// `default_if_empty`.
    DefaultIfEmpty,
    /// `zip` / `zip_pairs`.
    Zip,
}

impl OperatorKind {
    /// Snake-case operator name.
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::Filter => "where",
            OperatorKind::Project => "select",
            OperatorKind::FlattenProject => "select_many",
            OperatorKind::Skip => "skip",
            OperatorKind::Take => "take",
            OperatorKind::SkipWhile => "skip_while",
            OperatorKind::TakeWhile => "take_while",
            OperatorKind::Concatenate => "concat",
            OperatorKind::Reverse => "reverse",
            OperatorKind::SortAscending => "order_by",
            OperatorKind::SortDescending => "order_by_descending",
            OperatorKind::Group => "group_by",
            OperatorKind::Join => "join",
            OperatorKind::GroupJoin => "group_join",
            OperatorKind::Union => "union",
            OperatorKind::Intersect => "intersect",
            OperatorKind::Difference => "difference",
            OperatorKind::Distinct => "distinct",
            OperatorKind::DefaultIfEmpty => "default_if_empty",
            OperatorKind::Zip => "zip",
        }
    }

    /// Whether the operator materialises its whole input before emitting.
    pub fn is_buffering(&self) -> bool {
        matches!(
            self,
            OperatorKind::Reverse
                | OperatorKind::SortAscending
                | OperatorKind::SortDescending
                | OperatorKind::Group
        )
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) type Predicate<T> = Rc<dyn Fn(&T) -> bool>;
pub(crate) type IndexedPredicate<T> = Rc<dyn Fn(&T, usize) -> bool>;
pub(crate) type KeyFn<T, K> = Rc<dyn Fn(&T) -> K>;

/// Per-traversal element filter carrying key-based state.
///
/// `start` is called once per traversal; the returned closure owns whatever
/// running state the traversal needs (seen-sets), while memoised secondary
/// lookups stay on the implementor and are shared by all traversals.
pub(crate) trait KeyedFilter<T> {
    fn start(&self) -> Box<dyn FnMut(&T) -> bool>;
}

/// Keeps the first element of every key.
pub(crate) struct DistinctBy<T, K> {
    key: KeyFn<T, K>,
}

impl<T, K> DistinctBy<T, K> {
    pub(crate) fn new(key: KeyFn<T, K>) -> Self {
        Self { key }
    }
}

impl<T: 'static, K: Hash + Eq + 'static> KeyedFilter<T> for DistinctBy<T, K> {
    fn start(&self) -> Box<dyn FnMut(&T) -> bool> {
        let key = Rc::clone(&self.key);
        let mut seen = AHashSet::new();
        Box::new(move |element| seen.insert(key(element)))
    }
}

/// Which side of a two-sequence operator an element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Primary,
    Secondary,
}

/// Per-traversal filter over the primary stream followed by a secondary one.
pub(crate) trait SidedFilter<T> {
    fn start(&self) -> Box<dyn FnMut(Side, &T) -> bool>;
}

/// Union seen-set: each side is keyed by its own selector, one shared set.
pub(crate) struct UnionBy<T, K> {
    key: KeyFn<T, K>,
    other_key: KeyFn<T, K>,
}

impl<T, K> UnionBy<T, K> {
    pub(crate) fn new(key: KeyFn<T, K>, other_key: KeyFn<T, K>) -> Self {
        Self { key, other_key }
    }
}

impl<T: 'static, K: Hash + Eq + 'static> SidedFilter<T> for UnionBy<T, K> {
    fn start(&self) -> Box<dyn FnMut(Side, &T) -> bool> {
        let key = Rc::clone(&self.key);
        let other_key = Rc::clone(&self.other_key);
        let mut seen = AHashSet::new();
        Box::new(move |side, element| match side {
            Side::Primary => seen.insert(key(element)),
            Side::Secondary => seen.insert(other_key(element)),
        })
    }
}

/// Key set of a secondary sequence, materialised once per operator instance.
pub(crate) struct SecondaryKeys<S, K> {
    operator: &'static str,
    secondary: Queryable<S>,
    key: KeyFn<S, K>,
    keys: OnceCell<Rc<AHashSet<K>>>,
}

impl<S, K> SecondaryKeys<S, K>
where
    S: Clone + 'static,
    K: Hash + Eq + 'static,
{
    pub(crate) fn new(operator: &'static str, secondary: Queryable<S>, key: KeyFn<S, K>) -> Self {
        Self {
            operator,
            secondary,
            key,
            keys: OnceCell::new(),
        }
    }

    fn keys(&self) -> Rc<AHashSet<K>> {
        let keys = self.keys.get_or_init(|| {
            let keys: AHashSet<K> = self.secondary.iter().map(|e| (self.key)(&e)).collect();
            debug!(operator = self.operator, keys = keys.len(), "secondary key set materialised");
            record(QueryProfileKind::MemoBuild, 1);
            Rc::new(keys)
        });
        Rc::clone(keys)
    }
}

/// Emits primary elements whose key appears in the secondary, once per key.
pub(crate) struct IntersectBy<T, S, K> {
    key: KeyFn<T, K>,
    lookup: Rc<SecondaryKeys<S, K>>,
}

impl<T, S, K> IntersectBy<T, S, K> {
    pub(crate) fn new(key: KeyFn<T, K>, lookup: SecondaryKeys<S, K>) -> Self {
        Self {
            key,
            lookup: Rc::new(lookup),
        }
    }
}

impl<T, S, K> KeyedFilter<T> for IntersectBy<T, S, K>
where
    T: 'static,
    S: Clone + 'static,
    K: Hash + Eq + 'static,
{
    fn start(&self) -> Box<dyn FnMut(&T) -> bool> {
        let key = Rc::clone(&self.key);
        let lookup = Rc::clone(&self.lookup);
        let mut emitted = AHashSet::new();
        Box::new(move |element| {
            let key = key(element);
            lookup.keys().contains(&key) && emitted.insert(key)
        })
    }
}

/// Emits primary elements whose key is absent from the secondary.
pub(crate) struct ExceptBy<T, S, K> {
    key: KeyFn<T, K>,
    lookup: Rc<SecondaryKeys<S, K>>,
}

impl<T, S, K> ExceptBy<T, S, K> {
    pub(crate) fn new(key: KeyFn<T, K>, lookup: SecondaryKeys<S, K>) -> Self {
        Self {
            key,
            lookup: Rc::new(lookup),
        }
    }
}

impl<T, S, K> KeyedFilter<T> for ExceptBy<T, S, K>
where
    T: 'static,
    S: Clone + 'static,
    K: Hash + Eq + 'static,
{
    fn start(&self) -> Box<dyn FnMut(&T) -> bool> {
        let key = Rc::clone(&self.key);
        let lookup = Rc::clone(&self.lookup);
        Box::new(move |element| !lookup.keys().contains(&key(element)))
    }
}

/// A type-preserving recorded operator.
///
/// Type-changing operators (select, group, join, zip) are not recorded here;
/// they start a new query whose source is the projected parent.
pub(crate) enum Operator<T> {
    Filter(Predicate<T>),
    FilterIndexed(IndexedPredicate<T>),
    Skip(usize),
    Take(usize),
    SkipWhile(Predicate<T>),
    TakeWhile(Predicate<T>),
    Concat(Rc<dyn Source<T>>),
    Reverse,
    Sort(OrderingChain<T>),
    Distinct(Rc<dyn KeyedFilter<T>>),
    Union {
        secondary: Rc<dyn Source<T>>,
        seen: Rc<dyn SidedFilter<T>>,
    },
    Intersect(Rc<dyn KeyedFilter<T>>),
    Difference(Rc<dyn KeyedFilter<T>>),
    DefaultIfEmpty(T),
}

impl<T> Operator<T> {
    pub(crate) fn kind(&self) -> OperatorKind {
        match self {
            Operator::Filter(_) | Operator::FilterIndexed(_) => OperatorKind::Filter,
            Operator::Skip(_) => OperatorKind::Skip,
            Operator::Take(_) => OperatorKind::Take,
            Operator::SkipWhile(_) => OperatorKind::SkipWhile,
            Operator::TakeWhile(_) => OperatorKind::TakeWhile,
            Operator::Concat(_) => OperatorKind::Concatenate,
            Operator::Reverse => OperatorKind::Reverse,
            Operator::Sort(chain) => match chain.primary_direction() {
                SortDirection::Ascending => OperatorKind::SortAscending,
                SortDirection::Descending => OperatorKind::SortDescending,
            },
            Operator::Distinct(_) => OperatorKind::Distinct,
            Operator::Union { .. } => OperatorKind::Union,
            Operator::Intersect(_) => OperatorKind::Intersect,
            Operator::Difference(_) => OperatorKind::Difference,
            Operator::DefaultIfEmpty(_) => OperatorKind::DefaultIfEmpty,
        }
    }
}
