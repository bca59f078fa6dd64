//! Terminal operations: each drives one traversal and returns a plain value.

use std::cmp::Ordering;
use std::hash::Hash;
use std::iter::Sum;

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::query::Queryable;

/// Outcome of a predicate scan, kept separate from the element so that no
/// element value doubles as a "not found" sentinel.
enum Scan<T> {
    Empty,
    NoMatch,
    Found(T),
}

impl<T> Scan<T> {
    fn strict(self, operator: &'static str) -> Result<T> {
        match self {
            Scan::Empty => Err(Error::EmptySequence { operator }),
            Scan::NoMatch => Err(Error::NoMatch { operator }),
            Scan::Found(item) => Ok(item),
        }
    }

    fn or(self, default: T) -> T {
        match self {
            Scan::Found(item) => item,
            Scan::Empty | Scan::NoMatch => default,
        }
    }
}

impl<T: Clone + 'static> Queryable<T> {
    /// Left fold seeded by the first element.
    pub fn aggregate<F>(&self, accumulate: F) -> Result<T>
    where
        F: Fn(T, T) -> T,
    {
        let mut iter = self.iter();
        let seed = iter.next().ok_or(Error::EmptySequence { operator: "aggregate" })?;
        Ok(iter.fold(seed, accumulate))
    }

    /// Left fold from `seed`; an empty sequence yields `seed`.
    pub fn aggregate_seeded<A, F>(&self, seed: A, accumulate: F) -> A
    where
        F: Fn(A, T) -> A,
    {
        self.iter().fold(seed, accumulate)
    }

    /// Left fold from `seed`, then `result` applied to the accumulator.
    pub fn aggregate_with<A, R, F, G>(&self, seed: A, accumulate: F, result: G) -> R
    where
        F: Fn(A, T) -> A,
        G: FnOnce(A) -> R,
    {
        result(self.aggregate_seeded(seed, accumulate))
    }

    /// Whether every element satisfies `predicate`; stops at the first failure.
    pub fn all<P>(&self, predicate: P) -> bool
    where
        P: Fn(&T) -> bool,
    {
        self.iter().all(|element| predicate(&element))
    }

    /// Whether the sequence has at least one element; pulls at most one.
    pub fn any(&self) -> bool {
        self.iter().next().is_some()
    }

    /// Whether some element satisfies `predicate`; stops at the first match.
    pub fn any_where<P>(&self, predicate: P) -> bool
    where
        P: Fn(&T) -> bool,
    {
        self.iter().any(|element| predicate(&element))
    }

    /// Whether the sequence produces nothing.
    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Whether some element equals `value`.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.contains_by(value, |a, b| a == b)
    }

    /// Whether some element matches `value` under `equals`.
    pub fn contains_by<E>(&self, value: &T, equals: E) -> bool
    where
        E: Fn(&T, &T) -> bool,
    {
        self.iter().any(|element| equals(value, &element))
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Number of elements satisfying `predicate`.
    pub fn count_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&T) -> bool,
    {
        self.iter().filter(|element| predicate(element)).count()
    }

    /// [`Queryable::count`] as a `u64`.
    pub fn long_count(&self) -> u64 {
        self.iter().fold(0u64, |count, _| count + 1)
    }

    /// [`Queryable::count_where`] as a `u64`.
    pub fn long_count_where<P>(&self, predicate: P) -> u64
    where
        P: Fn(&T) -> bool,
    {
        self.iter()
            .filter(|element| predicate(element))
            .fold(0u64, |count, _| count + 1)
    }

    fn scan_first<P>(&self, predicate: P) -> Scan<T>
    where
        P: Fn(&T) -> bool,
    {
        let mut seen = false;
        for element in self.iter() {
            if predicate(&element) {
                return Scan::Found(element);
            }
            seen = true;
        }
        if seen {
            Scan::NoMatch
        } else {
            Scan::Empty
        }
    }

    fn scan_last<P>(&self, predicate: P) -> Scan<T>
    where
        P: Fn(&T) -> bool,
    {
        let mut scan = Scan::Empty;
        for element in self.iter() {
            if predicate(&element) {
                scan = Scan::Found(element);
            } else if matches!(scan, Scan::Empty) {
                scan = Scan::NoMatch;
            }
        }
        scan
    }

    /// Scans until a second match is seen.
    fn scan_single<P>(&self, operator: &'static str, predicate: P) -> Result<Scan<T>>
    where
        P: Fn(&T) -> bool,
    {
        let mut scan = Scan::Empty;
        for element in self.iter() {
            if !predicate(&element) {
                if matches!(scan, Scan::Empty) {
                    scan = Scan::NoMatch;
                }
                continue;
            }
            if matches!(scan, Scan::Found(_)) {
                return Err(Error::MultipleMatches { operator });
            }
            scan = Scan::Found(element);
        }
        Ok(scan)
    }

    /// First element; pulls exactly one.
    pub fn first(&self) -> Result<T> {
        self.scan_first(|_| true).strict("first")
    }

    /// First element satisfying `predicate`.
    pub fn first_where<P>(&self, predicate: P) -> Result<T>
    where
        P: Fn(&T) -> bool,
    {
        self.scan_first(predicate).strict("first")
    }

    /// First element, or `default` when the sequence is empty.
    pub fn first_or_default(&self, default: T) -> T {
        self.scan_first(|_| true).or(default)
    }

    /// First element satisfying `predicate`, or `default`.
    pub fn first_or_default_where<P>(&self, predicate: P, default: T) -> T
    where
        P: Fn(&T) -> bool,
    {
        self.scan_first(predicate).or(default)
    }

    /// Last element.
    pub fn last(&self) -> Result<T> {
        self.scan_last(|_| true).strict("last")
    }

    /// Last element satisfying `predicate`.
    pub fn last_where<P>(&self, predicate: P) -> Result<T>
    where
        P: Fn(&T) -> bool,
    {
        self.scan_last(predicate).strict("last")
    }

    /// Last element, or `default` when the sequence is empty.
    pub fn last_or_default(&self, default: T) -> T {
        self.scan_last(|_| true).or(default)
    }

    /// Last element satisfying `predicate`, or `default`.
    pub fn last_or_default_where<P>(&self, predicate: P, default: T) -> T
    where
        P: Fn(&T) -> bool,
    {
        self.scan_last(predicate).or(default)
    }

    /// The only element; fails when the sequence is empty or longer than one.
    pub fn single(&self) -> Result<T> {
        self.scan_single("single", |_| true)?.strict("single")
    }

    /// The only element satisfying `predicate`.
    pub fn single_where<P>(&self, predicate: P) -> Result<T>
    where
        P: Fn(&T) -> bool,
    {
        self.scan_single("single", predicate)?.strict("single")
    }

    /// The only element, or `default` when empty. Still fails on multiple elements.
    pub fn single_or_default(&self, default: T) -> Result<T> {
        Ok(self.scan_single("single_or_default", |_| true)?.or(default))
    }

    /// The only element satisfying `predicate`, or `default` when none does.
    /// Still fails on multiple matches.
    pub fn single_or_default_where<P>(&self, predicate: P, default: T) -> Result<T>
    where
        P: Fn(&T) -> bool,
    {
        Ok(self.scan_single("single_or_default", predicate)?.or(default))
    }

    /// Element at a zero-based `index`; negative indices are out of range.
    pub fn element_at(&self, index: i64) -> Result<T> {
        let position = usize::try_from(index).map_err(|_| Error::OutOfRange { index })?;
        self.iter()
            .nth(position)
            .ok_or(Error::OutOfRange { index })
    }

    /// Element at `index`, or `default` when out of range.
    pub fn element_at_or_default(&self, index: i64, default: T) -> T {
        self.element_at(index).unwrap_or(default)
    }

    /// Smallest element; the first of equal minima wins.
    pub fn min(&self) -> Result<T>
    where
        T: PartialOrd,
    {
        self.min_by(|element| element.clone())
    }

    /// Smallest transformed value.
    pub fn min_by<K, F>(&self, transform: F) -> Result<K>
    where
        K: PartialOrd,
        F: Fn(&T) -> K,
    {
        extreme(self, "min", transform, Ordering::Less)
    }

    /// Largest element; the first of equal maxima wins.
    pub fn max(&self) -> Result<T>
    where
        T: PartialOrd,
    {
        self.max_by(|element| element.clone())
    }

    /// Largest transformed value.
    pub fn max_by<K, F>(&self, transform: F) -> Result<K>
    where
        K: PartialOrd,
        F: Fn(&T) -> K,
    {
        extreme(self, "max", transform, Ordering::Greater)
    }

    /// Sum of the elements; an empty sequence sums to the additive identity.
    pub fn sum(&self) -> T
    where
        T: Sum<T>,
    {
        self.iter().sum()
    }

    /// Sum of transformed elements.
    pub fn sum_by<S, F>(&self, transform: F) -> S
    where
        S: Sum<S>,
        F: Fn(T) -> S,
    {
        self.iter().map(transform).sum()
    }

    /// Arithmetic mean of the elements.
    pub fn average(&self) -> Result<f64>
    where
        T: Into<f64>,
    {
        self.average_by(Into::into)
    }

    /// Arithmetic mean of transformed elements; fails on an empty sequence.
    pub fn average_by<F>(&self, transform: F) -> Result<f64>
    where
        F: Fn(T) -> f64,
    {
        let (count, total) = self
            .iter()
            .fold((0u64, 0.0f64), |(count, total), element| {
                (count + 1, total + transform(element))
            });
        if count == 0 {
            return Err(Error::DivideByZero);
        }
        Ok(total / count as f64)
    }

    /// Materialises the sequence.
    pub fn to_list(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Materialises into a map; a later duplicate key overwrites an earlier one.
    pub fn to_dictionary<K, V, FK, FV>(&self, key: FK, value: FV) -> AHashMap<K, V>
    where
        K: Hash + Eq,
        FK: Fn(&T) -> K,
        FV: Fn(T) -> V,
    {
        self.iter()
            .map(|element| (key(&element), value(element)))
            .collect()
    }

    /// Materialises into `key -> elements`, each list in arrival order.
    pub fn to_lookup<K, F>(&self, key: F) -> AHashMap<K, Vec<T>>
    where
        K: Hash + Eq,
        F: Fn(&T) -> K,
    {
        let mut lookup: AHashMap<K, Vec<T>> = AHashMap::new();
        for element in self.iter() {
            lookup.entry(key(&element)).or_default().push(element);
        }
        lookup
    }

    /// Whether both sequences have equal length and equal elements pairwise.
    pub fn sequence_equal(&self, other: &Queryable<T>) -> bool
    where
        T: PartialEq,
    {
        self.sequence_equal_by(other, |a, b| a == b)
    }

    /// [`Queryable::sequence_equal`] under a caller-supplied comparer.
    pub fn sequence_equal_by<E>(&self, other: &Queryable<T>, equals: E) -> bool
    where
        E: Fn(&T, &T) -> bool,
    {
        let mut left = self.iter();
        let mut right = other.iter();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if equals(&a, &b) => continue,
                _ => return false,
            }
        }
    }
}

/// Keeps the first value strictly beyond the running extreme in `wanted` direction.
/// Incomparable values (NaN) never replace the running extreme.
fn extreme<T, K, F>(query: &Queryable<T>, operator: &'static str, transform: F, wanted: Ordering) -> Result<K>
where
    T: Clone + 'static,
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    let mut iter = query.iter();
    let first = iter.next().ok_or(Error::EmptySequence { operator })?;
    Ok(iter.fold(transform(&first), |best, element| {
        let candidate = transform(&element);
        if candidate.partial_cmp(&best) == Some(wanted) {
            candidate
        } else {
            best
        }
    }))
}
