//! Ordering chain built by `order_by` / `then_by`.

use std::cmp::Reverse;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Direction in which a sort key is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest key first.
    Ascending,
    /// Largest key first.
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

type KeySort<T> = Rc<dyn Fn(&mut [T])>;

/// One key of an ordering chain; the key type is erased into a stable sort pass.
pub(crate) struct SortKey<T> {
    sort: KeySort<T>,
    direction: SortDirection,
}

impl<T> Clone for SortKey<T> {
    fn clone(&self) -> Self {
        Self {
            sort: Rc::clone(&self.sort),
            direction: self.direction,
        }
    }
}

impl<T> SortKey<T> {
    /// Each pass evaluates `key` once per element.
    pub(crate) fn new<K, F>(key: F, direction: SortDirection) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + 'static,
    {
        let sort: KeySort<T> = match direction {
            SortDirection::Ascending => {
                Rc::new(move |items: &mut [T]| items.sort_by_cached_key(|element| key(element)))
            }
            SortDirection::Descending => Rc::new(move |items: &mut [T]| {
                items.sort_by_cached_key(|element| Reverse(key(element)))
            }),
        };
        Self { sort, direction }
    }
}

/// Keys in declaration order: the first key is primary, later keys break ties.
pub(crate) struct OrderingChain<T> {
    keys: SmallVec<[SortKey<T>; 2]>,
}

impl<T> Clone for OrderingChain<T> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<T> OrderingChain<T> {
    pub(crate) fn new(primary: SortKey<T>) -> Self {
        let mut keys = SmallVec::new();
        keys.push(primary);
        Self { keys }
    }

    /// Returns a copy of this chain with a subordinate key appended.
    pub(crate) fn then(&self, key: SortKey<T>) -> Self {
        let mut next = self.clone();
        next.keys.push(key);
        next
    }

    pub(crate) fn primary_direction(&self) -> SortDirection {
        self.keys[0].direction
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Sorts `items` in place.
    ///
    /// One stable pass per key, from the last declared key to the primary,
    /// so each earlier key reorders only elements that differ under it.
    pub(crate) fn sort(&self, items: &mut [T]) {
        for key in self.keys.iter().rev() {
            (key.sort)(items);
        }
    }
}
