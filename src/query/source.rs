//! Sources feeding a query pipeline.
//!
//! A source hands out fresh cursors. Multi-pass sources re-iterate their
//! backing collection; single-pass cursors are fronted by a [`ReplaySource`]
//! that records every drawn element so later traversals replay them.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::query::ops::OperatorKind;
use crate::query::profile::{record, QueryProfileKind};

/// Boxed pull-based stream of elements flowing between stages.
pub type Cursor<T> = Box<dyn Iterator<Item = T>>;

/// Something a pipeline can be replayed against.
pub(crate) trait Source<T> {
    /// Returns a cursor positioned at the first element.
    fn cursor(&self) -> Cursor<T>;

    /// Short label used in traces and explanations.
    fn describe(&self) -> &'static str;

    /// Appends the operators this source replays before yielding.
    fn explain(&self, _out: &mut Vec<OperatorKind>) {}
}

/// Multi-pass source over any cloneable iterable (ranges, vectors, maps).
///
/// Each cursor clones the whole iterable.
pub(crate) struct Reusable<C> {
    items: C,
}

impl<C> Reusable<C> {
    pub(crate) fn new(items: C) -> Self {
        Self { items }
    }
}

impl<C> Source<C::Item> for Reusable<C>
where
    C: IntoIterator + Clone,
    C::IntoIter: 'static,
{
    fn cursor(&self) -> Cursor<C::Item> {
        Box::new(self.items.clone().into_iter())
    }

    fn describe(&self) -> &'static str {
        "reusable"
    }
}

/// Multi-pass source over an owned buffer, cloning elements on demand.
pub(crate) struct Shared<T> {
    items: Rc<[T]>,
}

impl<T> Shared<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

impl<T: Clone + 'static> Source<T> for Shared<T> {
    fn cursor(&self) -> Cursor<T> {
        Box::new(SharedCursor {
            items: Rc::clone(&self.items),
            index: 0,
        })
    }

    fn describe(&self) -> &'static str {
        "buffer"
    }
}

struct SharedCursor<T> {
    items: Rc<[T]>,
    index: usize,
}

impl<T: Clone> Iterator for SharedCursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.items.get(self.index)?.clone();
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len() - self.index;
        (remaining, Some(remaining))
    }
}

enum Upstream<T> {
    /// Cursor not opened yet; the factory runs on the first pull.
    Deferred(Box<dyn FnOnce() -> Cursor<T>>),
    Open(Cursor<T>),
    Exhausted,
}

struct ReplayState<T> {
    drawn: Vec<T>,
    upstream: Upstream<T>,
}

impl<T: Clone> ReplayState<T> {
    /// Returns the element at `position`, drawing from upstream if needed.
    fn get(&mut self, position: usize) -> Option<T> {
        if let Some(item) = self.drawn.get(position) {
            return Some(item.clone());
        }
        debug_assert_eq!(position, self.drawn.len());
        loop {
            match std::mem::replace(&mut self.upstream, Upstream::Exhausted) {
                Upstream::Deferred(open) => {
                    trace!("replay buffer opening upstream cursor");
                    self.upstream = Upstream::Open(open());
                }
                Upstream::Open(mut cursor) => {
                    let Some(item) = cursor.next() else {
                        trace!(buffered = self.drawn.len(), "replay upstream exhausted");
                        return None;
                    };
                    record(QueryProfileKind::SourceDraw, 1);
                    self.drawn.push(item.clone());
                    self.upstream = Upstream::Open(cursor);
                    return Some(item);
                }
                Upstream::Exhausted => return None,
            }
        }
    }
}

/// Shared duplicating buffer in front of a single-pass cursor.
///
/// Every query derived from the same replay source shares one buffer, so the
/// upstream cursor is pulled at most once per element across all traversals.
pub(crate) struct ReplaySource<T> {
    state: Rc<RefCell<ReplayState<T>>>,
}

impl<T> ReplaySource<T> {
    /// Fronts an already opened cursor.
    pub(crate) fn open(cursor: Cursor<T>) -> Self {
        Self::with_upstream(Upstream::Open(cursor))
    }

    /// Opens the upstream cursor lazily on the first pull.
    pub(crate) fn deferred(open: impl FnOnce() -> Cursor<T> + 'static) -> Self {
        Self::with_upstream(Upstream::Deferred(Box::new(open)))
    }

    fn with_upstream(upstream: Upstream<T>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ReplayState {
                drawn: Vec::new(),
                upstream,
            })),
        }
    }
}

impl<T: Clone + 'static> Source<T> for ReplaySource<T> {
    fn cursor(&self) -> Cursor<T> {
        Box::new(ReplayCursor {
            state: Rc::clone(&self.state),
            position: 0,
        })
    }

    fn describe(&self) -> &'static str {
        "replay"
    }
}

struct ReplayCursor<T> {
    state: Rc<RefCell<ReplayState<T>>>,
    position: usize,
}

impl<T: Clone> Iterator for ReplayCursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.state.borrow_mut().get(self.position)?;
        self.position += 1;
        Some(item)
    }
}
