//! Stage executor: turns one recorded operator into a lazy stream stage.
//!
//! Streaming operators wrap their input one element at a time. Buffering
//! operators (reverse, sort, group) defer materialisation until the first
//! pull so that building a traversal never consumes the source.

use std::rc::Rc;

use tracing::trace;

use crate::query::ops::{Operator, Side};
use crate::query::profile::{record, QueryProfileKind};
use crate::query::projection::{JoinMatch, Projection};
use crate::query::source::Cursor;

/// Applies a type-preserving operator to `input`.
pub(crate) fn apply<T: Clone + 'static>(op: &Operator<T>, input: Cursor<T>) -> Cursor<T> {
    match op {
        Operator::Filter(predicate) => {
            let predicate = Rc::clone(predicate);
            Box::new(input.filter(move |element| predicate(element)))
        }
        Operator::FilterIndexed(predicate) => {
            let predicate = Rc::clone(predicate);
            Box::new(
                input
                    .enumerate()
                    .filter(move |(index, element)| predicate(element, *index))
                    .map(|(_, element)| element),
            )
        }
        Operator::Skip(count) => Box::new(input.skip(*count)),
        Operator::Take(count) => Box::new(input.take(*count)),
        Operator::SkipWhile(predicate) => {
            let predicate = Rc::clone(predicate);
            Box::new(input.skip_while(move |element| predicate(element)))
        }
        Operator::TakeWhile(predicate) => {
            let predicate = Rc::clone(predicate);
            Box::new(input.take_while(move |element| predicate(element)))
        }
        Operator::Concat(secondary) => Box::new(input.chain(secondary.cursor())),
        Operator::Reverse => Box::new(BufferedStream::new("reverse", input, |mut items| {
            items.reverse();
            items
        })),
        Operator::Sort(chain) => {
            let chain = chain.clone();
            Box::new(BufferedStream::new("order_by", input, move |mut items| {
                chain.sort(&mut items);
                items
            }))
        }
        Operator::Distinct(filter) | Operator::Intersect(filter) | Operator::Difference(filter) => {
            let mut keep = filter.start();
            Box::new(input.filter(move |element| keep(element)))
        }
        Operator::Union { secondary, seen } => {
            let mut keep = seen.start();
            Box::new(
                input
                    .map(|element| (Side::Primary, element))
                    .chain(secondary.cursor().map(|element| (Side::Secondary, element)))
                    .filter_map(move |(side, element)| keep(side, &element).then_some(element)),
            )
        }
        Operator::DefaultIfEmpty(default) => Box::new(DefaultIfEmptyStream {
            input,
            default: Some(default.clone()),
        }),
    }
}

/// Applies a type-changing projection to `input`.
pub(crate) fn project<T, U>(projection: &Projection<T, U>, input: Cursor<T>) -> Cursor<U>
where
    T: 'static,
    U: 'static,
{
    match projection {
        Projection::Select(selector) => {
            let selector = Rc::clone(selector);
            Box::new(input.map(move |element| selector(element)))
        }
        Projection::SelectIndexed(selector) => {
            let selector = Rc::clone(selector);
            Box::new(
                input
                    .enumerate()
                    .map(move |(index, element)| selector(element, index)),
            )
        }
        Projection::SelectMany(selector) => {
            let selector = Rc::clone(selector);
            Box::new(input.flat_map(move |element| selector(element)))
        }
        Projection::SelectManyIndexed(selector) => {
            let selector = Rc::clone(selector);
            Box::new(
                input
                    .enumerate()
                    .flat_map(move |(index, element)| selector(element, index)),
            )
        }
        Projection::Group(grouper) => {
            let grouper = Rc::clone(grouper);
            Box::new(BufferedStream::new("group_by", input, move |items| {
                grouper.group(items)
            }))
        }
        Projection::Join(matcher) => Box::new(JoinStream {
            input,
            matcher: Rc::clone(matcher),
            pending: Vec::new().into_iter(),
        }),
        Projection::GroupJoin(matcher) => {
            let matcher = Rc::clone(matcher);
            Box::new(input.map(move |outer| matcher.matches(outer)))
        }
        Projection::Zip(zipper) => zipper.zip(input),
    }
}

type Finish<T, U> = Box<dyn FnOnce(Vec<T>) -> Vec<U>>;

enum Buffering<T, U> {
    Pending { input: Cursor<T>, finish: Finish<T, U> },
    Draining(std::vec::IntoIter<U>),
}

/// Materialises its whole input on the first pull, then drains the result.
struct BufferedStream<T, U> {
    stage: &'static str,
    state: Option<Buffering<T, U>>,
}

impl<T, U> BufferedStream<T, U> {
    fn new(
        stage: &'static str,
        input: Cursor<T>,
        finish: impl FnOnce(Vec<T>) -> Vec<U> + 'static,
    ) -> Self {
        Self {
            stage,
            state: Some(Buffering::Pending {
                input,
                finish: Box::new(finish),
            }),
        }
    }
}

impl<T, U> Iterator for BufferedStream<T, U> {
    type Item = U;

    fn next(&mut self) -> Option<U> {
        loop {
            match self.state.take()? {
                Buffering::Pending { input, finish } => {
                    let items: Vec<T> = input.collect();
                    trace!(stage = self.stage, elements = items.len(), "buffering stage materialised");
                    record(QueryProfileKind::Buffered, items.len() as u64);
                    self.state = Some(Buffering::Draining(finish(items).into_iter()));
                }
                Buffering::Draining(mut items) => {
                    let item = items.next();
                    self.state = Some(Buffering::Draining(items));
                    return item;
                }
            }
        }
    }
}

struct DefaultIfEmptyStream<T> {
    input: Cursor<T>,
    /// Cleared as soon as the input yields anything.
    default: Option<T>,
}

impl<T> Iterator for DefaultIfEmptyStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.input.next() {
            Some(item) => {
                self.default = None;
                Some(item)
            }
            None => self.default.take(),
        }
    }
}

struct JoinStream<T, U> {
    input: Cursor<T>,
    matcher: Rc<dyn JoinMatch<T, U>>,
    pending: std::vec::IntoIter<U>,
}

impl<T, U> Iterator for JoinStream<T, U> {
    type Item = U;

    fn next(&mut self) -> Option<U> {
        loop {
            if let Some(item) = self.pending.next() {
                return Some(item);
            }
            let outer = self.input.next()?;
            self.pending = self.matcher.matches(outer).into_iter();
        }
    }
}
