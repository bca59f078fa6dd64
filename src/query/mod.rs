#![forbid(unsafe_code)]

//! Deferred-execution query engine.
//!
//! A [`Queryable`] pairs a source with a recorded pipeline of operators.
//! Declaring an operator never touches the source; every traversal replays
//! the whole pipeline against a fresh cursor, pulling only as many elements
//! as the consumer asks for.

/// Stage executor for recorded operators and projections.
mod executor;

/// Closed operator vocabulary and per-operator filter state.
pub mod ops;

/// Multi-key stable ordering.
pub mod ordering;

/// Copy-on-extend list of recorded operators.
mod pipeline;

/// Evaluation counters enabled via `QUARRY_PROFILE`.
pub mod profile;

/// Type-changing operators: select, group, join, zip.
pub mod projection;

/// The user-facing query object.
mod queryable;

/// Multi-pass and replaying sources.
pub mod source;

/// Eager operations that drive a traversal.
mod terminal;

pub use ops::OperatorKind;
pub use ordering::SortDirection;
pub use profile::{profile_snapshot, reset_profile, set_profiling, QueryProfileSnapshot};
pub use projection::Grouping;
pub use queryable::{QueryIter, Queryable};
pub use source::Cursor;
