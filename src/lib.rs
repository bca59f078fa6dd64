//! Lazy, restartable query combinators over in-memory and streaming sequences.
//!
//! ```
//! use quarry::Queryable;
//!
//! let words = Queryable::new(vec!["pear", "fig", "apple", "kiwi"]);
//! let by_len = words.order_by(|w| w.len()).then_by(|w| *w).unwrap();
//! assert_eq!(by_len.to_list(), vec!["fig", "kiwi", "pear", "apple"]);
//! ```

#![warn(missing_docs)]

pub mod cli;
mod error;
pub mod query;

pub use error::{Error, Result};
pub use query::{Grouping, OperatorKind, QueryIter, Queryable, SortDirection};
