use std::io;
use std::path::Path;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while declaring or consuming a query.
///
/// Declaration errors (`ContractViolation`, `UnorderedChain`) surface at the
/// operator call that recorded the bad arguments; consumption errors surface
/// from the terminal operation that drove the traversal.
#[derive(Debug, Error)]
pub enum Error {
    /// An operator received an argument it cannot accept.
    #[error("{operator}: invalid argument '{argument}': {reason}")]
    ContractViolation {
        /// Operator that rejected the argument.
        operator: &'static str,
        /// Name of the offending argument.
        argument: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
    /// A strict terminal operation drove a sequence that produced nothing.
    #[error("{operator}: the source sequence is empty")]
    EmptySequence {
        /// Terminal operation that failed.
        operator: &'static str,
    },
    /// No element satisfied the supplied predicate.
    #[error("{operator}: no element satisfies the predicate")]
    NoMatch {
        /// Terminal operation that failed.
        operator: &'static str,
    },
    /// More than one element satisfied a `single` predicate.
    #[error("{operator}: more than one element satisfies the predicate")]
    MultipleMatches {
        /// Terminal operation that failed.
        operator: &'static str,
    },
    /// Index lies outside the sequence (negative indices are always out of range).
    #[error("index {index} is out of range")]
    OutOfRange {
        /// Requested index.
        index: i64,
    },
    /// `then_by` was called on a query whose last operator is not a sort.
    #[error("{operator} requires the preceding operator to be a sort")]
    UnorderedChain {
        /// Operator that was rejected.
        operator: &'static str,
    },
    /// `average` was computed over an empty sequence.
    #[error("average of an empty sequence")]
    DivideByZero,
    /// I/O failure in the script layer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON payload could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// CSV payload could not be parsed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Script file could not be parsed.
    #[error("script error: {0}")]
    Script(String),
}

impl Error {
    /// Builds an [`Error::ContractViolation`].
    pub fn contract(
        operator: &'static str,
        argument: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Error::ContractViolation {
            operator,
            argument,
            reason: reason.into(),
        }
    }

    /// Builds an [`Error::Io`] whose message names the file involved.
    pub fn io_at(path: &Path, err: io::Error) -> Self {
        Error::Io(io::Error::new(err.kind(), format!("{}: {err}", path.display())))
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::ContractViolation { .. } => "ContractViolation",
            Error::EmptySequence { .. } => "EmptySequence",
            Error::NoMatch { .. } => "NoMatch",
            Error::MultipleMatches { .. } => "MultipleMatches",
            Error::OutOfRange { .. } => "RangeError",
            Error::UnorderedChain { .. } => "UnorderedChain",
            Error::DivideByZero => "DivideByZero",
            Error::Io(_) => "Io",
            Error::Json(_) => "Json",
            Error::Csv(_) => "Csv",
            Error::Script(_) => "Script",
        }
    }
}

/// Rejects negative counts for `skip`/`take` style operators.
pub(crate) fn non_negative(
    operator: &'static str,
    argument: &'static str,
    value: i64,
) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::contract(operator, argument, format!("must be >= 0 (got {value})")))
}
