#![forbid(unsafe_code)]

//! Script layer behind the `quarry` binary.
//!
//! Scripts describe a pipeline over JSON rows read from JSON or CSV input;
//! results are rendered as JSON.

/// `quarry.toml` loading.
pub mod config;

/// Total ordering and hashing for JSON values.
pub mod json_key;

/// Result rendering.
pub mod output;

/// Step and terminal definitions plus input loading.
pub mod script;

pub use config::{ConfigError, InputFormat, OutputFormat, QuarryConfig};
pub use json_key::JsonKey;
pub use script::{load_rows, Script};
