use std::io::{self, Write};

use serde_json::Value;

use crate::cli::config::OutputFormat;
use crate::error::Result;

/// Writes `value` in `format`, followed by a newline.
///
/// `Lines` prints each element of an array result on its own line and falls
/// back to compact JSON for scalar results.
pub fn render(out: &mut impl Write, value: &Value, format: OutputFormat) -> Result<()> {
    match (format, value) {
        (OutputFormat::Json, _) => serde_json::to_writer(&mut *out, value)?,
        (OutputFormat::Pretty, _) => serde_json::to_writer_pretty(&mut *out, value)?,
        (OutputFormat::Lines, Value::Array(items)) => {
            for item in items {
                serde_json::to_writer(&mut *out, item)?;
                writeln!(out)?;
            }
            return Ok(());
        }
        (OutputFormat::Lines, _) => serde_json::to_writer(&mut *out, value)?,
    }
    writeln!(out)?;
    Ok(())
}

/// Renders to stdout.
pub fn print(value: &Value, format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    render(&mut lock, value, format)?;
    lock.flush()?;
    Ok(())
}
