//! Declarative pipelines over JSON rows.
//!
//! A script is a list of `steps` (each tagged by `op`) followed by an optional
//! `terminal`. Steps are applied to a [`Queryable`] of [`serde_json::Value`]
//! rows; applying a step validates it immediately, so a bad script fails
//! before any row is read.
//!
//! ```toml
//! [[steps]]
//! op = "where"
//! field = "age"
//! cmp = "ge"
//! value = 30
//!
//! [[steps]]
//! op = "order_by"
//! field = "name"
//!
//! [terminal]
//! op = "count"
//! ```

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::cli::config::InputFormat;
use crate::cli::json_key::JsonKey;
use crate::error::{Error, Result};
use crate::query::{OperatorKind, Queryable};

/// A parsed pipeline description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Intermediate operators, in application order.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// How the result is materialised.
    #[serde(default)]
    pub terminal: Terminal,
}

/// Field test shared by `where`, `skip_while` and `take_while`.
#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    /// Dotted path into the row (`address.city`).
    pub field: String,
    /// Comparison applied to the field value.
    #[serde(default)]
    pub cmp: Comparison,
    /// Right-hand operand.
    pub value: Value,
}

/// Comparison operators available to conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// Equal under [`JsonKey`] ordering.
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Strictly less.
    Lt,
    /// Less or equal.
    Le,
    /// Strictly greater.
    Gt,
    /// Greater or equal.
    Ge,
    /// Substring for strings, membership for arrays.
    Contains,
}

/// One intermediate operator of a script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Keeps rows satisfying the condition.
    Where(Condition),
    /// Keeps only the listed fields of each row.
    Select {
        /// Fields to keep, in output order.
        fields: Vec<String>,
    },
    /// Sorts ascending by a field.
    OrderBy {
        /// Sort field.
        field: String,
    },
    /// Sorts descending by a field.
    OrderByDescending {
        /// Sort field.
        field: String,
    },
    /// Ascending tie-breaker for the preceding sort.
    ThenBy {
        /// Sort field.
        field: String,
    },
    /// Descending tie-breaker for the preceding sort.
    ThenByDescending {
        /// Sort field.
        field: String,
    },
    /// Drops the first `count` rows.
    Skip {
        /// Number of rows to drop.
        count: i64,
    },
    /// Keeps the first `count` rows.
    Take {
        /// Number of rows to keep.
        count: i64,
    },
    /// Removes duplicate rows, or rows repeating `field`.
    Distinct {
        /// Optional dedup field; whole rows compare when absent.
        #[serde(default)]
        field: Option<String>,
    },
    /// Reverses the rows.
    Reverse,
    /// Groups rows into `{"key", "items"}` objects in ascending key order.
    GroupBy {
        /// Grouping field.
        field: String,
    },
    /// Drops rows while the condition holds.
    SkipWhile(Condition),
    /// Keeps rows until the condition first fails.
    TakeWhile(Condition),
}

/// How a script's rows are turned into a result value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Terminal {
    /// Every row, as an array.
    #[default]
    List,
    /// Number of rows.
    Count,
    /// The first row.
    First,
    /// The last row.
    Last,
    /// Sum of a numeric field.
    Sum {
        /// Numeric field.
        field: String,
    },
    /// Mean of a numeric field.
    Average {
        /// Numeric field.
        field: String,
    },
    /// Smallest field value under [`JsonKey`] ordering.
    Min {
        /// Compared field.
        field: String,
    },
    /// Largest field value under [`JsonKey`] ordering.
    Max {
        /// Compared field.
        field: String,
    },
}

impl Script {
    /// Parses a TOML script.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| Error::Script(err.to_string()))
    }

    /// Parses a JSON script.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Reads a script, choosing JSON for `.json` files and TOML otherwise.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| Error::io_at(path, err))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    /// Records every step on top of `rows`.
    pub fn apply(&self, rows: Queryable<Value>) -> Result<Queryable<Value>> {
        let mut query = rows;
        for step in &self.steps {
            query = apply_step(&query, step)?;
        }
        debug!(steps = self.steps.len(), "script compiled");
        Ok(query)
    }

    /// Operator kinds the script records, without reading any input.
    pub fn explain(&self) -> Result<Vec<OperatorKind>> {
        Ok(self.apply(Queryable::from(Vec::new()))?.explain())
    }

    /// Applies the steps to `rows` and evaluates the terminal.
    pub fn evaluate(&self, rows: Vec<Value>) -> Result<Value> {
        let query = self.apply(Queryable::from(rows))?;
        finish(&query, &self.terminal)
    }
}

fn apply_step(query: &Queryable<Value>, step: &Step) -> Result<Queryable<Value>> {
    let next = match step {
        Step::Where(condition) => {
            let condition = condition.clone();
            query.r#where(move |row| condition.test(row))
        }
        Step::Select { fields } => {
            let fields = fields.clone();
            query.select(move |row| {
                let picked: Map<String, Value> = fields
                    .iter()
                    .map(|field| (field.clone(), lookup(&row, field).clone()))
                    .collect();
                Value::Object(picked)
            })
        }
        Step::OrderBy { field } => query.order_by(field_key(field)),
        Step::OrderByDescending { field } => query.order_by_descending(field_key(field)),
        Step::ThenBy { field } => query.then_by(field_key(field))?,
        Step::ThenByDescending { field } => query.then_by_descending(field_key(field))?,
        Step::Skip { count } => query.skip(*count)?,
        Step::Take { count } => query.take(*count)?,
        Step::Distinct { field: Some(field) } => query.distinct_by(field_key(field)),
        Step::Distinct { field: None } => query.distinct_by(|row| JsonKey(row.clone())),
        Step::Reverse => query.reverse(),
        Step::GroupBy { field } => query.group_by(field_key(field)).select(|group| {
            let (key, items) = group.into_parts();
            json!({ "key": key.into_inner(), "items": items })
        }),
        Step::SkipWhile(condition) => {
            let condition = condition.clone();
            query.skip_while(move |row| condition.test(row))
        }
        Step::TakeWhile(condition) => {
            let condition = condition.clone();
            query.take_while(move |row| condition.test(row))
        }
    };
    Ok(next)
}

fn finish(query: &Queryable<Value>, terminal: &Terminal) -> Result<Value> {
    let value = match terminal {
        Terminal::List => Value::Array(query.to_list()),
        Terminal::Count => json!(query.long_count()),
        Terminal::First => query.first()?,
        Terminal::Last => query.last()?,
        Terminal::Sum { field } => json!(numbers(query, "sum", field)?.sum()),
        Terminal::Average { field } => json!(numbers(query, "average", field)?.average()?),
        Terminal::Min { field } => field_values(query, field).min()?.into_inner(),
        Terminal::Max { field } => field_values(query, field).max()?.into_inner(),
    };
    Ok(value)
}

fn field_values(query: &Queryable<Value>, field: &str) -> Queryable<JsonKey> {
    let key = field_key(field);
    query.select(move |row: Value| key(&row))
}

/// Extracts a numeric field from every row; a non-numeric value fails the terminal.
fn numbers(query: &Queryable<Value>, operator: &'static str, field: &str) -> Result<Queryable<f64>> {
    let values = query
        .iter()
        .map(|row| {
            let value = lookup(&row, field);
            value.as_f64().ok_or_else(|| {
                Error::contract(operator, "field", format!("{field} = {value} is not a number"))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(Queryable::from(values))
}

impl Condition {
    fn test(&self, row: &Value) -> bool {
        let actual = lookup(row, &self.field);
        let ordering = || JsonKey(actual.clone()).cmp(&JsonKey(self.value.clone()));
        match self.cmp {
            Comparison::Eq => ordering().is_eq(),
            Comparison::Ne => ordering().is_ne(),
            Comparison::Lt => ordering().is_lt(),
            Comparison::Le => ordering().is_le(),
            Comparison::Gt => ordering().is_gt(),
            Comparison::Ge => ordering().is_ge(),
            Comparison::Contains => match (actual, &self.value) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), needle) => {
                    let needle = JsonKey(needle.clone());
                    items.iter().any(|item| JsonKey(item.clone()) == needle)
                }
                _ => false,
            },
        }
    }
}

static NULL: Value = Value::Null;

/// Follows a dotted path; missing segments resolve to `null`.
fn lookup<'a>(row: &'a Value, field: &str) -> &'a Value {
    field
        .split('.')
        .try_fold(row, |value, segment| value.get(segment))
        .unwrap_or(&NULL)
}

fn field_key(field: &str) -> impl Fn(&Value) -> JsonKey + 'static {
    let field = field.to_owned();
    move |row: &Value| JsonKey(lookup(row, &field).clone())
}

/// Reads rows in `format`; a JSON document that is not an array is rejected.
pub fn load_rows(mut reader: impl Read, format: InputFormat) -> Result<Vec<Value>> {
    let rows = match format {
        InputFormat::Json => {
            let mut contents = String::new();
            reader.read_to_string(&mut contents)?;
            match serde_json::from_str::<Value>(&contents)? {
                Value::Array(rows) => rows,
                other => {
                    return Err(Error::contract(
                        "from",
                        "source",
                        format!("expected a JSON array, found {}", kind(&other)),
                    ))
                }
            }
        }
        InputFormat::Csv => {
            let mut csv = csv::Reader::from_reader(reader);
            let headers = csv.headers()?.clone();
            let mut rows = Vec::new();
            for record in csv.records() {
                let record = record?;
                let row: Map<String, Value> = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(name, cell)| (name.to_owned(), infer_cell(cell)))
                    .collect();
                rows.push(Value::Object(row));
            }
            rows
        }
    };
    debug!(rows = rows.len(), ?format, "input rows loaded");
    Ok(rows)
}

/// CSV cells become integers, floats or booleans when they parse as one.
fn infer_cell(cell: &str) -> Value {
    if let Ok(int) = cell.parse::<i64>() {
        return json!(int);
    }
    if let Ok(float) = cell.parse::<f64>() {
        if float.is_finite() {
            return json!(float);
        }
    }
    match cell {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "" => Value::Null,
        _ => Value::String(cell.to_owned()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
