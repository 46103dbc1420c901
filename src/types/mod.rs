pub mod column;
pub mod expr;

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use column::{Column, FkAction, ForeignKey};

/// Date literals are accepted in several layouts; the first format that
/// parses wins.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
];

const TRUTHY: [&str; 6] = ["true", "1", "yes", "t", "y", "on"];
const FALSY: [&str; 6] = ["false", "0", "no", "f", "n", "off"];

/// Column data types supported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    /// Optional maximum length, checked on conversion.
    VarChar(Option<usize>),
    Date,
    Boolean,
}

impl DataType {
    /// Parses a type token such as `INT`, `FLOAT` or `VARCHAR(100)`.
    pub fn parse(token: &str) -> Option<DataType> {
        let upper = token.trim().to_uppercase();
        match upper.as_str() {
            "INT" | "INTEGER" => return Some(DataType::Integer),
            "FLOAT" | "REAL" | "DOUBLE" => return Some(DataType::Float),
            "DATE" => return Some(DataType::Date),
            "BOOLEAN" | "BOOL" => return Some(DataType::Boolean),
            "VARCHAR" | "TEXT" => return Some(DataType::VarChar(None)),
            _ => {}
        }
        if let Some(rest) = upper.strip_prefix("VARCHAR(") {
            let inner = rest.strip_suffix(')')?;
            let len: usize = inner.trim().parse().ok()?;
            return Some(DataType::VarChar(Some(len)));
        }
        None
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::VarChar(None) => write!(f, "VARCHAR"),
            DataType::VarChar(Some(len)) => write!(f, "VARCHAR({len})"),
            DataType::Date => write!(f, "DATE"),
            DataType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// A single typed cell value.
///
/// Serializes untagged so persisted documents read as plain JSON; on reload
/// every field is re-coerced through its column, which restores Date values
/// from their string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by arithmetic and aggregation. Numeric-looking
    /// text participates; anything else does not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Parses a date literal against the accepted format list.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Interprets a boolean literal. Accepts the usual spellings in either case.
pub fn parse_bool(text: &str) -> Option<bool> {
    let lower = text.trim().to_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some(true)
    } else if FALSY.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Ordering between two values for predicates and sorting. Int and Float
/// compare numerically; NULL never compares.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    use Value::*;
    match (a, b) {
        (Null, _) | (_, Null) => None,
        (Int(x), Int(y)) => Some(x.cmp(y)),
        (Int(x), Float(y)) => (*x as f64).partial_cmp(y),
        (Float(x), Int(y)) => x.partial_cmp(&(*y as f64)),
        (Float(x), Float(y)) => x.partial_cmp(y),
        (Text(x), Text(y)) => Some(x.cmp(y)),
        (Bool(x), Bool(y)) => Some(x.cmp(y)),
        (Date(x), Date(y)) => Some(x.cmp(y)),
        (Date(x), Text(y)) => parse_date(y).map(|d| x.cmp(&d)),
        (Text(x), Date(y)) => parse_date(x).map(|d| d.cmp(y)),
        _ => None,
    }
}

/// Case-insensitive LIKE with `%` as the only wildcard.
pub fn like_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let text = text.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !text.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == parts.len() - 1 {
            return text.len() >= pos && text[pos..].ends_with(part);
        } else {
            match text[pos..].find(part) {
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }
    }
    true
}

/// An ordered field map: column order follows the schema, joined rows carry
/// `table.column` keys. Output rows never contain the internal row id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields {
    pairs: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Fields {
        Fields { pairs: Vec::new() }
    }

    pub fn push(&mut self, name: String, value: Value) {
        self.pairs.push((name, value));
    }

    /// Replaces an existing field or appends a new one.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.pairs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Exact lookup first, then a `table.column` suffix match so bare names
    /// resolve against prefixed join rows.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if let Some(v) = self.get(name) {
            return Some(v);
        }
        self.pairs
            .iter()
            .find(|(k, _)| {
                k.len() > name.len()
                    && k.ends_with(name)
                    && k.as_bytes()[k.len() - name.len() - 1] == b'.'
            })
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
