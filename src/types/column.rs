use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};
use crate::types::{parse_bool, parse_date, DataType, Value};
use std::fmt;

/// Referential action taken when a referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FkAction {
    Restrict,
    Cascade,
    SetNull,
}

impl fmt::Display for FkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FkAction::Restrict => write!(f, "RESTRICT"),
            FkAction::Cascade => write!(f, "CASCADE"),
            FkAction::SetNull => write!(f, "SET NULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub on_delete: FkAction,
}

/// A column definition: type, constraint flags, optional foreign key and
/// optional generated-column expression (virtual, recomputed on write).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub foreign_key: Option<ForeignKey>,
    #[serde(default)]
    pub generated: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Column {
        Column {
            name: name.into(),
            data_type,
            primary_key: false,
            unique: false,
            not_null: false,
            foreign_key: None,
            generated: None,
        }
    }

    /// Coerces a raw value into this column's type. NULL passes through
    /// unless the column is NOT NULL.
    pub fn convert(&self, value: &Value) -> DbResult<Value> {
        if value.is_null() {
            if self.not_null {
                return Err(DbError::Validation(format!(
                    "column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(Value::Null);
        }
        match &self.data_type {
            DataType::Integer => self.to_int(value),
            DataType::Float => self.to_float(value),
            DataType::VarChar(limit) => self.to_text(value, *limit),
            DataType::Date => self.to_date(value),
            DataType::Boolean => self.to_bool(value),
        }
    }

    fn to_int(&self, value: &Value) -> DbResult<Value> {
        match value {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Text(s) => {
                let trimmed = s.trim();
                let parsed = if trimmed.contains('.') {
                    trimmed.parse::<f64>().ok().map(|f| f.trunc() as i64)
                } else {
                    trimmed.parse::<i64>().ok()
                };
                parsed.map(Value::Int).ok_or_else(|| {
                    DbError::Validation(format!(
                        "cannot convert '{s}' to INT for column '{}'",
                        self.name
                    ))
                })
            }
            other => Err(DbError::Validation(format!(
                "cannot convert '{other}' to INT for column '{}'",
                self.name
            ))),
        }
    }

    fn to_float(&self, value: &Value) -> DbResult<Value> {
        match value {
            Value::Float(f) => Ok(Value::Float(*f)),
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                DbError::Validation(format!(
                    "cannot convert '{s}' to FLOAT for column '{}'",
                    self.name
                ))
            }),
            other => Err(DbError::Validation(format!(
                "cannot convert '{other}' to FLOAT for column '{}'",
                self.name
            ))),
        }
    }

    fn to_text(&self, value: &Value, limit: Option<usize>) -> DbResult<Value> {
        let text = match value {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        };
        if let Some(max) = limit {
            if text.chars().count() > max {
                return Err(DbError::Validation(format!(
                    "value length {} exceeds VARCHAR({max}) for column '{}'",
                    text.chars().count(),
                    self.name
                )));
            }
        }
        Ok(Value::Text(text))
    }

    fn to_date(&self, value: &Value) -> DbResult<Value> {
        match value {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::Text(s) => parse_date(s).map(Value::Date).ok_or_else(|| {
                DbError::Validation(format!(
                    "invalid date '{s}' for column '{}': expected YYYY-MM-DD or a similar format",
                    self.name
                ))
            }),
            other => Err(DbError::Validation(format!(
                "cannot convert '{other}' to DATE for column '{}'",
                self.name
            ))),
        }
    }

    fn to_bool(&self, value: &Value) -> DbResult<Value> {
        match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            other => parse_bool(&other.to_string())
                .map(Value::Bool)
                .ok_or_else(|| {
                    DbError::Validation(format!(
                        "cannot convert '{other}' to BOOLEAN for column '{}'",
                        self.name
                    ))
                }),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        if self.primary_key {
            write!(f, " PRIMARY KEY")?;
        }
        if self.unique && !self.primary_key {
            write!(f, " UNIQUE")?;
        }
        if self.not_null && !self.primary_key {
            write!(f, " NOT NULL")?;
        }
        if let Some(fk) = &self.foreign_key {
            write!(f, " REFERENCES {}({})", fk.table, fk.column)?;
            if fk.on_delete != FkAction::Restrict {
                write!(f, " ON DELETE {}", fk.on_delete)?;
            }
        }
        if let Some(expr) = &self.generated {
            write!(f, " GENERATED ALWAYS AS ({expr}) VIRTUAL")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_conversion_truncates() {
        let col = Column::new("n", DataType::Integer);
        assert_eq!(col.convert(&Value::Float(3.9)).unwrap(), Value::Int(3));
        assert_eq!(
            col.convert(&Value::Text("7.5".into())).unwrap(),
            Value::Int(7)
        );
        assert!(col.convert(&Value::Text("abc".into())).is_err());
    }

    #[test]
    fn not_null_rejects_null() {
        let mut col = Column::new("n", DataType::Integer);
        col.not_null = true;
        assert!(col.convert(&Value::Null).is_err());
    }

    #[test]
    fn varchar_length_enforced() {
        let col = Column::new("s", DataType::VarChar(Some(3)));
        assert!(col.convert(&Value::Text("abcd".into())).is_err());
        assert_eq!(
            col.convert(&Value::Int(42)).unwrap(),
            Value::Text("42".into())
        );
    }

    #[test]
    fn boolean_accepts_common_spellings() {
        let col = Column::new("b", DataType::Boolean);
        assert_eq!(
            col.convert(&Value::Text("yes".into())).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(col.convert(&Value::Int(0)).unwrap(), Value::Bool(false));
        assert!(col.convert(&Value::Text("maybe".into())).is_err());
    }
}
