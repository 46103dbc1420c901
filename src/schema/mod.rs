use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};
use crate::types::expr::GenExpr;
use crate::types::{Column, Fields, Value};

/// A secondary index recorded in the schema document so it can be rebuilt
/// on load. Primary-key and unique indexes are implied and not listed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
}

/// Table schema: ordered columns plus declared secondary indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl Table {
    /// Builds a schema, enforcing the structural invariants: unique column
    /// names, at most one primary key, generated columns cannot carry
    /// PRIMARY KEY or UNIQUE, and every generated expression must parse.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> DbResult<Table> {
        let name = name.into();
        if columns.is_empty() {
            return Err(DbError::Validation(format!(
                "table '{name}' must have at least one column"
            )));
        }
        let mut seen: Vec<&str> = Vec::new();
        let mut pk_count = 0;
        for col in &columns {
            if seen.contains(&col.name.as_str()) {
                return Err(DbError::Validation(format!(
                    "duplicate column '{}' in table '{name}'",
                    col.name
                )));
            }
            seen.push(&col.name);
            if col.primary_key {
                pk_count += 1;
            }
            if col.generated.is_some() && (col.primary_key || col.unique) {
                return Err(DbError::Validation(format!(
                    "generated column '{}' cannot be PRIMARY KEY or UNIQUE",
                    col.name
                )));
            }
            if let Some(expr) = &col.generated {
                GenExpr::parse(expr)?;
            }
        }
        if pk_count > 1 {
            return Err(DbError::Validation(format!(
                "table '{name}' declares more than one PRIMARY KEY"
            )));
        }
        let mut columns = columns;
        for col in &mut columns {
            if col.primary_key {
                col.not_null = true;
            }
        }
        Ok(Table {
            name,
            columns,
            indexes: Vec::new(),
        })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Columns whose values must be unique across rows (primary key included).
    pub fn unique_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key || c.unique)
    }

    pub fn generated_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.generated.is_some())
    }

    /// Validates and coerces an input map into a schema-ordered row.
    ///
    /// Pass one converts every stored column; pass two resolves generated
    /// columns to a fixed point so expressions may reference each other in
    /// any declaration order. A cycle or a reference to a value that never
    /// resolves stops with a validation error.
    pub fn validate_row(&self, input: &HashMap<String, Value>) -> DbResult<Fields> {
        for key in input.keys() {
            if self.column(key).is_none() {
                return Err(DbError::ColumnNotFound(key.clone()));
            }
        }
        let mut resolved: HashMap<String, Value> = HashMap::new();
        let mut pending: Vec<(&Column, GenExpr)> = Vec::new();
        for col in &self.columns {
            match &col.generated {
                Some(expr) => pending.push((col, GenExpr::parse(expr)?)),
                None => {
                    let raw = input.get(&col.name).cloned().unwrap_or(Value::Null);
                    resolved.insert(col.name.clone(), col.convert(&raw)?);
                }
            }
        }
        while !pending.is_empty() {
            let mut remaining = Vec::new();
            let mut progressed = false;
            for (col, expr) in pending {
                let mut refs = Vec::new();
                expr.columns(&mut refs);
                if refs.iter().all(|r| resolved.contains_key(r)) {
                    let vars: HashMap<String, Option<f64>> = refs
                        .iter()
                        .map(|r| (r.clone(), resolved.get(r).and_then(Value::as_f64)))
                        .collect();
                    let value = match expr.evaluate(&vars) {
                        Some(result) => col.convert(&Value::Float(result))?,
                        None => {
                            if col.not_null {
                                return Err(DbError::Validation(format!(
                                    "column '{}' cannot be NULL",
                                    col.name
                                )));
                            }
                            Value::Null
                        }
                    };
                    resolved.insert(col.name.clone(), value);
                    progressed = true;
                } else {
                    remaining.push((col, expr));
                }
            }
            if !progressed {
                let names: Vec<&str> = remaining.iter().map(|(c, _)| c.name.as_str()).collect();
                return Err(DbError::Validation(format!(
                    "cannot compute generated column(s): {}",
                    names.join(", ")
                )));
            }
            pending = remaining;
        }
        let mut fields = Fields::new();
        for col in &self.columns {
            let value = resolved.remove(&col.name).unwrap_or(Value::Null);
            fields.push(col.name.clone(), value);
        }
        Ok(fields)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CREATE TABLE {} (", self.name)?;
        for (i, col) in self.columns.iter().enumerate() {
            let sep = if i + 1 == self.columns.len() { "" } else { "," };
            writeln!(f, "  {col}{sep}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn orders_schema() -> Table {
        let mut price = Column::new("price", DataType::Float);
        price.not_null = true;
        let mut quantity = Column::new("quantity", DataType::Integer);
        quantity.not_null = true;
        let mut total = Column::new("total", DataType::Float);
        total.generated = Some("price * quantity".into());
        let mut id = Column::new("id", DataType::Integer);
        id.primary_key = true;
        Table::new("orders", vec![id, price, quantity, total]).unwrap()
    }

    fn input(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn generated_column_computed_in_order() {
        let table = orders_schema();
        let row = table
            .validate_row(&input(&[
                ("id", Value::Int(1)),
                ("price", Value::Float(2.5)),
                ("quantity", Value::Int(4)),
            ]))
            .unwrap();
        assert_eq!(row.get("total"), Some(&Value::Float(10.0)));
        // schema order preserved
        let names: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["id", "price", "quantity", "total"]);
    }

    #[test]
    fn chained_generated_columns_resolve() {
        let mut a = Column::new("a", DataType::Float);
        a.not_null = true;
        let mut b = Column::new("b", DataType::Float);
        b.generated = Some("c + 1".into());
        let mut c = Column::new("c", DataType::Float);
        c.generated = Some("a * 2".into());
        let table = Table::new("t", vec![a, b, c]).unwrap();
        let row = table
            .validate_row(&input(&[("a", Value::Float(3.0))]))
            .unwrap();
        assert_eq!(row.get("c"), Some(&Value::Float(6.0)));
        assert_eq!(row.get("b"), Some(&Value::Float(7.0)));
    }

    #[test]
    fn generated_cycle_is_rejected() {
        let mut a = Column::new("a", DataType::Float);
        a.generated = Some("b + 1".into());
        let mut b = Column::new("b", DataType::Float);
        b.generated = Some("a + 1".into());
        let table = Table::new("t", vec![a, b]).unwrap();
        let err = table.validate_row(&input(&[])).unwrap_err();
        assert!(err.to_string().contains("cannot compute generated column"));
    }

    #[test]
    fn generated_pk_rejected() {
        let mut g = Column::new("g", DataType::Float);
        g.generated = Some("1 + 1".into());
        g.primary_key = true;
        assert!(Table::new("t", vec![g]).is_err());
    }

    #[test]
    fn primary_key_implies_not_null() {
        let table = orders_schema();
        let err = table
            .validate_row(&input(&[
                ("price", Value::Float(1.0)),
                ("quantity", Value::Int(1)),
            ]))
            .unwrap_err();
        assert!(err.to_string().contains("cannot be NULL"));
    }

    #[test]
    fn unknown_input_column_rejected() {
        let table = orders_schema();
        let err = table
            .validate_row(&input(&[("nope", Value::Int(1))]))
            .unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound(_)));
    }
}
