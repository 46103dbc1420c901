use std::fmt;

use crate::types::{compare_values, like_match, Column, Value};

/// Comparison operators, listed here in the scan order the parser uses so
/// multi-character operators are never shadowed by their prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    LessOrEquals,
    GreaterOrEquals,
    NotEquals,
    Equals,
    LessThan,
    GreaterThan,
    Like,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::LessOrEquals => "<=",
            CompareOp::GreaterOrEquals => ">=",
            CompareOp::NotEquals => "!=",
            CompareOp::Equals => "=",
            CompareOp::LessThan => "<",
            CompareOp::GreaterThan => ">",
            CompareOp::Like => "LIKE",
        }
    }

    /// Applies the comparison. NULL on either side makes ordered
    /// comparisons false; equality treats NULL = NULL as true.
    pub fn evaluate(&self, actual: &Value, expected: &Value) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Equals => {
                if actual.is_null() && expected.is_null() {
                    return true;
                }
                compare_values(actual, expected) == Some(Equal)
            }
            CompareOp::NotEquals => {
                if actual.is_null() && expected.is_null() {
                    return false;
                }
                if actual.is_null() || expected.is_null() {
                    return true;
                }
                compare_values(actual, expected) != Some(Equal)
            }
            CompareOp::LessThan => compare_values(actual, expected) == Some(Less),
            CompareOp::GreaterThan => compare_values(actual, expected) == Some(Greater),
            CompareOp::LessOrEquals => {
                matches!(compare_values(actual, expected), Some(Less | Equal))
            }
            CompareOp::GreaterOrEquals => {
                matches!(compare_values(actual, expected), Some(Greater | Equal))
            }
            CompareOp::Like => {
                !actual.is_null()
                    && !expected.is_null()
                    && like_match(&expected.to_string(), &actual.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// WHERE/HAVING predicate. Chains are flat and evaluated strictly left to
/// right; there is no AND-over-OR precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Chain {
        conditions: Vec<Predicate>,
        operators: Vec<LogicOp>,
    },
}

impl Predicate {
    /// Flattens the predicate into `(column, value)` pairs when it is a
    /// pure all-AND equality chain; `None` disqualifies index lookup.
    pub fn equality_bindings(&self) -> Option<Vec<(&str, &Value)>> {
        match self {
            Predicate::Compare {
                column,
                op: CompareOp::Equals,
                value,
            } => Some(vec![(column.as_str(), value)]),
            Predicate::Compare { .. } => None,
            Predicate::Chain {
                conditions,
                operators,
            } => {
                if operators.iter().any(|op| *op == LogicOp::Or) {
                    return None;
                }
                let mut out = Vec::new();
                for cond in conditions {
                    match cond {
                        Predicate::Compare {
                            column,
                            op: CompareOp::Equals,
                            value,
                        } => out.push((column.as_str(), value)),
                        _ => return None,
                    }
                }
                Some(out)
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, value } => {
                let rendered = match value {
                    Value::Text(s) => format!("'{s}'"),
                    other => other.to_string(),
                };
                write!(f, "{column} {} {rendered}", op.symbol())
            }
            Predicate::Chain {
                conditions,
                operators,
            } => {
                for (i, cond) in conditions.iter().enumerate() {
                    if i > 0 {
                        let op = match operators.get(i - 1) {
                            Some(LogicOp::Or) => "OR",
                            _ => "AND",
                        };
                        write!(f, " {op} ")?;
                    }
                    write!(f, "{cond}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    /// Left side of the ON equality, possibly table-qualified.
    pub left: String,
    /// Right side of the ON equality, possibly table-qualified.
    pub right: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Max => "MAX",
            AggFunc::Min => "MIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub func: AggFunc,
    /// `None` means `COUNT(*)`.
    pub column: Option<String>,
    pub distinct: bool,
    /// Output column name; defaults to the expression text.
    pub alias: String,
}

impl AggregateExpr {
    /// Canonical `FUNC(arg)` form, used to resolve HAVING references back
    /// to the alias the aggregate was computed under.
    pub fn canonical(&self) -> String {
        let arg = self.column.as_deref().unwrap_or("*");
        if self.distinct {
            format!("{}(DISTINCT {})", self.func.as_str(), arg)
        } else {
            format!("{}({})", self.func.as_str(), arg)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    /// Projection list; `["*"]` selects everything. Aggregate expressions
    /// live in `aggregates`, not here.
    pub columns: Vec<String>,
    pub aggregates: Vec<AggregateExpr>,
    pub joins: Vec<JoinClause>,
    pub selection: Option<Predicate>,
    pub group_by: Vec<String>,
    pub having: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    UseDatabase {
        name: String,
    },
    ShowDatabases,
    ShowTables,
    CreateTable {
        table: String,
        columns: Vec<Column>,
    },
    CreateIndex {
        name: Option<String>,
        table: String,
        columns: Vec<String>,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    Select(SelectStatement),
    Update {
        table: String,
        assignments: Vec<(String, Value)>,
        selection: Option<Predicate>,
    },
    Delete {
        table: String,
        selection: Option<Predicate>,
    },
}
