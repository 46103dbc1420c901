//! Aggregate accumulators. NULLs are ignored by every function; COUNT(*)
//! counts rows, COUNT(col) counts non-NULL values, COUNT(DISTINCT col)
//! counts distinct non-NULL values.

use crate::sql::ast::{AggFunc, AggregateExpr};
use crate::types::{compare_values, Fields, Value};

#[derive(Debug)]
pub struct Accumulator {
    func: AggFunc,
    column: Option<String>,
    distinct: bool,
    count: u64,
    sum: f64,
    has_numeric: bool,
    extreme: Option<Value>,
    seen: Vec<Value>,
}

impl Accumulator {
    pub fn new(expr: &AggregateExpr) -> Accumulator {
        Accumulator {
            func: expr.func,
            column: expr.column.clone(),
            distinct: expr.distinct,
            count: 0,
            sum: 0.0,
            has_numeric: false,
            extreme: None,
            seen: Vec::new(),
        }
    }

    pub fn consume(&mut self, row: &Fields) {
        let value = match &self.column {
            None => {
                // COUNT(*)
                self.count += 1;
                return;
            }
            Some(col) => match row.lookup(col) {
                Some(v) if !v.is_null() => v,
                _ => return,
            },
        };
        if self.distinct {
            if self.seen.contains(value) {
                return;
            }
            self.seen.push(value.clone());
        }
        self.count += 1;
        match self.func {
            AggFunc::Count => {}
            AggFunc::Sum | AggFunc::Avg => {
                if let Some(n) = value.as_f64() {
                    self.sum += n;
                    self.has_numeric = true;
                }
            }
            AggFunc::Max => {
                let replace = match &self.extreme {
                    None => true,
                    Some(cur) => {
                        compare_values(value, cur) == Some(std::cmp::Ordering::Greater)
                    }
                };
                if replace {
                    self.extreme = Some(value.clone());
                }
            }
            AggFunc::Min => {
                let replace = match &self.extreme {
                    None => true,
                    Some(cur) => {
                        compare_values(value, cur) == Some(std::cmp::Ordering::Less)
                    }
                };
                if replace {
                    self.extreme = Some(value.clone());
                }
            }
        }
    }

    /// The aggregate result; an empty input yields NULL for everything but
    /// COUNT, which yields 0.
    pub fn finish(self) -> Value {
        match self.func {
            AggFunc::Count => Value::Int(self.count as i64),
            AggFunc::Sum => {
                if self.has_numeric {
                    Value::Float(self.sum)
                } else {
                    Value::Null
                }
            }
            AggFunc::Avg => {
                if self.has_numeric && self.count > 0 {
                    Value::Float(self.sum / self.count as f64)
                } else {
                    Value::Null
                }
            }
            AggFunc::Max | AggFunc::Min => self.extreme.unwrap_or(Value::Null),
        }
    }
}
