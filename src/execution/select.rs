//! The SELECT pipeline. Stage order is fixed: WHERE on the main table,
//! joins, aggregation, HAVING, ORDER BY, LIMIT, projection last. Because
//! projection runs last, a sort column absent from the projection is
//! naturally carried through the sort and stripped afterwards.

use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;

use crate::error::DbResult;
use crate::execution::aggregate::Accumulator;
use crate::index::IndexKey;
use crate::sql::ast::{
    AggregateExpr, JoinType, LogicOp, OrderBy, Predicate, SelectStatement,
};
use crate::storage::Storage;
use crate::types::{compare_values, Fields, Value};

pub fn execute_select(storage: &Storage, stmt: &SelectStatement) -> DbResult<Vec<Fields>> {
    storage.table(&stmt.table)?;
    let mut rows = if stmt.joins.is_empty() {
        storage.select_rows(&stmt.table, stmt.selection.as_ref())?
    } else {
        execute_joins(storage, stmt)?
    };
    if !stmt.aggregates.is_empty() || !stmt.group_by.is_empty() {
        rows = aggregate_rows(rows, stmt);
        if let Some(having) = &stmt.having {
            rows.retain(|row| eval_having(row, having, &stmt.aggregates));
        }
        if let Some(order) = &stmt.order_by {
            apply_order_by(&mut rows, order);
        }
        if let Some(limit) = stmt.limit {
            rows.truncate(limit);
        }
        // aggregate rows are already shaped as group columns + aliases
        return Ok(rows);
    }
    if let Some(order) = &stmt.order_by {
        apply_order_by(&mut rows, order);
    }
    if let Some(limit) = stmt.limit {
        rows.truncate(limit);
    }
    Ok(project(rows, &stmt.columns))
}

fn prefix_fields(fields: &Fields, table: &str) -> Fields {
    let mut out = Fields::new();
    for (name, value) in fields.iter() {
        if name.contains('.') {
            out.push(name.to_string(), value.clone());
        } else {
            out.push(format!("{table}.{name}"), value.clone());
        }
    }
    out
}

fn merge(left: &Fields, right: &Fields) -> Fields {
    let mut out = left.clone();
    for (name, value) in right.iter() {
        out.set(name, value.clone());
    }
    out
}

/// Left-deep join evaluation. The WHERE clause filters the main table
/// before any join; all field keys are `table.column` qualified. A
/// single-column index on the right join column turns the inner scan into
/// per-left-row index lookups.
fn execute_joins(storage: &Storage, stmt: &SelectStatement) -> DbResult<Vec<Fields>> {
    let mut rows: Vec<Fields> = storage
        .select_rows(&stmt.table, stmt.selection.as_ref())?
        .iter()
        .map(|f| prefix_fields(f, &stmt.table))
        .collect();
    for join in &stmt.joins {
        storage.table(&join.table)?;
        let right_rows = storage.table_rows(&join.table)?;
        let qualified_prefix = format!("{}.", join.table);
        let right_col = join
            .right
            .strip_prefix(&qualified_prefix)
            .unwrap_or(&join.right);
        let right_cols = [right_col.to_string()];
        let index_def = storage.index_manager(&join.table)?.for_columns(&right_cols);
        let mut joined = Vec::new();
        match index_def {
            Some(def) => {
                debug!(
                    "join against '{}' via index on {}",
                    join.table, right_col
                );
                let by_id: HashMap<u64, &crate::storage::Row> =
                    right_rows.iter().map(|r| (r.id, r)).collect();
                for left in &rows {
                    let mut matched = false;
                    if let Some(value) = left.lookup(&join.left) {
                        if let Some(key) = IndexKey::from_values([value]) {
                            for id in def.index.search(&key) {
                                let Some(right) = by_id.get(&id) else { continue };
                                let actual = right.fields.get(right_col);
                                // index keys fold text case; confirm equality
                                if actual.is_some_and(|rv| {
                                    compare_values(value, rv) == Some(Ordering::Equal)
                                }) {
                                    joined.push(merge(
                                        left,
                                        &prefix_fields(&right.fields, &join.table),
                                    ));
                                    matched = true;
                                }
                            }
                        }
                    }
                    if !matched && join.join_type == JoinType::Left {
                        joined.push(left.clone());
                    }
                }
            }
            None => {
                let prefixed: Vec<Fields> = right_rows
                    .iter()
                    .map(|r| prefix_fields(&r.fields, &join.table))
                    .collect();
                for left in &rows {
                    let mut matched = false;
                    let left_value = left.lookup(&join.left).cloned();
                    if let Some(lv) = &left_value {
                        for right in &prefixed {
                            let Some(rv) = right.lookup(&join.right) else {
                                continue;
                            };
                            if compare_values(lv, rv) == Some(Ordering::Equal) {
                                joined.push(merge(left, right));
                                matched = true;
                            }
                        }
                    }
                    if !matched && join.join_type == JoinType::Left {
                        joined.push(left.clone());
                    }
                }
            }
        }
        rows = joined;
    }
    Ok(rows)
}

/// Groups rows and computes every aggregate per group. With no GROUP BY
/// there is exactly one group covering all rows. Group keys use strict
/// value equality, so Int(1) and Float(1.0) land in different groups.
fn aggregate_rows(rows: Vec<Fields>, stmt: &SelectStatement) -> Vec<Fields> {
    if stmt.group_by.is_empty() {
        let mut accs: Vec<Accumulator> =
            stmt.aggregates.iter().map(Accumulator::new).collect();
        for row in &rows {
            for acc in &mut accs {
                acc.consume(row);
            }
        }
        let mut out = Fields::new();
        for (agg, acc) in stmt.aggregates.iter().zip(accs) {
            out.push(agg.alias.clone(), acc.finish());
        }
        return vec![out];
    }
    // first-seen group order is preserved
    let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();
    for row in &rows {
        let key: Vec<Value> = stmt
            .group_by
            .iter()
            .map(|c| row.lookup(c).cloned().unwrap_or(Value::Null))
            .collect();
        let accs = match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, accs)) => accs,
            None => {
                groups.push((
                    key,
                    stmt.aggregates.iter().map(Accumulator::new).collect(),
                ));
                let last = groups.len() - 1;
                &mut groups[last].1
            }
        };
        for acc in accs.iter_mut() {
            acc.consume(row);
        }
    }
    groups
        .into_iter()
        .map(|(key, accs)| {
            let mut out = Fields::new();
            for (col, value) in stmt.group_by.iter().zip(key) {
                out.push(col.clone(), value);
            }
            for (agg, acc) in stmt.aggregates.iter().zip(accs) {
                out.push(agg.alias.clone(), acc.finish());
            }
            out
        })
        .collect()
}

fn strip_spaces(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Resolves a HAVING column reference: `FUNC(col)` forms map back to the
/// alias the aggregate was computed under, plain names resolve directly.
fn resolve_having_column<'a>(column: &'a str, aggregates: &'a [AggregateExpr]) -> &'a str {
    if !column.contains('(') {
        return column;
    }
    let wanted = strip_spaces(&column.to_uppercase());
    aggregates
        .iter()
        .find(|agg| strip_spaces(&agg.canonical().to_uppercase()) == wanted)
        .map(|agg| agg.alias.as_str())
        .unwrap_or(column)
}

fn eval_having(row: &Fields, pred: &Predicate, aggregates: &[AggregateExpr]) -> bool {
    match pred {
        Predicate::Compare { column, op, value } => {
            let resolved = resolve_having_column(column, aggregates);
            match row.lookup(resolved) {
                Some(actual) => op.evaluate(actual, value),
                None => false,
            }
        }
        Predicate::Chain {
            conditions,
            operators,
        } => {
            let mut iter = conditions.iter();
            let mut result = iter
                .next()
                .map(|c| eval_having(row, c, aggregates))
                .unwrap_or(true);
            for (cond, op) in iter.zip(operators) {
                let next = eval_having(row, cond, aggregates);
                result = match op {
                    LogicOp::And => result && next,
                    LogicOp::Or => result || next,
                };
            }
            result
        }
    }
}

/// Stable sort on one column; rows missing the column keep their relative
/// position.
fn apply_order_by(rows: &mut [Fields], order: &OrderBy) {
    rows.sort_by(|a, b| {
        let ord = match (a.lookup(&order.column), b.lookup(&order.column)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        if order.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Final projection. `*` passes rows through; requested columns resolve
/// with the qualified-name fallback and silently drop when absent.
fn project(rows: Vec<Fields>, columns: &[String]) -> Vec<Fields> {
    if columns.is_empty() || (columns.len() == 1 && columns[0] == "*") {
        return rows;
    }
    rows.into_iter()
        .map(|row| {
            let mut out = Fields::new();
            for col in columns {
                if let Some(value) = row.lookup(col) {
                    out.push(col.clone(), value.clone());
                }
            }
            out
        })
        .collect()
}
