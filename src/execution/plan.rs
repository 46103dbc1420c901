//! Read-only explain plans. Building a plan never touches rows or
//! indexes' contents; it only inspects schemas and index definitions.

use std::fmt;

use crate::error::DbResult;
use crate::sql::ast::{JoinType, SelectStatement};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    IndexLookup,
    NestedLoop,
}

impl JoinStrategy {
    fn as_str(&self) -> &'static str {
        match self {
            JoinStrategy::IndexLookup => "INDEX_LOOKUP",
            JoinStrategy::NestedLoop => "NESTED_LOOP",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Select {
        steps: Vec<PlanNode>,
    },
    Scan {
        table: String,
    },
    IndexLookup {
        table: String,
        index: String,
        columns: Vec<String>,
    },
    Filter {
        predicate: String,
        input: Box<PlanNode>,
    },
    Join {
        join_type: JoinType,
        strategy: JoinStrategy,
        table: String,
        on: String,
    },
    Aggregate {
        functions: Vec<String>,
        group_by: Vec<String>,
    },
    Having {
        predicate: String,
    },
    Sort {
        column: String,
        descending: bool,
    },
    Limit {
        count: usize,
    },
    Projection {
        columns: Vec<String>,
    },
}

/// Builds the plan for a SELECT: access path first (index lookup when the
/// WHERE clause is an all-AND equality chain covered by an index, wrapped
/// in FILTER when a residual predicate remains), then joins and the
/// remaining pipeline stages in execution order.
pub fn build_plan(storage: &Storage, stmt: &SelectStatement) -> DbResult<PlanNode> {
    storage.table(&stmt.table)?;
    let manager = storage.index_manager(&stmt.table)?;
    let access = match &stmt.selection {
        None => PlanNode::Scan {
            table: stmt.table.clone(),
        },
        Some(pred) => {
            let indexed = pred.equality_bindings().and_then(|bindings| {
                let bound: Vec<String> =
                    bindings.iter().map(|(c, _)| c.to_string()).collect();
                manager.best_for(&bound).map(|def| (def, bound))
            });
            match indexed {
                Some((def, bound)) => {
                    let lookup = PlanNode::IndexLookup {
                        table: stmt.table.clone(),
                        index: def.name.clone(),
                        columns: def.columns.clone(),
                    };
                    if def.columns.len() == bound.len() {
                        lookup
                    } else {
                        PlanNode::Filter {
                            predicate: pred.to_string(),
                            input: Box::new(lookup),
                        }
                    }
                }
                None => PlanNode::Filter {
                    predicate: pred.to_string(),
                    input: Box::new(PlanNode::Scan {
                        table: stmt.table.clone(),
                    }),
                },
            }
        }
    };
    let mut steps = vec![access];
    for join in &stmt.joins {
        storage.table(&join.table)?;
        let prefix = format!("{}.", join.table);
        let right_col = join.right.strip_prefix(&prefix).unwrap_or(&join.right);
        let right_cols = [right_col.to_string()];
        let strategy = if storage
            .index_manager(&join.table)?
            .for_columns(&right_cols)
            .is_some()
        {
            JoinStrategy::IndexLookup
        } else {
            JoinStrategy::NestedLoop
        };
        steps.push(PlanNode::Join {
            join_type: join.join_type,
            strategy,
            table: join.table.clone(),
            on: format!("{} = {}", join.left, join.right),
        });
    }
    if !stmt.aggregates.is_empty() || !stmt.group_by.is_empty() {
        steps.push(PlanNode::Aggregate {
            functions: stmt.aggregates.iter().map(|a| a.canonical()).collect(),
            group_by: stmt.group_by.clone(),
        });
    }
    if let Some(having) = &stmt.having {
        steps.push(PlanNode::Having {
            predicate: having.to_string(),
        });
    }
    if let Some(order) = &stmt.order_by {
        steps.push(PlanNode::Sort {
            column: order.column.clone(),
            descending: order.descending,
        });
    }
    if let Some(limit) = stmt.limit {
        steps.push(PlanNode::Limit { count: limit });
    }
    if !(stmt.columns.len() == 1 && stmt.columns[0] == "*") && !stmt.columns.is_empty() {
        steps.push(PlanNode::Projection {
            columns: stmt.columns.clone(),
        });
    }
    Ok(PlanNode::Select { steps })
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &PlanNode, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match node {
        PlanNode::Select { steps } => {
            writeln!(f, "{indent}SELECT")?;
            for step in steps {
                write_node(f, step, depth + 1)?;
            }
            Ok(())
        }
        PlanNode::Scan { table } => writeln!(f, "{indent}SCAN {table}"),
        PlanNode::IndexLookup {
            table,
            index,
            columns,
        } => writeln!(
            f,
            "{indent}INDEX_LOOKUP {table} USING {index} ({})",
            columns.join(", ")
        ),
        PlanNode::Filter { predicate, input } => {
            writeln!(f, "{indent}FILTER {predicate}")?;
            write_node(f, input, depth + 1)
        }
        PlanNode::Join {
            join_type,
            strategy,
            table,
            on,
        } => writeln!(
            f,
            "{indent}{}_JOIN {table} ON {on} [{}]",
            join_type.as_str(),
            strategy.as_str()
        ),
        PlanNode::Aggregate {
            functions,
            group_by,
        } => {
            write!(f, "{indent}AGGREGATE {}", functions.join(", "))?;
            if !group_by.is_empty() {
                write!(f, " GROUP BY {}", group_by.join(", "))?;
            }
            writeln!(f)
        }
        PlanNode::Having { predicate } => writeln!(f, "{indent}HAVING {predicate}"),
        PlanNode::Sort { column, descending } => writeln!(
            f,
            "{indent}SORT {column} {}",
            if *descending { "DESC" } else { "ASC" }
        ),
        PlanNode::Limit { count } => writeln!(f, "{indent}LIMIT {count}"),
        PlanNode::Projection { columns } => {
            writeln!(f, "{indent}PROJECTION {}", columns.join(", "))
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self, 0)
    }
}
