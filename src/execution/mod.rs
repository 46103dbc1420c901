//! Statement execution: one executor arm per statement kind, all routed
//! through `handle_statement`. Database-level statements are intercepted
//! by the engine before reaching this layer; when one arrives here the
//! engine had no manager, which is the error reported.

pub mod aggregate;
pub mod plan;
pub mod select;

use std::collections::HashMap;

use crate::engine::ExecResult;
use crate::error::{DbError, DbResult};
use crate::schema::Table;
use crate::sql::ast::Statement;
use crate::storage::Storage;
use crate::types::{Fields, Value};

pub use plan::{build_plan, PlanNode};
pub use select::execute_select;

pub fn handle_statement(storage: &mut Storage, stmt: Statement) -> DbResult<ExecResult> {
    match stmt {
        Statement::CreateTable { table, columns } => {
            let schema = Table::new(table.clone(), columns)?;
            storage.create_table(schema)?;
            Ok(ExecResult::Ok {
                message: format!("table '{table}' created"),
                rows_affected: 0,
            })
        }
        Statement::CreateIndex {
            name,
            table,
            columns,
        } => {
            let index_name = storage.create_index(&table, &columns, name.as_deref())?;
            Ok(ExecResult::Ok {
                message: format!(
                    "index '{index_name}' created on {table}({})",
                    columns.join(", ")
                ),
                rows_affected: 0,
            })
        }
        Statement::Insert {
            table,
            columns,
            values,
        } => {
            let input = build_insert_input(storage, &table, columns, values)?;
            let row_id = storage.insert_row(&table, input)?;
            Ok(ExecResult::Ok {
                message: format!("row inserted with id {row_id}"),
                rows_affected: 1,
            })
        }
        Statement::Select(select) => {
            let rows = execute_select(storage, &select)?;
            Ok(ExecResult::Rows {
                count: rows.len(),
                rows,
            })
        }
        Statement::Update {
            table,
            assignments,
            selection,
        } => {
            let count = storage.update_rows(&table, &assignments, selection.as_ref())?;
            Ok(ExecResult::Ok {
                message: format!("{count} row(s) updated"),
                rows_affected: count,
            })
        }
        Statement::Delete { table, selection } => {
            let count = storage.delete_rows(&table, selection.as_ref())?;
            Ok(ExecResult::Ok {
                message: format!("{count} row(s) deleted"),
                rows_affected: count,
            })
        }
        Statement::ShowTables => {
            let rows: Vec<Fields> = storage
                .list_tables()
                .into_iter()
                .map(|name| {
                    let mut f = Fields::new();
                    f.push("table".into(), Value::Text(name));
                    f
                })
                .collect();
            Ok(ExecResult::Rows {
                count: rows.len(),
                rows,
            })
        }
        Statement::CreateDatabase { .. }
        | Statement::DropDatabase { .. }
        | Statement::UseDatabase { .. }
        | Statement::ShowDatabases => Err(DbError::Validation(
            "multi-database mode is not enabled".into(),
        )),
    }
}

/// Zips VALUES against the column list, or against the table's stored
/// (non-generated) columns when no list was given.
fn build_insert_input(
    storage: &Storage,
    table: &str,
    columns: Option<Vec<String>>,
    values: Vec<Value>,
) -> DbResult<HashMap<String, Value>> {
    let schema = storage.table(table)?;
    let targets: Vec<String> = match columns {
        Some(cols) => cols,
        None => schema
            .columns
            .iter()
            .filter(|c| c.generated.is_none())
            .map(|c| c.name.clone())
            .collect(),
    };
    if targets.len() != values.len() {
        return Err(DbError::Validation(format!(
            "INSERT supplies {} value(s) for {} column(s)",
            values.len(),
            targets.len()
        )));
    }
    Ok(targets.into_iter().zip(values).collect())
}
