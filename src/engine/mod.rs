//! The engine facade. `execute` is the one write path and never lets a
//! Rust error escape: every `DbError` becomes the error variant of the
//! result envelope. `explain` is the read-only diagnostic path.

use std::path::Path;

use crate::error::{DbError, DbResult};
use crate::execution::{self, build_plan, PlanNode};
use crate::manager::DatabaseManager;
use crate::sql::ast::Statement;
use crate::sql::parser::parse_statement;
use crate::storage::Storage;
use crate::types::{Fields, Value};

/// Uniform result envelope for every statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    Ok {
        message: String,
        rows_affected: usize,
    },
    Rows {
        rows: Vec<Fields>,
        count: usize,
    },
    Err {
        error: String,
    },
}

impl ExecResult {
    pub fn success(&self) -> bool {
        !matches!(self, ExecResult::Err { .. })
    }

    /// Result rows, when the statement produced any.
    pub fn rows(&self) -> Option<&[Fields]> {
        match self {
            ExecResult::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExecResult::Err { error } => Some(error),
            _ => None,
        }
    }
}

pub struct Engine {
    storage: Storage,
    manager: Option<DatabaseManager>,
    current_database: Option<String>,
}

impl Engine {
    /// Single-database engine over one data directory. Database-level
    /// statements are rejected in this mode.
    pub fn open(data_dir: impl AsRef<Path>) -> DbResult<Engine> {
        Ok(Engine {
            storage: Storage::open(data_dir)?,
            manager: None,
            current_database: None,
        })
    }

    /// Multi-database engine rooted at `base_dir`; the default database is
    /// created on first use and selected.
    pub fn with_manager(base_dir: impl AsRef<Path>, default_database: &str) -> DbResult<Engine> {
        let mut manager = DatabaseManager::new(base_dir.as_ref())?;
        if !manager.database_exists(default_database) {
            manager.create_database(default_database)?;
        }
        let storage = manager.open_storage(default_database)?;
        Ok(Engine {
            storage,
            manager: Some(manager),
            current_database: Some(default_database.to_string()),
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn current_database(&self) -> Option<&str> {
        self.current_database.as_deref()
    }

    /// Parses and executes one statement. Errors never propagate; they
    /// come back inside the envelope.
    pub fn execute(&mut self, sql: &str) -> ExecResult {
        match self.run(sql) {
            Ok(result) => result,
            Err(err) => ExecResult::Err {
                error: err.to_string(),
            },
        }
    }

    fn run(&mut self, sql: &str) -> DbResult<ExecResult> {
        let stmt = parse_statement(sql)?;
        if let Some(result) = self.run_database_statement(&stmt)? {
            return Ok(result);
        }
        execution::handle_statement(&mut self.storage, stmt)
    }

    fn run_database_statement(&mut self, stmt: &Statement) -> DbResult<Option<ExecResult>> {
        let is_db_stmt = matches!(
            stmt,
            Statement::CreateDatabase { .. }
                | Statement::DropDatabase { .. }
                | Statement::UseDatabase { .. }
                | Statement::ShowDatabases
        );
        if !is_db_stmt {
            return Ok(None);
        }
        let Some(manager) = self.manager.as_mut() else {
            // single-database mode: fall through to the executor, which
            // reports the mode error uniformly
            return Ok(None);
        };
        match stmt {
            Statement::CreateDatabase { name } => {
                manager.create_database(name)?;
                Ok(Some(ExecResult::Ok {
                    message: format!("database '{name}' created"),
                    rows_affected: 0,
                }))
            }
            Statement::DropDatabase { name } => {
                if self.current_database.as_deref() == Some(name.as_str()) {
                    return Err(DbError::Validation(
                        "cannot drop the currently selected database".into(),
                    ));
                }
                manager.drop_database(name)?;
                Ok(Some(ExecResult::Ok {
                    message: format!("database '{name}' dropped"),
                    rows_affected: 0,
                }))
            }
            Statement::UseDatabase { name } => {
                let storage = manager.open_storage(name)?;
                self.storage = storage;
                self.current_database = Some(name.clone());
                Ok(Some(ExecResult::Ok {
                    message: format!("database changed to '{name}'"),
                    rows_affected: 0,
                }))
            }
            Statement::ShowDatabases => {
                let current = self.current_database.clone();
                let rows: Vec<Fields> = manager
                    .list_databases()?
                    .into_iter()
                    .map(|name| {
                        let mut f = Fields::new();
                        let is_current = current.as_deref() == Some(name.as_str());
                        f.push("database".into(), Value::Text(name));
                        f.push("current".into(), Value::Bool(is_current));
                        f
                    })
                    .collect();
                Ok(Some(ExecResult::Rows {
                    count: rows.len(),
                    rows,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Builds the explain plan for a SELECT without executing it.
    pub fn explain(&self, sql: &str) -> DbResult<PlanNode> {
        match parse_statement(sql)? {
            Statement::Select(select) => build_plan(&self.storage, &select),
            _ => Err(DbError::Parse(
                "EXPLAIN supports SELECT statements only".into(),
            )),
        }
    }
}
