use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),
    #[error("table '{0}' does not exist")]
    TableNotFound(String),
    #[error("column '{0}' does not exist")]
    ColumnNotFound(String),
    #[error("database '{0}' does not exist")]
    DatabaseNotFound(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
