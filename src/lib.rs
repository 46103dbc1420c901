pub mod engine;
pub mod error;
pub mod execution;
pub mod index;
pub mod manager;
pub mod schema;
pub mod sql;
pub mod storage;
pub mod types;

pub use engine::{Engine, ExecResult};
pub use error::{DbError, DbResult};
