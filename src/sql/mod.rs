pub mod ast;
pub mod parser;

pub use ast::{Predicate, SelectStatement, Statement};
pub use parser::parse_statement;
